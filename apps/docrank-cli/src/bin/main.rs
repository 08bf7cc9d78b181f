use anyhow::{bail, Context};
use std::collections::HashSet;
use std::env;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docrank_core::config::{Config, Settings};
use docrank_core::data_processor::{read_document, DataProcessor, JsonLineExtractor};
use docrank_core::chunker::select_pages;
use docrank_core::traits::VisualJudge;
use docrank_core::types::{Category, PageImage, Query};
use docrank_core::AdaptiveThresholder;
use docrank_embed::get_default_embedder;
use docrank_pipeline::questions::{apply_rewrites, read_questions, read_rewrites, write_json, AnswerFile, RankingFile};
use docrank_pipeline::{
    ClosureJudge, Corpora, FaqCorpus, FaqRetriever, FinanceCorpus, FinanceRetriever, InsuranceCorpus,
    InsuranceRetriever, RecordedJudge, RetrievalOrchestrator,
};
use docrank_text::LexicalRanker;
use docrank_vector::{EmbeddingCache, EmbeddingRanker};

const USAGE: &str = "Usage: docrank <command> [args...]

Commands:
  headers <doc.json> [--pages START END]   detected section headers
  chunk <doc.json> [--pages START END]     header chunks after length splitting
  rank-finance [--out PATH]                lexical ranking of finance pages per query
  retrieve [--category NAME]... [--out PATH]
                                           answer questions, write {\"answers\": [...]}";

struct Args {
    positional: Vec<String>,
    out: Option<PathBuf>,
    pages: Option<Range<usize>>,
    categories: HashSet<Category>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut parsed = Args { positional: Vec::new(), out: None, pages: None, categories: HashSet::new() };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--out" | "-o" => {
                let Some(p) = args.get(i + 1) else { bail!("--out requires a path") };
                parsed.out = Some(PathBuf::from(p));
                i += 1;
            }
            "--pages" => {
                let (Some(start), Some(end)) = (args.get(i + 1), args.get(i + 2)) else { bail!("--pages requires START END") };
                parsed.pages = Some(start.parse::<usize>()?..end.parse::<usize>()?);
                i += 2;
            }
            "--category" | "-c" => {
                let Some(name) = args.get(i + 1) else { bail!("--category requires a name") };
                let category: Category = serde_json::from_value(serde_json::Value::String(name.to_lowercase()))
                    .with_context(|| format!("unknown category {name}"))?;
                parsed.categories.insert(category);
                i += 1;
            }
            other if other.starts_with('-') => bail!("unknown flag {other}"),
            other => parsed.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(parsed)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let mut argv: Vec<String> = env::args().skip(1).collect();
    if argv.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = argv.remove(0);
    let args = parse_args(&argv)?;
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;

    match cmd.as_str() {
        "headers" => {
            let doc = read_document(Path::new(document_arg(&args)?))?;
            let processor = DataProcessor::new(settings.chunking.clone());
            let headers = processor.chunker().detect_headers(&doc, args.pages.clone());
            println!("{}", serde_json::to_string_pretty(&headers)?);
        }
        "chunk" => {
            let mut doc = read_document(Path::new(document_arg(&args)?))?;
            if args.pages.is_some() {
                doc.pages = select_pages(&doc.pages, args.pages.clone()).to_vec();
            }
            let chunks = DataProcessor::new(settings.chunking.clone()).process_document(&doc);
            info!("{} chunks", chunks.len());
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        }
        "rank-finance" => {
            let queries: Vec<Query> = load_queries(&config, &settings)?
                .into_iter()
                .filter(|q| q.category == Category::Finance)
                .collect();
            let corpora = Corpora { finance: FinanceCorpus::load(&config.resolve(&settings.data.finance_dir))?, ..Corpora::default() };
            let retriever = finance_retriever(&config, &settings)?;
            let mut answers = Vec::with_capacity(queries.len());
            for q in &queries {
                answers.push(retriever.rank(q, &corpora)?);
            }
            let out = args.out.clone().unwrap_or_else(|| config.resolve("data/pred/finance_rank.json"));
            write_json(&out, &RankingFile { answers })?;
            info!("Wrote {} finance rankings to {}", queries.len(), out.display());
        }
        "retrieve" => retrieve(&config, &settings, &args)?,
        _ => {
            eprintln!("Unknown command: {cmd}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn document_arg(args: &Args) -> anyhow::Result<&str> {
    match args.positional.first() {
        Some(p) => Ok(p.as_str()),
        None => bail!("missing <doc.json> argument\n\n{USAGE}"),
    }
}

fn load_queries(config: &Config, settings: &Settings) -> anyhow::Result<Vec<Query>> {
    let mut queries = read_questions(&config.resolve(&settings.data.questions)).context("reading questions")?;
    if let Some(path) = &settings.data.finance_rewrites {
        apply_rewrites(&mut queries, &read_rewrites(&config.resolve(path)).context("reading finance rewrites")?);
    }
    Ok(queries)
}

fn finance_retriever(config: &Config, settings: &Settings) -> anyhow::Result<FinanceRetriever> {
    let judge: Box<dyn VisualJudge> = match &settings.data.judge_responses {
        Some(path) => Box::new(RecordedJudge::load(&config.resolve(path)).context("reading judge responses")?),
        None => Box::new(ClosureJudge::new(|_: &str, _: &[PageImage]| {
            anyhow::bail!("no visual judge configured (set data.judge_responses)")
        })),
    };
    Ok(FinanceRetriever::new(
        Box::new(LexicalRanker::new()),
        judge,
        AdaptiveThresholder::new(settings.lexical.threshold_ratio),
        &settings.finance,
        config.resolve(&settings.finance.image_dir),
    ))
}

fn retrieve(config: &Config, settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let queries: Vec<Query> = load_queries(config, settings)?
        .into_iter()
        .filter(|q| args.categories.is_empty() || args.categories.contains(&q.category))
        .collect();
    let wanted: HashSet<Category> = queries.iter().map(|q| q.category).collect();
    info!("Answering {} queries", queries.len());

    let needs_embeddings = wanted.contains(&Category::Faq) || wanted.contains(&Category::Insurance);
    let mut orchestrator = RetrievalOrchestrator::new();
    let mut corpora = Corpora::default();

    if needs_embeddings {
        let model_dir = settings.embedding.model_dir.as_deref().map(|p| config.resolve(p));
        let embedder = get_default_embedder(&settings.embedding, model_dir.as_deref())?;
        let ranker = Arc::new(EmbeddingRanker::new(embedder, &settings.embedding));
        let mut cache = match &settings.embedding.cache_path {
            Some(p) => Some(EmbeddingCache::open(&config.resolve(p))?),
            None => None,
        };

        let faq = if wanted.contains(&Category::Faq) {
            FaqCorpus::load(&config.resolve(&settings.data.faq_source))?
        } else {
            FaqCorpus::default()
        };
        let insurance = if wanted.contains(&Category::Insurance) {
            let extractor = JsonLineExtractor::open(&config.resolve(&settings.data.insurance_dir))?;
            InsuranceCorpus::build(&DataProcessor::new(settings.chunking.clone()), &extractor, &extractor.ids())
        } else {
            InsuranceCorpus::default()
        };
        corpora = Corpora::embed(&ranker, &faq, &insurance, FinanceCorpus::default(), cache.as_mut())?;
        if let Some(cache) = cache.as_mut() {
            cache.save()?;
        }
        orchestrator = orchestrator
            .with_retriever(Box::new(FaqRetriever::new(ranker.clone(), settings.retrieval.faq_top_k)))
            .with_retriever(Box::new(InsuranceRetriever::new(ranker, settings.retrieval.insurance_top_k)));
    }
    if wanted.contains(&Category::Finance) {
        corpora.finance = FinanceCorpus::load(&config.resolve(&settings.data.finance_dir))?;
        orchestrator = orchestrator.with_retriever(Box::new(finance_retriever(config, settings)?));
    }

    let answers = orchestrator.answer_all(&queries, &corpora);
    let out = args.out.clone().unwrap_or_else(|| config.resolve(&settings.data.output));
    write_json(&out, &AnswerFile { answers })?;
    info!("Wrote answers to {}", out.display());
    Ok(())
}
