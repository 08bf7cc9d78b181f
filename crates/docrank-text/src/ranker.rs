use anyhow::Result;
use std::cmp::Ordering;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexWriter, TantivyDocument, Term};
use tracing::debug;

use docrank_core::traits::LexicalScorer;
use docrank_core::types::{ScoredCandidate, SourceId};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_MEMORY: usize = 20_000_000;

/// BM25 over the candidate set alone: corpus statistics come only from the
/// texts passed to `rank`, so each query gets its own tiny index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
	pub fn new() -> Self { Self }

	/// Every candidate comes back exactly once, scored and sorted descending.
	/// Equal scores keep input order. Scores are rounded to 4 decimals.
	pub fn rank(&self, query: &str, corpus: &[(SourceId, String)]) -> Result<Vec<ScoredCandidate>> {
		if corpus.is_empty() {
			return Ok(Vec::new());
		}
		let raw = self.raw_scores(query, corpus)?;
		let mut order: Vec<usize> = (0..corpus.len()).collect();
		order.sort_by(|&a, &b| raw[b].partial_cmp(&raw[a]).unwrap_or(Ordering::Equal));
		Ok(order
			.into_iter()
			.map(|i| ScoredCandidate { id: corpus[i].0.clone(), score: round4(raw[i]) })
			.collect())
	}

	fn raw_scores(&self, query: &str, corpus: &[(SourceId, String)]) -> Result<Vec<f32>> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let ord_field = schema.get_field("ord")?;
		let text_field = schema.get_field("text")?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY)?;
		for (ord, (id, text)) in corpus.iter().enumerate() {
			writer.add_document(doc!(id_field => id.to_string(), ord_field => ord as u64, text_field => text.as_str()))?;
		}
		writer.commit()?;

		let mut analyzer = index.tokenizer_for_field(text_field)?;
		let mut stream = analyzer.token_stream(query);
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		while stream.advance() {
			let term = Term::from_field_text(text_field, &stream.token().text);
			clauses.push((Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))));
		}

		let mut scores = vec![0f32; corpus.len()];
		if clauses.is_empty() {
			debug!("query has no tokens; all candidates score 0");
			return Ok(scores);
		}
		let query_terms = clauses.len();
		let reader = index.reader()?; let searcher = reader.searcher();
		let top_docs = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(corpus.len()))?;
		debug!(candidates = corpus.len(), query_terms, matched = top_docs.len(), "bm25 ranked");
		for (score, doc_address) in top_docs {
			let doc: TantivyDocument = searcher.doc(doc_address)?;
			if let Some(ord) = doc.get_first(ord_field).and_then(|v| v.as_u64()) {
				if let Some(slot) = scores.get_mut(ord as usize) {
					*slot = score;
				}
			}
		}
		Ok(scores)
	}
}

impl LexicalScorer for LexicalRanker {
	fn rank(&self, query: &str, corpus: &[(SourceId, String)]) -> Result<Vec<ScoredCandidate>> {
		LexicalRanker::rank(self, query, corpus)
	}
}

fn round4(v: f32) -> f32 { (v * 10_000.0).round() / 10_000.0 }
