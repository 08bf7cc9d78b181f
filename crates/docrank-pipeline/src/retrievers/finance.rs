use std::path::PathBuf;
use tracing::{debug, info, warn};

use docrank_core::config::FinanceSettings;
use docrank_core::error::{Error, Result};
use docrank_core::traits::{LexicalScorer, VisualJudge};
use docrank_core::types::{Category, FinanceRanking, PageImage, Query, Retrieved, ScoredCandidate, SourceId};
use docrank_core::AdaptiveThresholder;

use super::Retriever;
use crate::corpora::Corpora;
use crate::judge::map_judge_output;

/// Lexical shortlist of finance pages, narrowed by the adaptive threshold,
/// then a visual judge picks one page.
pub struct FinanceRetriever {
    scorer: Box<dyn LexicalScorer>,
    judge: Box<dyn VisualJudge>,
    thresholder: AdaptiveThresholder,
    max_images: usize,
    image_dir: PathBuf,
    image_extension: String,
}

impl FinanceRetriever {
    pub fn new(
        scorer: Box<dyn LexicalScorer>,
        judge: Box<dyn VisualJudge>,
        thresholder: AdaptiveThresholder,
        settings: &FinanceSettings,
        image_dir: PathBuf,
    ) -> Self {
        Self {
            scorer,
            judge,
            thresholder,
            max_images: settings.max_images,
            image_dir,
            image_extension: settings.image_extension.clone(),
        }
    }

    /// The rewritten query when one was supplied, else the original text.
    fn lexical_query<'a>(&self, query: &'a Query) -> &'a str {
        match query.rewrite.as_deref() {
            Some(rewrite) => rewrite,
            None => {
                warn!(qid = query.qid, "no rewritten finance query; using the original text");
                &query.query
            }
        }
    }

    fn ranked(&self, query: &Query, corpora: &Corpora) -> Result<Vec<ScoredCandidate>> {
        let corpus = corpora.finance.scoped(&query.source);
        self.scorer
            .rank(self.lexical_query(query), &corpus)
            .map_err(|e| Error::Lexical(e.to_string()))
    }

    /// The lexical stage alone: every scoped page, best first.
    pub fn rank(&self, query: &Query, corpora: &Corpora) -> Result<FinanceRanking> {
        let ranked = self.ranked(query, corpora)?;
        Ok(FinanceRanking {
            qid: query.qid,
            retrieve: ranked.iter().map(|c| c.id.clone()).collect(),
            scores: ranked.iter().map(|c| c.score).collect(),
        })
    }

    /// Pages sent to the judge, in shortlist order.
    pub fn page_images(&self, shortlist: &[SourceId]) -> Vec<PageImage> {
        shortlist
            .iter()
            .map(|id| PageImage { id: id.clone(), path: self.image_dir.join(format!("{}.{}", id, self.image_extension)) })
            .collect()
    }
}

impl Retriever for FinanceRetriever {
    fn category(&self) -> Category { Category::Finance }

    fn retrieve(&self, query: &Query, corpora: &Corpora) -> Result<Retrieved> {
        let ranked = self.ranked(query, corpora)?;
        if ranked.is_empty() {
            warn!(qid = query.qid, "no finance pages in scope");
            return Ok(Retrieved::Ranked(Vec::new()));
        }
        let kept = self.thresholder.select(&ranked);
        let mut shortlist: Vec<SourceId> = kept.iter().map(|c| c.id.clone()).collect();
        shortlist.truncate(self.max_images);
        debug!(qid = query.qid, ranked = ranked.len(), kept = kept.len(), sent = shortlist.len(), "finance shortlist");
        if shortlist.is_empty() {
            return Err(Error::EmptyShortlist(query.qid));
        }
        let pages = self.page_images(&shortlist);
        let response = self
            .judge
            .judge(&query.query, &pages)
            .map_err(|e| Error::Judge(e.to_string()))?;
        let retrieved = map_judge_output(&response, &shortlist);
        info!(qid = query.qid, ?retrieved, "finance answer");
        Ok(retrieved)
    }
}
