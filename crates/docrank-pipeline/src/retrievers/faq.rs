use std::sync::Arc;
use tracing::{debug, warn};

use docrank_core::error::{Error, Result};
use docrank_core::types::{Category, Query, Retrieved};
use docrank_vector::EmbeddingRanker;

use super::Retriever;
use crate::corpora::Corpora;

/// Nearest FAQ passages to the query among its candidate ids.
pub struct FaqRetriever {
    ranker: Arc<EmbeddingRanker>,
    top_k: usize,
}

impl FaqRetriever {
    pub fn new(ranker: Arc<EmbeddingRanker>, top_k: usize) -> Self { Self { ranker, top_k } }
}

impl Retriever for FaqRetriever {
    fn category(&self) -> Category { Category::Faq }

    fn retrieve(&self, query: &Query, corpora: &Corpora) -> Result<Retrieved> {
        let mut ids = Vec::with_capacity(query.source.len());
        let mut vectors = Vec::with_capacity(query.source.len());
        for id in &query.source {
            match corpora.faq.get(id) {
                Some(v) => {
                    ids.push(id);
                    vectors.push(v);
                }
                None => warn!(qid = query.qid, %id, "FAQ id has no passage embedding"),
            }
        }
        if ids.is_empty() {
            warn!(qid = query.qid, "no FAQ candidates in scope");
            return Ok(Retrieved::Ranked(Vec::new()));
        }
        let q = self.ranker.embed_query(&query.query).map_err(|e| Error::Embedding(e.to_string()))?;
        let top = self.ranker.rank_flat(&q, &vectors, self.top_k);
        debug!(qid = query.qid, ?top, "faq ranked");
        Ok(Retrieved::Ranked(top.into_iter().map(|(i, _)| ids[i].clone()).collect()))
    }
}
