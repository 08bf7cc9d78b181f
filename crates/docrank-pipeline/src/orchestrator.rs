use std::collections::HashMap;
use tracing::{info, warn};

use docrank_core::types::{Answer, Category, Query, Retrieved};

use crate::corpora::Corpora;
use crate::retrievers::Retriever;

/// Routes each query to its category's retriever. A failing query gets an
/// empty answer with the error recorded; later queries still run.
#[derive(Default)]
pub struct RetrievalOrchestrator {
    retrievers: HashMap<Category, Box<dyn Retriever>>,
}

impl RetrievalOrchestrator {
    pub fn new() -> Self { Self::default() }

    /// Registers `retriever` for its category, replacing any previous one.
    pub fn with_retriever(mut self, retriever: Box<dyn Retriever>) -> Self {
        self.retrievers.insert(retriever.category(), retriever);
        self
    }

    pub fn handles(&self, category: Category) -> bool { self.retrievers.contains_key(&category) }

    pub fn answer(&self, query: &Query, corpora: &Corpora) -> Answer {
        let result = match self.retrievers.get(&query.category) {
            Some(retriever) => retriever.retrieve(query, corpora).map_err(|e| e.to_string()),
            None => Err(format!("no retriever registered for category {}", query.category)),
        };
        match result {
            Ok(retrieve) => Answer { qid: query.qid, retrieve, error: None },
            Err(error) => {
                warn!(qid = query.qid, category = %query.category, %error, "query failed");
                Answer { qid: query.qid, retrieve: Retrieved::Ranked(Vec::new()), error: Some(error) }
            }
        }
    }

    /// Answers queries in order, one at a time.
    pub fn answer_all(&self, queries: &[Query], corpora: &Corpora) -> Vec<Answer> {
        let answers: Vec<Answer> = queries.iter().map(|q| self.answer(q, corpora)).collect();
        let failed = answers.iter().filter(|a| a.error.is_some()).count();
        info!("Answered {} queries ({} failed)", answers.len(), failed);
        answers
    }
}
