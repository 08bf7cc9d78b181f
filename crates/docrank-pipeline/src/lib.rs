//! docrank-pipeline
//!
//! Per-category retrieval over prebuilt corpora. Each `Category` has one
//! `Retriever`; the orchestrator routes queries to them and records any
//! failure in that query's answer instead of stopping the run.

pub mod corpora;
pub mod judge;
pub mod orchestrator;
pub mod questions;
pub mod retrievers;

pub use corpora::{Corpora, FaqCorpus, FinanceCorpus, InsuranceCorpus};
pub use judge::{map_judge_output, ClosureJudge, RecordedJudge};
pub use orchestrator::RetrievalOrchestrator;
pub use retrievers::{FaqRetriever, FinanceRetriever, InsuranceRetriever, Retriever};
