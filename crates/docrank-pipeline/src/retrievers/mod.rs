//! One retriever per query category.

use docrank_core::error::Result;
use docrank_core::types::{Category, Query, Retrieved};

use crate::corpora::Corpora;

mod faq;
mod finance;
mod insurance;

pub use faq::FaqRetriever;
pub use finance::FinanceRetriever;
pub use insurance::InsuranceRetriever;

pub trait Retriever: Send + Sync {
    fn category(&self) -> Category;

    /// Answers `query` within its candidate scope. No side effects.
    fn retrieve(&self, query: &Query, corpora: &Corpora) -> Result<Retrieved>;
}
