//! docrank-text
//!
//! Lexical (BM25) ranking of a per-query candidate set. Candidates go into a
//! throwaway in-RAM Tantivy index tokenized with jieba's search mode.

pub mod tantivy_utils;
pub mod tokenizer;
pub mod ranker;

pub use ranker::LexicalRanker;
pub use tokenizer::JiebaTokenizer;
