//! docrank-vector
//!
//! Dense retrieval over in-memory embeddings: cosine similarity, flat top-k
//! for single-vector candidates and max-pooled top-k for documents that own
//! many chunk vectors.

pub mod cache;
pub mod ranker;
pub mod search;

pub use cache::{CacheEntry, EmbeddingCache};
pub use ranker::EmbeddingRanker;
pub use search::{cosine_similarity, top_k_flat, top_k_grouped};
