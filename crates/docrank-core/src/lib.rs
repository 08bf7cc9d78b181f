//! docrank-core
//!
//! Shared data model, configuration, capability traits and the pure
//! chunking / thresholding stages of the retrieval pipeline.

pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod splitter;
pub mod threshold;
pub mod traits;
pub mod types;

pub use chunker::HeaderChunker;
pub use splitter::LengthSplitter;
pub use threshold::AdaptiveThresholder;
