//! Embedding generation and storage
//!
//! - `EmbeddingProvider` is the text -> vector oracle, `FastEmbedProvider`
//!   runs all-MiniLM-L6-v2 (384-dim) locally
//! - `EmbeddingStore` packs the embedded documents of a corpus into a matrix
//! - `EmbeddingBatch` is the offline job that fills in missing embeddings
mod batch;
mod provider;
mod store;

pub use batch::{BatchResult, EmbeddingBatch};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use store::EmbeddingStore;
