//! Papermap - conference paper search and embedding-space maps
//!
//! Ranks scraped conference papers against free-text queries, either with a
//! TF-IDF vector space or with sentence-embedding cosine similarity, and
//! precomputes 2-D projections (PCA, t-SNE, UMAP) of the embedding space for
//! visualization.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod projection;
pub mod reduction;
pub mod search;
pub mod storage;

pub use error::{PapermapError, Result};
