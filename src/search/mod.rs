//! Paper ranking
//!
//! Two interchangeable strategies rank the corpus against a query:
//! - `LexicalSearch`: TF-IDF vector space over title + abstract
//! - `EmbeddingSearch`: cosine similarity against precomputed embeddings
//!
//! `SearchService` picks one at startup and owns the corpus for the lifetime
//! of the process.

mod dense;
mod lexical;
mod service;
mod stop_words;
mod vectorizer;

pub use dense::EmbeddingSearch;
pub use lexical::LexicalSearch;
pub use service::SearchService;
pub use vectorizer::VectorSpaceModel;

use crate::corpus::RankedResult;
use crate::embedding::EmbeddingError;
use crate::error::PapermapError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No valid embeddings found in the corpus")]
    NoEmbeddingsAvailable,

    #[error("Corpus is empty")]
    EmptyCorpus,

    #[error("top_n must be between 1 and {max}, got {requested}")]
    InvalidTopN { requested: usize, max: usize },

    #[error("Embedding dimension mismatch (document {id:?}): expected {expected}, got {actual}")]
    DimensionMismatch {
        id: Option<i64>,
        expected: usize,
        actual: usize,
    },

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] regex::Error),

    #[error("Matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Ranking strategy selected by `search.method`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Tfidf,
    Embedding,
}

impl SearchMethod {
    pub const NAMES: &'static [&'static str] = &["tfidf", "embedding"];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Tfidf => "tfidf",
            SearchMethod::Embedding => "embedding",
        }
    }
}

impl FromStr for SearchMethod {
    type Err = PapermapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tfidf" => Ok(SearchMethod::Tfidf),
            "embedding" => Ok(SearchMethod::Embedding),
            _ => Err(PapermapError::InvalidConfiguration {
                kind: "search method",
                value: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active ranking strategy
pub enum SearchStrategy {
    Lexical(LexicalSearch),
    Embedding(EmbeddingSearch),
}

impl SearchStrategy {
    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<RankedResult>, SearchError> {
        match self {
            SearchStrategy::Lexical(lexical) => Ok(lexical.search(query, top_n)),
            SearchStrategy::Embedding(dense) => dense.search(query, top_n),
        }
    }

    pub fn method(&self) -> SearchMethod {
        match self {
            SearchStrategy::Lexical(_) => SearchMethod::Tfidf,
            SearchStrategy::Embedding(_) => SearchMethod::Embedding,
        }
    }
}

/// Indices of the `top_n` highest scores
///
/// Full descending sort; the sort is stable so equal scores keep index order.
pub(crate) fn top_indices(scores: &[f32], top_n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(top_n);
    order
}
