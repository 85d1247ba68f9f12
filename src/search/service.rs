//! Composition root for paper search

use super::{EmbeddingSearch, LexicalSearch, SearchError, SearchMethod, SearchStrategy};
use crate::corpus::{Document, RankedResult};
use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingStore};
use rand::seq::index::sample;
use rand::Rng;
use std::sync::Arc;

/// Immutable search service built once at startup
///
/// Owns the corpus and the strategy chosen by configuration. Every call is a
/// read over state fixed at construction, so one instance can be shared by
/// reference across request handlers.
pub struct SearchService {
    corpus: Arc<[Document]>,
    strategy: SearchStrategy,
    max_top_n: usize,
}

impl SearchService {
    /// Build the service for `method`
    ///
    /// `provider` is only invoked for embedding search, and only after the
    /// corpus is known to contain embeddings, so TF-IDF startup never loads a
    /// model.
    pub fn build<F>(
        corpus: Vec<Document>,
        method: SearchMethod,
        max_top_n: usize,
        provider: F,
    ) -> Result<Self, SearchError>
    where
        F: FnOnce() -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError>,
    {
        let corpus: Arc<[Document]> = corpus.into();

        let strategy = match method {
            SearchMethod::Tfidf => SearchStrategy::Lexical(LexicalSearch::new(corpus.clone())?),
            SearchMethod::Embedding => {
                let store = EmbeddingStore::from_documents(&corpus)?;
                let provider = provider()?;
                SearchStrategy::Embedding(EmbeddingSearch::from_store(
                    corpus.clone(),
                    store,
                    provider,
                ))
            }
        };

        tracing::info!("Using {} search over {} papers", method, corpus.len());

        Ok(Self {
            corpus,
            strategy,
            max_top_n,
        })
    }

    /// Rank papers against `query`
    ///
    /// A blank query skips ranking and returns a uniform random sample of
    /// `top_n` papers, each scored 0.0.
    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<RankedResult>, SearchError> {
        self.search_with_rng(query, top_n, &mut rand::thread_rng())
    }

    pub fn search_with_rng<R: Rng + ?Sized>(
        &self,
        query: &str,
        top_n: usize,
        rng: &mut R,
    ) -> Result<Vec<RankedResult>, SearchError> {
        if top_n == 0 || top_n > self.max_top_n {
            return Err(SearchError::InvalidTopN {
                requested: top_n,
                max: self.max_top_n,
            });
        }

        if query.trim().is_empty() {
            return self.random_sample(top_n, rng);
        }

        self.strategy.search(query, top_n)
    }

    fn random_sample<R: Rng + ?Sized>(
        &self,
        top_n: usize,
        rng: &mut R,
    ) -> Result<Vec<RankedResult>, SearchError> {
        if self.corpus.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let amount = top_n.min(self.corpus.len());
        Ok(sample(rng, self.corpus.len(), amount)
            .into_iter()
            .map(|index| RankedResult::from_document(&self.corpus[index], 0.0))
            .collect())
    }

    pub fn method(&self) -> SearchMethod {
        self.strategy.method()
    }

    pub fn corpus(&self) -> &[Document] {
        &self.corpus
    }

    pub fn max_top_n(&self) -> usize {
        self.max_top_n
    }
}
