//! TF-IDF ranking over title + abstract

use super::{top_indices, SearchError, VectorSpaceModel};
use crate::corpus::{Document, RankedResult};
use std::sync::Arc;

pub struct LexicalSearch {
    corpus: Arc<[Document]>,
    model: VectorSpaceModel,
}

impl LexicalSearch {
    pub fn new(corpus: Arc<[Document]>) -> Result<Self, SearchError> {
        let texts: Vec<String> = corpus.iter().map(Document::search_text).collect();
        let model = VectorSpaceModel::fit(&texts)?;

        tracing::info!(
            "TF-IDF index built over {} papers ({} terms)",
            corpus.len(),
            model.vocabulary_len()
        );

        Ok(Self { corpus, model })
    }

    /// Rank the corpus against `query`, best first
    ///
    /// Never fails: an empty corpus yields no results and a query with no
    /// known terms scores every paper 0.0.
    pub fn search(&self, query: &str, top_n: usize) -> Vec<RankedResult> {
        let scores = self.model.similarities(query);
        top_indices(&scores, top_n)
            .into_iter()
            .map(|index| RankedResult::from_document(&self.corpus[index], scores[index]))
            .collect()
    }

    pub fn model(&self) -> &VectorSpaceModel {
        &self.model
    }
}
