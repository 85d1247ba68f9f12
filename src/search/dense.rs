//! Cosine ranking against precomputed paper embeddings

use super::{top_indices, SearchError};
use crate::corpus::{Document, RankedResult};
use crate::embedding::{EmbeddingProvider, EmbeddingStore};
use ndarray::{Array1, Axis};
use std::sync::Arc;

/// Dense similarity search over the embedded subset of the corpus
///
/// Papers without an embedding are never returned.
pub struct EmbeddingSearch {
    corpus: Arc<[Document]>,
    store: EmbeddingStore,
    row_norms: Array1<f32>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingSearch {
    pub fn new(
        corpus: Arc<[Document]>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, SearchError> {
        let store = EmbeddingStore::from_documents(&corpus)?;
        Ok(Self::from_store(corpus, store, provider))
    }

    /// Build from a store already extracted from `corpus`
    pub fn from_store(
        corpus: Arc<[Document]>,
        store: EmbeddingStore,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let row_norms = store
            .matrix()
            .map_axis(Axis(1), |row| row.dot(&row).sqrt());

        tracing::info!(
            "Embedding index built: {} of {} papers embedded ({}D, query model {})",
            store.len(),
            corpus.len(),
            store.dimension(),
            provider.model_name()
        );

        Self {
            corpus,
            store,
            row_norms,
            provider,
        }
    }

    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<RankedResult>, SearchError> {
        let query = self.provider.embed(query)?;
        if query.len() != self.store.dimension() {
            return Err(SearchError::DimensionMismatch {
                id: None,
                expected: self.store.dimension(),
                actual: query.len(),
            });
        }

        // 1 x D query row against the N x D matrix
        let query = Array1::from(query).insert_axis(Axis(0));
        let query_norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let dots = self.store.matrix().dot(&query.t());

        let scores: Vec<f32> = dots
            .column(0)
            .iter()
            .zip(self.row_norms.iter())
            .map(|(dot, norm)| {
                let denominator = norm * query_norm;
                let similarity = if denominator > 0.0 { dot / denominator } else { 0.0 };
                // NaN and -0.0 both surface as 0.0
                if similarity.is_nan() || similarity == 0.0 {
                    0.0
                } else {
                    similarity
                }
            })
            .collect();

        let rows = self.store.rows();
        Ok(top_indices(&scores, top_n)
            .into_iter()
            .map(|row| RankedResult::from_document(&self.corpus[rows[row]], scores[row]))
            .collect())
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    /// One axis per topic keyword
    struct TopicProvider;

    const TOPICS: [&str; 3] = ["gaze", "haptic", "voice"];

    impl EmbeddingProvider for TopicProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let text = text.to_lowercase();
            Ok(TOPICS
                .iter()
                .map(|topic| text.matches(topic).count() as f32)
                .collect())
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            TOPICS.len()
        }

        fn model_name(&self) -> &str {
            "topics"
        }
    }

    fn corpus() -> Arc<[Document]> {
        vec![
            Document::new(1, "Gaze keyboards", "").with_embedding(vec![1.0, 0.0, 0.0]),
            Document::new(2, "Unembedded gaze paper", ""),
            Document::new(3, "Haptic gloves", "").with_embedding(vec![0.0, 1.0, 0.0]),
            Document::new(4, "Gaze and haptics", "").with_embedding(vec![1.0, 1.0, 0.0]),
            Document::new(5, "Voice", "").with_embedding(vec![0.0, 0.0, 2.0]),
        ]
        .into()
    }

    #[test]
    fn test_ranking_and_exclusion() {
        let search = EmbeddingSearch::new(corpus(), Arc::new(TopicProvider)).unwrap();
        let results = search.search("gaze", 10).unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.id != 2));
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].id, 4);
        assert!((results[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        // tie at 0.0 keeps row order
        assert_eq!(results[2].id, 3);
        assert_eq!(results[3].id, 5);
    }

    #[test]
    fn test_top_n() {
        let search = EmbeddingSearch::new(corpus(), Arc::new(TopicProvider)).unwrap();
        assert_eq!(search.search("voice", 1).unwrap()[0].id, 5);
        assert_eq!(search.search("voice", 2).unwrap().len(), 2);
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let search = EmbeddingSearch::new(corpus(), Arc::new(TopicProvider)).unwrap();
        let results = search.search("crowdsourcing", 10).unwrap();
        assert!(results.iter().all(|r| r.score == 0.0));
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_no_embeddings() {
        let corpus: Arc<[Document]> = vec![Document::new(1, "a", ""), Document::new(2, "b", "")].into();
        assert!(matches!(
            EmbeddingSearch::new(corpus, Arc::new(TopicProvider)),
            Err(SearchError::NoEmbeddingsAvailable)
        ));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let corpus: Arc<[Document]> =
            vec![Document::new(1, "a", "").with_embedding(vec![1.0, 0.0])].into();
        let search = EmbeddingSearch::new(corpus, Arc::new(TopicProvider)).unwrap();
        assert!(matches!(
            search.search("gaze", 1),
            Err(SearchError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
    }
}
