//! Dense embedding matrix over the embedded subset of a corpus

use crate::corpus::Document;
use crate::search::SearchError;
use ndarray::Array2;

/// Row `i` of `matrix` is the embedding of `corpus[rows[i]]`
///
/// Rows follow corpus order and skip documents without an embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    matrix: Array2<f32>,
    rows: Vec<usize>,
    ids: Vec<i64>,
}

impl EmbeddingStore {
    /// Collect the embeddings of `documents`
    ///
    /// Fails with `NoEmbeddingsAvailable` when no document carries one, and
    /// with `DimensionMismatch` when embeddings disagree in length.
    pub fn from_documents(documents: &[Document]) -> Result<Self, SearchError> {
        let embedded: Vec<(usize, &Document, &Vec<f32>)> = documents
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                doc.embedding
                    .as_ref()
                    .filter(|e| !e.is_empty())
                    .map(|e| (i, doc, e))
            })
            .collect();

        let dimension = match embedded.first() {
            Some((_, _, first)) => first.len(),
            None => return Err(SearchError::NoEmbeddingsAvailable),
        };

        let mut values = Vec::with_capacity(embedded.len() * dimension);
        let mut rows = Vec::with_capacity(embedded.len());
        let mut ids = Vec::with_capacity(embedded.len());

        for (index, doc, embedding) in embedded {
            if embedding.len() != dimension {
                return Err(SearchError::DimensionMismatch {
                    id: Some(doc.id),
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            values.extend_from_slice(embedding);
            rows.push(index);
            ids.push(doc.id);
        }

        let matrix = Array2::from_shape_vec((rows.len(), dimension), values)?;

        Ok(Self { matrix, rows, ids })
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    /// Corpus index of each matrix row
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Document id of each matrix row
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (Array2<f32>, Vec<i64>) {
        (self.matrix, self.ids)
    }
}
