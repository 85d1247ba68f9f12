//! Offline job filling in missing document embeddings

use super::EmbeddingProvider;
use crate::corpus::Document;
use crate::error::Result;
use crate::storage;
use std::path::Path;
use tracing::{debug, info};

/// Summary of one embedding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Documents that received a new embedding
    pub processed: usize,
    /// Documents that already had an embedding
    pub skipped: usize,
    /// Documents with neither title nor abstract
    pub empty: usize,
    pub duration_ms: u64,
}

/// Embeds `"{title} {abstract}"` for every document lacking an embedding
///
/// The snapshot at `output` is rewritten every `save_interval` processed
/// documents, so an interrupted run resumes where it stopped.
pub struct EmbeddingBatch<'a> {
    provider: &'a dyn EmbeddingProvider,
    batch_size: usize,
    save_interval: usize,
}

impl<'a> EmbeddingBatch<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, batch_size: usize, save_interval: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            save_interval: save_interval.max(1),
        }
    }

    pub fn run(&self, documents: &mut [Document], output: &Path) -> Result<BatchResult> {
        let start = std::time::Instant::now();

        let mut skipped = 0;
        let mut empty = 0;
        let mut pending = Vec::new();

        for (index, doc) in documents.iter_mut().enumerate() {
            if doc.has_embedding() {
                skipped += 1;
                continue;
            }

            let text = doc.search_text().trim().to_string();
            if text.is_empty() {
                doc.embedding = None;
                empty += 1;
            } else {
                pending.push((index, text));
            }
        }

        info!(
            "Embedding {} documents with {} ({} already embedded, {} empty)",
            pending.len(),
            self.provider.model_name(),
            skipped,
            empty
        );

        let mut processed = 0;
        let mut since_save = 0;

        for chunk in pending.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
            let embeddings = self.provider.embed_batch(&texts)?;

            for ((index, _), embedding) in chunk.iter().zip(embeddings) {
                documents[*index].embedding = Some(embedding);
            }

            processed += chunk.len();
            since_save += chunk.len();
            debug!("Embedded {}/{} documents", processed, pending.len());

            if since_save >= self.save_interval {
                storage::save_documents(output, documents)?;
                debug!("Intermediate save after {} documents", processed);
                since_save = 0;
            }
        }

        storage::save_documents(output, documents)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Embedding complete: {} processed, {} skipped, {} empty, {}ms",
            processed, skipped, empty, duration_ms
        );

        Ok(BatchResult {
            processed,
            skipped,
            empty,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds text length and word count; counts provider calls
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, text.split_whitespace().count() as f32])
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_fills_missing_embeddings() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("data/embeddings.json");
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let mut docs = vec![
            Document::new(1, "Gaze typing", "Eyes as input"),
            Document::new(2, "Done", "").with_embedding(vec![9.0, 9.0]),
            Document::new(3, "", ""),
            Document::new(4, "Haptics", ""),
            Document::new(5, "Redo", "").with_embedding(vec![]),
        ];

        let result = EmbeddingBatch::new(&provider, 2, 10)
            .run(&mut docs, &output)
            .unwrap();

        assert_eq!(result.processed, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.empty, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        assert_eq!(docs[0].embedding, Some(vec![25.0, 5.0]));
        assert_eq!(docs[1].embedding, Some(vec![9.0, 9.0]));
        assert_eq!(docs[2].embedding, None);
        // "Haptics " trimmed before embedding
        assert_eq!(docs[3].embedding, Some(vec![7.0, 1.0]));
        assert!(docs[4].embedding.is_some());

        let saved = storage::load_documents(&output).unwrap();
        assert_eq!(saved, docs);
    }

    #[test]
    fn test_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("embeddings.json");
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let mut docs = vec![Document::new(1, "a", "").with_embedding(vec![1.0, 1.0])];
        let result = EmbeddingBatch::new(&provider, 8, 1).run(&mut docs, &output).unwrap();

        assert_eq!(result.processed, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(output.exists());
    }
}
