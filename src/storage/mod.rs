//! Flat JSON snapshot storage
//!
//! Corpus snapshots, embeddings snapshots and projection maps are plain JSON
//! files. Writers create parent directories and pretty-print; readers report
//! a missing file as `SnapshotNotFound`.

use crate::corpus::Document;
use crate::error::{PapermapError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read a JSON value from `path`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PapermapError::SnapshotNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| PapermapError::Io {
        source: e,
        context: format!("Failed to read snapshot: {}", path.display()),
    })?;

    serde_json::from_str(&content).map_err(|e| PapermapError::Json {
        source: e,
        context: format!("Failed to parse snapshot: {}", path.display()),
    })
}

/// Write `value` to `path` as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PapermapError::Io {
            source: e,
            context: format!("Failed to create directory: {}", parent.display()),
        })?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| PapermapError::Json {
        source: e,
        context: format!("Failed to serialize snapshot: {}", path.display()),
    })?;

    std::fs::write(path, content).map_err(|e| PapermapError::Io {
        source: e,
        context: format!("Failed to write snapshot: {}", path.display()),
    })
}

pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    read_json(path)
}

pub fn save_documents(path: &Path, documents: &[Document]) -> Result<()> {
    write_json(path, documents)
}

/// Load the serving corpus
///
/// Prefers the embeddings snapshot, falls back to the scraped snapshot, and
/// ends with an empty corpus when neither file exists.
pub fn load_corpus(embeddings_path: &Path, corpus_path: &Path) -> Result<Vec<Document>> {
    if embeddings_path.exists() {
        let documents = load_documents(embeddings_path)?;
        tracing::info!(
            "Loaded {} papers from embeddings snapshot {}",
            documents.len(),
            embeddings_path.display()
        );
        Ok(documents)
    } else if corpus_path.exists() {
        let documents = load_documents(corpus_path)?;
        tracing::info!(
            "Loaded {} papers from scraped snapshot {} (no embeddings)",
            documents.len(),
            corpus_path.display()
        );
        Ok(documents)
    } else {
        tracing::warn!(
            "No snapshot found at {} or {}, starting with an empty corpus",
            embeddings_path.display(),
            corpus_path.display()
        );
        Ok(Vec::new())
    }
}
