//! 2-D projections of the embedding space
//!
//! `ProjectionPipeline` is the offline job: embeddings snapshot in, one
//! reducer, `{id: [x, y]}` artifact out. `ProjectionCatalog` is the serving
//! side and reads those artifacts back on first use.

use crate::corpus::Document;
use crate::embedding::EmbeddingStore;
use crate::error::{PapermapError, Result};
use crate::reduction::{DimensionalityReducer, ReducerKind};
use crate::storage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

/// Document id (as a string) to projected coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectionMap(BTreeMap<String, Vec<f32>>);

impl ProjectionMap {
    /// Pair row `i` of `coordinates` with `ids[i]`
    pub fn from_rows(ids: &[i64], coordinates: &Array2<f32>) -> Self {
        Self(
            ids.iter()
                .zip(coordinates.rows())
                .map(|(id, row)| (id.to_string(), row.to_vec()))
                .collect(),
        )
    }

    pub fn get(&self, id: i64) -> Option<&[f32]> {
        self.0.get(&id.to_string()).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.0.iter().map(|(id, coords)| (id.as_str(), coords.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        storage::read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)
    }
}

/// Offline projection job for one reducer
pub struct ProjectionPipeline {
    reducer: DimensionalityReducer,
}

impl ProjectionPipeline {
    pub fn new(reducer: DimensionalityReducer) -> Self {
        Self { reducer }
    }

    /// Project the embedded documents of `documents`
    ///
    /// Documents without an embedding are left out of the map.
    pub fn project(&self, documents: &[Document]) -> Result<ProjectionMap> {
        let store = EmbeddingStore::from_documents(documents)?;
        let skipped = documents.len() - store.len();
        if skipped > 0 {
            tracing::warn!("{} documents have no embedding and will not be projected", skipped);
        }

        let (matrix, ids) = store.into_parts();
        let coordinates = self.reducer.reduce(&matrix)?;
        Ok(ProjectionMap::from_rows(&ids, &coordinates))
    }

    /// Load `embeddings_path`, project it and write the map to `output`
    pub fn run(&self, embeddings_path: &Path, output: &Path) -> Result<ProjectionMap> {
        let start = Instant::now();
        let documents = storage::load_documents(embeddings_path)?;
        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            embeddings_path.display()
        );

        let map = self.project(&documents)?;
        map.save(output)?;

        tracing::info!(
            "Saved {} {} coordinates to {} in {}ms",
            map.len(),
            self.reducer.kind(),
            output.display(),
            start.elapsed().as_millis()
        );
        Ok(map)
    }

    pub fn reducer(&self) -> &DimensionalityReducer {
        &self.reducer
    }
}

/// Lazily loaded projection artifacts
///
/// Each reducer's map is read on first request and cached. A missing artifact
/// yields an empty map and is looked up again on the next request.
pub struct ProjectionCatalog {
    dir: PathBuf,
    pca: OnceLock<ProjectionMap>,
    tsne: OnceLock<ProjectionMap>,
    umap: OnceLock<ProjectionMap>,
    empty: ProjectionMap,
}

impl ProjectionCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pca: OnceLock::new(),
            tsne: OnceLock::new(),
            umap: OnceLock::new(),
            empty: ProjectionMap::default(),
        }
    }

    pub fn path(&self, kind: ReducerKind) -> PathBuf {
        self.dir.join(kind.artifact_name())
    }

    pub fn get(&self, kind: ReducerKind) -> Result<&ProjectionMap> {
        let slot = match kind {
            ReducerKind::Pca => &self.pca,
            ReducerKind::Tsne => &self.tsne,
            ReducerKind::Umap => &self.umap,
        };
        if let Some(map) = slot.get() {
            return Ok(map);
        }

        let path = self.path(kind);
        match ProjectionMap::load(&path) {
            Ok(map) => {
                tracing::debug!("Loaded {} {} coordinates", map.len(), kind);
                Ok(slot.get_or_init(|| map))
            }
            Err(PapermapError::SnapshotNotFound { .. }) => {
                tracing::warn!("No {} projection at {}", kind, path.display());
                Ok(&self.empty)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::Pca;
    use ndarray::array;
    use tempfile::TempDir;

    fn documents() -> Vec<Document> {
        vec![
            Document::new(10, "a", "").with_embedding(vec![1.0, 0.0, 0.0]),
            Document::new(11, "b", ""),
            Document::new(12, "c", "").with_embedding(vec![0.0, 1.0, 0.0]),
            Document::new(13, "d", "").with_embedding(vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn test_from_rows() {
        let map = ProjectionMap::from_rows(&[7, 9], &array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(map.get(7), Some(&[1.0, 2.0][..]));
        assert_eq!(map.get(9), Some(&[3.0, 4.0][..]));
        assert_eq!(map.get(8), None);
    }

    #[test]
    fn test_json_shape() {
        let map = ProjectionMap::from_rows(&[5], &array![[0.5, -1.0]]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"5":[0.5,-1.0]}"#);
    }

    #[test]
    fn test_project_skips_unembedded() {
        let pipeline = ProjectionPipeline::new(DimensionalityReducer::Pca(Pca::new(2)));
        let map = pipeline.project(&documents()).unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.get(11).is_none());
        assert!(map.iter().all(|(_, coords)| coords.len() == 2));
    }

    #[test]
    fn test_project_without_embeddings() {
        let pipeline = ProjectionPipeline::new(DimensionalityReducer::Pca(Pca::new(2)));
        let result = pipeline.project(&[Document::new(1, "a", "")]);
        assert!(matches!(result, Err(PapermapError::Search(_))));
    }

    #[test]
    fn test_catalog_missing_artifact_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = ProjectionCatalog::new(dir.path());
        assert!(catalog.get(ReducerKind::Umap).unwrap().is_empty());

        // picked up once written
        let map = ProjectionMap::from_rows(&[1], &array![[1.0, 1.0]]);
        map.save(&catalog.path(ReducerKind::Umap)).unwrap();
        assert_eq!(catalog.get(ReducerKind::Umap).unwrap(), &map);
    }

    #[test]
    fn test_catalog_caches() {
        let dir = TempDir::new().unwrap();
        let catalog = ProjectionCatalog::new(dir.path());
        let map = ProjectionMap::from_rows(&[1], &array![[1.0, 1.0]]);
        map.save(&catalog.path(ReducerKind::Pca)).unwrap();

        assert_eq!(catalog.get(ReducerKind::Pca).unwrap(), &map);
        std::fs::remove_file(catalog.path(ReducerKind::Pca)).unwrap();
        assert_eq!(catalog.get(ReducerKind::Pca).unwrap(), &map);
    }

    #[test]
    fn test_catalog_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let catalog = ProjectionCatalog::new(dir.path());
        std::fs::write(catalog.path(ReducerKind::Tsne), "not json").unwrap();
        assert!(matches!(
            catalog.get(ReducerKind::Tsne),
            Err(PapermapError::Json { .. })
        ));
    }
}
