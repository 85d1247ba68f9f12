//! Projection pipeline end to end
//!
//! Embeddings snapshot on disk -> reducer -> coordinates artifact -> catalog

use papermap::config::Config;
use papermap::corpus::Document;
use papermap::projection::{ProjectionCatalog, ProjectionMap, ProjectionPipeline};
use papermap::reduction::{DimensionalityReducer, Pca, ReducerKind, ReductionError};
use papermap::storage;
use papermap::PapermapError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Three topical groups of 12 papers in 16 dimensions; one paper unembedded
fn corpus() -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut documents: Vec<Document> = (0..36)
        .map(|i| {
            let group = i / 12;
            let embedding: Vec<f32> = (0..16)
                .map(|d| {
                    let center = if d % 3 == group { 1.0 } else { 0.0 };
                    center + rng.gen_range(-0.05..0.05)
                })
                .collect();
            Document::new(1000 + i as i64, format!("Paper {}", i), "").with_embedding(embedding)
        })
        .collect();
    documents.push(Document::new(9999, "Withdrawn paper", ""));
    documents
}

fn small_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.data.embeddings_path = dir.path().join("embeddings.json");
    config.data.projections_dir = dir.path().join("projections");
    config.projection.seed = Some(17);
    config.projection.tsne.perplexity = 8.0;
    config.projection.tsne.max_iter = 300;
    config.projection.umap.n_neighbors = 6;
    config.projection.umap.n_epochs = Some(100);
    config
}

#[test]
fn test_every_reducer_writes_its_artifact() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    let documents = corpus();
    storage::save_documents(&config.data.embeddings_path, &documents).unwrap();

    for kind in ReducerKind::ALL {
        let reducer = config.reducer(kind, None).unwrap();
        let output = config.projection_path(kind);
        let map = ProjectionPipeline::new(reducer)
            .run(&config.data.embeddings_path, &output)
            .unwrap();

        assert!(output.exists(), "{} artifact missing", kind);
        assert_eq!(map.len(), 36);
        assert!(map.get(9999).is_none());

        // read back under the same ids
        let loaded = ProjectionMap::load(&output).unwrap();
        assert_eq!(loaded, map);
        for doc in documents.iter().filter(|d| d.has_embedding()) {
            let coords = loaded.get(doc.id).unwrap();
            assert_eq!(coords.len(), 2);
            assert!(coords.iter().all(|c| c.is_finite()));
        }

        println!("✓ {} projection: {} papers", kind, map.len());
    }

    let catalog = ProjectionCatalog::new(&config.data.projections_dir);
    for kind in ReducerKind::ALL {
        assert_eq!(catalog.get(kind).unwrap().len(), 36);
    }
}

#[test]
fn test_seeded_runs_match() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    let documents = corpus();

    for kind in [ReducerKind::Tsne, ReducerKind::Umap] {
        let first = ProjectionPipeline::new(config.reducer(kind, Some(5)).unwrap())
            .project(&documents)
            .unwrap();
        let second = ProjectionPipeline::new(config.reducer(kind, Some(5)).unwrap())
            .project(&documents)
            .unwrap();
        assert_eq!(first, second, "{} not reproducible", kind);
    }
}

#[test]
fn test_artifact_json_layout() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("pca_coordinates.json");

    ProjectionPipeline::new(DimensionalityReducer::Pca(Pca::new(2)))
        .project(&corpus())
        .unwrap()
        .save(&output)
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let object = raw.as_object().unwrap();
    assert_eq!(object.len(), 36);
    let point = object["1000"].as_array().unwrap();
    assert_eq!(point.len(), 2);
}

#[test]
fn test_too_few_papers_for_tsne() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    let documents: Vec<Document> = corpus().into_iter().take(5).collect();

    let result = ProjectionPipeline::new(config.reducer(ReducerKind::Tsne, None).unwrap())
        .project(&documents);
    assert!(matches!(
        result,
        Err(PapermapError::Reduction(ReductionError::InsufficientSamples { .. }))
    ));
}

#[test]
fn test_missing_embeddings_snapshot() {
    let dir = TempDir::new().unwrap();
    let result = ProjectionPipeline::new(DimensionalityReducer::Pca(Pca::new(2))).run(
        &dir.path().join("absent.json"),
        &dir.path().join("pca_coordinates.json"),
    );
    assert!(matches!(result, Err(PapermapError::SnapshotNotFound { .. })));
}
