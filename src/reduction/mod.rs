//! Dimensionality reduction of embedding matrices
//!
//! Three interchangeable reducers map an `N x D` matrix to `N x k`, keeping
//! row order:
//! - `Pca`: linear projection onto the top principal axes (deterministic)
//! - `Tsne`: exact t-distributed stochastic neighbour embedding
//! - `Umap`: uniform manifold approximation and projection
//!
//! t-SNE starts from the PCA layout. UMAP starts from a random layout; set a
//! seed to reproduce a run.

mod pca;
mod tsne;
mod umap;

pub use pca::Pca;
pub use tsne::Tsne;
pub use umap::{fit_ab, Umap};

use crate::error::PapermapError;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("{algorithm} needs at least {required} samples, got {actual}")]
    InsufficientSamples {
        algorithm: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Invalid reducer parameter: {0}")]
    InvalidParameter(String),
}

/// Reducer selected by `projection.reducer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReducerKind {
    Pca,
    Tsne,
    Umap,
}

impl ReducerKind {
    pub const NAMES: &'static [&'static str] = &["pca", "tsne", "umap"];
    pub const ALL: [ReducerKind; 3] = [ReducerKind::Pca, ReducerKind::Tsne, ReducerKind::Umap];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReducerKind::Pca => "pca",
            ReducerKind::Tsne => "tsne",
            ReducerKind::Umap => "umap",
        }
    }

    /// File name of this reducer's projection artifact
    pub fn artifact_name(&self) -> String {
        format!("{}_coordinates.json", self.as_str())
    }
}

impl FromStr for ReducerKind {
    type Err = PapermapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(ReducerKind::Pca),
            "tsne" | "t-sne" => Ok(ReducerKind::Tsne),
            "umap" => Ok(ReducerKind::Umap),
            _ => Err(PapermapError::InvalidConfiguration {
                kind: "reducer",
                value: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance used to build the UMAP neighbour graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UmapMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl UmapMetric {
    pub const NAMES: &'static [&'static str] = &["cosine", "euclidean"];

    pub fn as_str(&self) -> &'static str {
        match self {
            UmapMetric::Cosine => "cosine",
            UmapMetric::Euclidean => "euclidean",
        }
    }
}

impl FromStr for UmapMetric {
    type Err = PapermapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(UmapMetric::Cosine),
            "euclidean" => Ok(UmapMetric::Euclidean),
            _ => Err(PapermapError::InvalidConfiguration {
                kind: "metric",
                value: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

impl fmt::Display for UmapMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured reducer
#[derive(Debug, Clone)]
pub enum DimensionalityReducer {
    Pca(Pca),
    Tsne(Tsne),
    Umap(Umap),
}

impl DimensionalityReducer {
    /// Project `data` (`N x D`) to `N x k`
    pub fn reduce(&self, data: &Array2<f32>) -> Result<Array2<f32>, ReductionError> {
        let (n, d) = data.dim();
        tracing::info!(
            "Reducing {} x {} matrix with {} to {} components",
            n,
            d,
            self.kind(),
            self.n_components()
        );

        match self {
            DimensionalityReducer::Pca(pca) => pca.reduce(data),
            DimensionalityReducer::Tsne(tsne) => tsne.reduce(data),
            DimensionalityReducer::Umap(umap) => umap.reduce(data),
        }
    }

    pub fn kind(&self) -> ReducerKind {
        match self {
            DimensionalityReducer::Pca(_) => ReducerKind::Pca,
            DimensionalityReducer::Tsne(_) => ReducerKind::Tsne,
            DimensionalityReducer::Umap(_) => ReducerKind::Umap,
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            DimensionalityReducer::Pca(pca) => pca.n_components,
            DimensionalityReducer::Tsne(tsne) => tsne.n_components,
            DimensionalityReducer::Umap(umap) => umap.n_components,
        }
    }
}

fn check_components(n_components: usize) -> Result<(), ReductionError> {
    if n_components == 0 {
        return Err(ReductionError::InvalidParameter(
            "n_components must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
