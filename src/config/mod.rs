//! Configuration management for papermap
//!
//! Settings come from a TOML file, optionally narrowed by a named profile and
//! then overridden by `PAPERMAP_<SECTION>__<KEY>` environment variables.
//! Every value is validated before it reaches the search or projection code.

use crate::error::{PapermapError, Result};
use crate::reduction::{DimensionalityReducer, Pca, ReducerKind, Tsne, Umap, UmapMetric};
use crate::search::SearchMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub data: DataConfig,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Snapshot and artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Scraped corpus without embeddings
    pub corpus_path: PathBuf,
    /// Corpus with embeddings filled in
    pub embeddings_path: PathBuf,
    /// Directory holding `{reducer}_coordinates.json`
    pub projections_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "tfidf" or "embedding"
    pub method: String,
    pub default_top_n: usize,
    pub max_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Documents processed between snapshot saves
    pub save_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// "pca", "tsne" or "umap"
    pub reducer: String,
    pub n_components: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub tsne: TsneConfig,
    pub umap: UmapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsneConfig {
    pub perplexity: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmapConfig {
    pub n_neighbors: usize,
    pub min_dist: f64,
    /// "cosine" or "euclidean"
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_epochs: Option<usize>,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reducer: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PapermapError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PapermapError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults
    ///
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!("No config at {:?}, using defaults", path);
        let mut config = Self::default();
        config.apply_env_overrides()?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PapermapError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PapermapError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| PapermapError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(method) = overrides.search_method {
            self.search.method = method;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(reducer) = overrides.reducer {
            self.projection.reducer = reducer;
        }

        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PAPERMAP_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `PAPERMAP_`-prefixed overrides from `vars`, ignoring other keys
    ///
    /// A value that does not parse for its key fails the whole load.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("PAPERMAP_") {
                self.set_value_from_env(config_key, &value)?;
            }
        }
        Ok(())
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DATA__CORPUS_PATH" => self.data.corpus_path = PathBuf::from(value),
            "DATA__EMBEDDINGS_PATH" => self.data.embeddings_path = PathBuf::from(value),
            "DATA__PROJECTIONS_DIR" => self.data.projections_dir = PathBuf::from(value),
            "SEARCH__METHOD" => self.search.method = value.to_string(),
            "SEARCH__DEFAULT_TOP_N" => self.search.default_top_n = parse_value(path, value)?,
            "SEARCH__MAX_TOP_N" => self.search.max_top_n = parse_value(path, value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__SAVE_INTERVAL" => self.embedding.save_interval = parse_value(path, value)?,
            "PROJECTION__REDUCER" => self.projection.reducer = value.to_string(),
            "PROJECTION__N_COMPONENTS" => self.projection.n_components = parse_value(path, value)?,
            "PROJECTION__SEED" => self.projection.seed = Some(parse_value(path, value)?),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    pub fn search_method(&self) -> Result<SearchMethod> {
        self.search.method.parse()
    }

    pub fn reducer_kind(&self) -> Result<ReducerKind> {
        self.projection.reducer.parse()
    }

    /// Build the reducer named by `kind` from the projection settings
    ///
    /// `seed` takes precedence over `projection.seed`.
    pub fn reducer(&self, kind: ReducerKind, seed: Option<u64>) -> Result<DimensionalityReducer> {
        let projection = &self.projection;
        let n_components = projection.n_components;
        let seed = seed.or(projection.seed);

        Ok(match kind {
            ReducerKind::Pca => DimensionalityReducer::Pca(Pca::new(n_components)),
            ReducerKind::Tsne => DimensionalityReducer::Tsne(Tsne {
                perplexity: projection.tsne.perplexity,
                learning_rate: projection.tsne.learning_rate,
                max_iter: projection.tsne.max_iter,
                seed,
                ..Tsne::new(n_components)
            }),
            ReducerKind::Umap => DimensionalityReducer::Umap(Umap {
                n_neighbors: projection.umap.n_neighbors,
                min_dist: projection.umap.min_dist,
                metric: projection.umap.metric.parse::<UmapMetric>()?,
                n_epochs: projection.umap.n_epochs,
                seed,
                ..Umap::new(n_components)
            }),
        })
    }

    /// Path of the projection artifact for `kind`
    pub fn projection_path(&self, kind: ReducerKind) -> PathBuf {
        self.data.projections_dir.join(kind.artifact_name())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PapermapError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("papermap").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| PapermapError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as {}", value, std::any::type_name::<T>()),
    })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            data: DataConfig {
                corpus_path: data_dir.join("scraped_data.json"),
                embeddings_path: data_dir.join("embeddings.json"),
                projections_dir: data_dir.clone(),
            },
            search: SearchConfig {
                method: SearchMethod::Embedding.as_str().to_string(),
                default_top_n: 10,
                max_top_n: 2000,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
                save_interval: 10,
            },
            projection: ProjectionConfig {
                reducer: ReducerKind::Umap.as_str().to_string(),
                n_components: 2,
                seed: None,
                tsne: TsneConfig {
                    perplexity: 30.0,
                    learning_rate: 200.0,
                    max_iter: 1000,
                },
                umap: UmapConfig {
                    n_neighbors: 15,
                    min_dist: 0.1,
                    metric: UmapMetric::Cosine.as_str().to_string(),
                    n_epochs: None,
                },
            },
            profiles: HashMap::new(),
        }
    }
}
