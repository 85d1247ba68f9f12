use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::FastEmbedProvider;
use crate::error::{PapermapError, Result, ValidationError};
use crate::reduction::{ReducerKind, UmapMetric};
use crate::search::SearchMethod;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_data(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_projection(config, &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PapermapError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_data(config: &Config, errors: &mut Vec<ValidationError>) {
        let paths = [
            ("data.corpus_path", &config.data.corpus_path),
            ("data.embeddings_path", &config.data.embeddings_path),
            ("data.projections_dir", &config.data.projections_dir),
        ];
        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(key, "Path cannot be empty"));
            }
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::check_name::<SearchMethod>("search.method", &config.search.method, errors);

        if config.search.max_top_n == 0 {
            errors.push(ValidationError::new(
                "search.max_top_n",
                "Maximum result count must be greater than 0",
            ));
        }

        let default = config.search.default_top_n;
        if default == 0 || default > config.search.max_top_n {
            errors.push(ValidationError::new(
                "search.default_top_n",
                format!(
                    "Default result count must be between 1 and {}, got {}",
                    config.search.max_top_n, default
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.save_interval == 0 {
            errors.push(ValidationError::new(
                "embedding.save_interval",
                "Save interval must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        } else if !FastEmbedProvider::is_supported(&config.embedding.model) {
            errors.push(ValidationError::new(
                "embedding.model",
                format!("Unsupported embedding model: {}", config.embedding.model),
            ));
        }
    }

    fn validate_projection(config: &Config, errors: &mut Vec<ValidationError>) {
        let projection = &config.projection;
        Self::check_name::<ReducerKind>("projection.reducer", &projection.reducer, errors);

        if projection.n_components == 0 {
            errors.push(ValidationError::new(
                "projection.n_components",
                "Output dimensionality must be greater than 0",
            ));
        }

        let tsne = &projection.tsne;
        if tsne.perplexity.is_nan() || tsne.perplexity <= 0.0 {
            errors.push(ValidationError::new(
                "projection.tsne.perplexity",
                format!("Perplexity must be positive, got {}", tsne.perplexity),
            ));
        }
        if tsne.learning_rate.is_nan() || tsne.learning_rate <= 0.0 {
            errors.push(ValidationError::new(
                "projection.tsne.learning_rate",
                format!("Learning rate must be positive, got {}", tsne.learning_rate),
            ));
        }
        if tsne.max_iter == 0 {
            errors.push(ValidationError::new(
                "projection.tsne.max_iter",
                "Iteration count must be greater than 0",
            ));
        }

        let umap = &projection.umap;
        Self::check_name::<UmapMetric>("projection.umap.metric", &umap.metric, errors);
        if umap.n_neighbors < 2 {
            errors.push(ValidationError::new(
                "projection.umap.n_neighbors",
                format!("Neighbour count must be at least 2, got {}", umap.n_neighbors),
            ));
        }
        if !(0.0..=1.0).contains(&umap.min_dist) {
            errors.push(ValidationError::new(
                "projection.umap.min_dist",
                format!("min_dist must be between 0.0 and 1.0, got {}", umap.min_dist),
            ));
        }
        if umap.n_epochs == Some(0) {
            errors.push(ValidationError::new(
                "projection.umap.n_epochs",
                "Epoch count must be greater than 0",
            ));
        }
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        for (name, overrides) in &config.profiles {
            if let Some(method) = &overrides.search_method {
                Self::check_name::<SearchMethod>(
                    &format!("profiles.{}.search_method", name),
                    method,
                    errors,
                );
            }
            if let Some(reducer) = &overrides.reducer {
                Self::check_name::<ReducerKind>(&format!("profiles.{}.reducer", name), reducer, errors);
            }
        }
    }

    fn check_name<T>(path: &str, value: &str, errors: &mut Vec<ValidationError>)
    where
        T: std::str::FromStr<Err = PapermapError>,
    {
        if let Err(e) = value.parse::<T>() {
            errors.push(ValidationError::new(path, e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileOverrides;

    fn failing_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(PapermapError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_names_rejected() {
        let mut config = Config::default();
        config.search.method = "bm25".to_string();
        config.projection.reducer = "isomap".to_string();
        config.projection.umap.metric = "hamming".to_string();

        let paths = failing_paths(&config);
        assert!(paths.contains(&"search.method".to_string()));
        assert!(paths.contains(&"projection.reducer".to_string()));
        assert!(paths.contains(&"projection.umap.metric".to_string()));
    }

    #[test]
    fn test_numeric_bounds() {
        let mut config = Config::default();
        config.search.default_top_n = 5000;
        config.embedding.batch_size = 0;
        config.projection.tsne.perplexity = -1.0;
        config.projection.umap.n_neighbors = 1;

        let paths = failing_paths(&config);
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn test_invalid_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "broken".to_string(),
            ProfileOverrides {
                reducer: Some("lle".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(failing_paths(&config), vec!["profiles.broken.reducer".to_string()]);
    }

    #[test]
    fn test_unsupported_model() {
        let mut config = Config::default();
        config.embedding.model = "word2vec".to_string();
        assert_eq!(failing_paths(&config), vec!["embedding.model".to_string()]);
    }
}
