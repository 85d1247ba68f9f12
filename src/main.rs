use anyhow::{Context, Result};
use papermap::cli::{Cli, Commands, ConfigAction};
use papermap::config::Config;
use papermap::embedding::{EmbeddingBatch, EmbeddingProvider, FastEmbedProvider};
use papermap::error::PapermapError;
use papermap::projection::{ProjectionCatalog, ProjectionPipeline};
use papermap::reduction::ReducerKind;
use papermap::search::{SearchMethod, SearchService};
use papermap::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Search {
            query,
            limit,
            method,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_search(&config, &query, limit, method, json)?;
        }
        Commands::Embed { input, output } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_embed(&config, input, output)?;
        }
        Commands::Project {
            reducer,
            output,
            seed,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_project(&config, reducer, output, seed)?;
        }
        Commands::Coords { reducer } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_coords(&config, reducer)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "papermap=debug" } else { "papermap=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    method: Option<String>,
    json: bool,
) -> Result<()> {
    let method: SearchMethod = match method {
        Some(method) => method.parse()?,
        None => config.search_method()?,
    };

    let corpus = storage::load_corpus(
        &expand_path(&config.data.embeddings_path)?,
        &expand_path(&config.data.corpus_path)?,
    )?;

    let model = config.embedding.model.clone();
    let service = SearchService::build(corpus, method, config.search.max_top_n, move || {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FastEmbedProvider::new(&model)?);
        Ok(provider)
    })
    .with_context(|| format!("Failed to start {} search", method))?;

    let top_n = limit.unwrap_or(config.search.default_top_n);
    let results = service
        .search(query, top_n)
        .with_context(|| format!("Search for '{}' failed", query))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No papers found");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!("{:>3}. [{:.4}] {} (id {})", rank + 1, result.score, result.title, result.id);
        let authors: Vec<&str> = result.authors.iter().map(|a| a.name.as_str()).collect();
        if !authors.is_empty() {
            println!("     {}", authors.join(", "));
        }
        if !result.url.is_empty() {
            println!("     {}", result.url);
        }
    }

    Ok(())
}

fn cmd_embed(config: &Config, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let output = expand_path(&output.unwrap_or_else(|| config.data.embeddings_path.clone()))?;
    let input = match input {
        Some(input) => expand_path(&input)?,
        // resume from a partial embeddings snapshot when there is one
        None if output.exists() => output.clone(),
        None => expand_path(&config.data.corpus_path)?,
    };

    let mut documents = storage::load_documents(&input)
        .with_context(|| format!("Failed to load corpus from {}", input.display()))?;
    tracing::info!("Loaded {} papers from {}", documents.len(), input.display());

    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    let batch = EmbeddingBatch::new(
        &provider,
        config.embedding.batch_size,
        config.embedding.save_interval,
    );
    let result = batch.run(&mut documents, &output)?;

    println!("✓ Embeddings saved to {}", output.display());
    println!(
        "  Processed: {}, skipped: {}, empty text: {} ({}ms)",
        result.processed, result.skipped, result.empty, result.duration_ms
    );

    Ok(())
}

fn cmd_project(
    config: &Config,
    reducer: Option<String>,
    output: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<()> {
    let kind = reducer_kind(config, reducer)?;
    let reducer = config.reducer(kind, seed)?;
    let input = expand_path(&config.data.embeddings_path)?;
    let output = match output {
        Some(output) => expand_path(&output)?,
        None => expand_path(&config.projection_path(kind))?,
    };

    let map = ProjectionPipeline::new(reducer)
        .run(&input, &output)
        .with_context(|| format!("{} projection failed", kind))?;

    println!("✓ {} coordinates for {} papers saved to {}", kind, map.len(), output.display());
    Ok(())
}

fn cmd_coords(config: &Config, reducer: Option<String>) -> Result<()> {
    let kind = reducer_kind(config, reducer)?;
    let catalog = ProjectionCatalog::new(expand_path(&config.data.projections_dir)?);
    let map = catalog.get(kind)?;
    println!("{}", serde_json::to_string_pretty(map)?);
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| PapermapError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let value = match section {
                Some(section) => value
                    .get(&section)
                    .cloned()
                    .ok_or_else(|| PapermapError::Config(format!("Unknown section: {}", section)))?,
                None => value,
            };

            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'papermap config init' to create one."
        );
    }

    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(profile) = profile {
        config.apply_profile(&profile)?;
    }

    Ok(config)
}

fn reducer_kind(config: &Config, reducer: Option<String>) -> Result<ReducerKind> {
    Ok(match reducer {
        Some(name) => name.parse()?,
        None => config.reducer_kind()?,
    })
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PapermapError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PapermapError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
