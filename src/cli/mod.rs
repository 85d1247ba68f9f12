//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "papermap",
    version,
    author = "neur0map",
    about = "Conference paper search and embedding-space maps",
    long_about = "Papermap ranks conference papers against a query with TF-IDF or sentence embeddings, \
                  fills in missing paper embeddings, and projects the embedding space to 2-D with \
                  PCA, t-SNE or UMAP for visualization."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/papermap/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank papers against a query (an empty query returns a random sample)
    Search {
        /// Search query text
        query: String,

        /// Number of results to return (defaults to search.default_top_n)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Override the configured ranking method
        #[arg(short, long, value_parser = ["tfidf", "embedding"])]
        method: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compute missing paper embeddings and write the embeddings snapshot
    Embed {
        /// Corpus snapshot to read (defaults to data.corpus_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Embeddings snapshot to write (defaults to data.embeddings_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Project paper embeddings to 2-D and write the coordinates artifact
    Project {
        /// Reducer to run (defaults to projection.reducer)
        #[arg(short, long, value_parser = ["pca", "tsne", "umap"])]
        reducer: Option<String>,

        /// Output file (defaults to {data.projections_dir}/{reducer}_coordinates.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Random seed for t-SNE and UMAP
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print stored projection coordinates
    Coords {
        /// Reducer whose artifact to read (defaults to projection.reducer)
        #[arg(short, long, value_parser = ["pca", "tsne", "umap"])]
        reducer: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
