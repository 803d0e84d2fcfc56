use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "squash")]
#[command(author, version, about = "Image and PDF compression server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SQUASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long, env = "SQUASH_HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long, env = "SQUASH_PORT")]
        port: Option<u16>,
    },

    /// Convert a single file without starting the server
    Convert {
        /// Image or PDF to convert
        #[arg(required = true)]
        input: PathBuf,

        /// Where to write the result (defaults to next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target image format: jpeg, png, webp or avif (ignored for PDFs)
        #[arg(short, long, default_value = "jpeg")]
        format: String,

        /// Compression level: low, medium or high
        #[arg(long, default_value = "medium")]
        compression: String,

        /// Downscale images whose longest edge exceeds this many pixels
        #[arg(long)]
        max_dimension: Option<u32>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,

    /// Generate a random API key for the auth section of the config
    GenerateApiKey,
}
