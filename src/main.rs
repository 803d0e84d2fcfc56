mod cli;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::Parser;
use cli::{Cli, Commands};
use rand::RngCore;
use sq_codec::{Codec, CompressionLevel, ImageCodec, ImageOptions, InputKind, OutputFormat, PdfCodec};
use sq_core::config::Config;
use sq_core::{ArtifactStore, ProgressBroadcaster};
use sq_server::conversion::Orchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "squash=trace,sq_server=trace,sq_codec=trace,sq_core=trace,tower_http=debug".to_string()
        } else {
            "squash=debug,sq_server=debug,sq_codec=debug,sq_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert {
            input,
            output,
            format,
            compression,
            max_dimension,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(
                &input,
                output,
                &format,
                &compression,
                max_dimension,
            ))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("squash {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::GenerateApiKey => {
            println!("{}", generate_api_key());
            Ok(())
        }
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting squash server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    if config.auth.enabled {
        tracing::info!("API key authentication enabled");
    }

    sq_server::start(config).await?;
    Ok(())
}

/// Convert one file through the same orchestrator the server uses, printing
/// progress to stderr.
async fn convert_file(
    input: &Path,
    output: Option<PathBuf>,
    format: &str,
    compression: &str,
    max_dimension: Option<u32>,
) -> Result<()> {
    let source = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let level = CompressionLevel::parse(compression);

    let codec: Arc<dyn Codec> = match InputKind::sniff(&source) {
        Some(InputKind::Pdf) => Arc::new(PdfCodec::new(level)),
        Some(InputKind::Image(_)) => {
            let format = OutputFormat::parse(format)
                .with_context(|| format!("Unsupported output format: {format}"))?;
            let options = ImageOptions::new(format, level).with_max_dimension(max_dimension);
            Arc::new(ImageCodec::new(options))
        }
        None => anyhow::bail!("{} is not a supported image or PDF", input.display()),
    };

    let progress = Arc::new(ProgressBroadcaster::default());
    let store = ArtifactStore::default();
    let orchestrator = Orchestrator::new(progress.clone(), store.clone());

    let mut rx = progress.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match &event.error {
                Some(error) => eprintln!("[failed] {}: {error}", event.message),
                None => eprintln!("[{:>5.1}%] {}", event.progress, event.message),
            }
            if event.is_failure() || event.progress >= 100.0 {
                break;
            }
        }
    });

    let display_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result = orchestrator.run(codec, source, &display_name).await;
    let _ = printer.await;
    let result = result?;

    let record = store.get(&result.id)?;
    let destination = output.unwrap_or_else(|| input.with_file_name(&result.file_name));
    if destination == input {
        anyhow::bail!(
            "Refusing to overwrite the input file {}; pass --output",
            input.display()
        );
    }
    std::fs::write(&destination, &record.content)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    println!(
        "{} -> {}: {} -> {} bytes ({} smaller)",
        input.display(),
        destination.display(),
        result.original_size,
        result.result_size,
        result.ratio
    );
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p).with_context(|| format!("Invalid config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Auth enabled: {}", config.auth.enabled);
    println!("  Max upload: {} bytes", config.uploads.max_bytes);
    println!(
        "  Artifacts: retention {}s, grace {}s",
        config.artifacts.retention_secs, config.artifacts.grace_secs
    );

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
