//! CLI entry point for the kinopro extractor.

use anyhow::{Context, Result};
use clap::Parser;
use kinopro_core::{Credentials, ExtractorConfig, KinoproExtractor};
use tracing::debug;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over -q / -v
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(url = %args.url, cache_dir = ?args.cache_dir, "CLI arguments parsed");

    let mut config = ExtractorConfig::default().with_timeout_secs(args.timeout);
    if let Some(cache_dir) = args.cache_dir {
        config = config.with_cache_dir(cache_dir);
    }
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }

    let credentials = Credentials::from_options(args.username, args.password).ok();
    let extractor = KinoproExtractor::new(config);
    let collection = extractor
        .extract(&args.url, credentials.as_ref())
        .await
        .with_context(|| format!("extraction failed for {}", args.url))?;

    println!("{}", serde_json::to_string_pretty(&collection)?);
    Ok(())
}
