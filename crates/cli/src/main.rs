//! offcache command-line driver.
//!
//! Runs the proxy lifecycle against the configured SQLite store, one event
//! per invocation. Reports are printed to stdout as JSON, logs go to stderr.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use offcache_client::{FetchClient, FetchConfig, ProxyOptions};
use offcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(about = "Versioned offline cache proxy", version)]
struct Cli {
    /// Cache version ordinal (default: the configured version).
    #[arg(long = "cache-version", global = true)]
    cache_version: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pre-cache every tracked route into the versioned store.
    Install,
    /// Activate an installed version, deleting every other store.
    Activate,
    /// Send one request through the active version.
    Fetch {
        /// Absolute URL or application path.
        url: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
    },
    /// List cache stores and their entry counts.
    Stores,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let mut options = ProxyOptions::from_app_config(&config)?;
    if let Some(version) = cli.cache_version {
        options.cache_name = options.cache_name.with_version(version);
    }

    let ctx = Context {
        storage: Arc::new(CacheDb::open(&config.db_path).await?),
        network: Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?),
        options,
    };

    let json = match cli.command {
        Command::Install => serde_json::to_string_pretty(&commands::install(&ctx).await?)?,
        Command::Activate => serde_json::to_string_pretty(&commands::activate(&ctx).await?)?,
        Command::Fetch { url, method } => serde_json::to_string_pretty(&commands::fetch(&ctx, &url, &method).await?)?,
        Command::Stores => serde_json::to_string_pretty(&commands::stores(&ctx).await?)?,
    };
    println!("{json}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["offcache", "fetch", "/dashboard", "-X", "post"]).unwrap();
        match cli.command {
            Command::Fetch { url, method } => {
                assert_eq!(url, "/dashboard");
                assert_eq!(method, "post");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.cache_version, None);
    }

    #[test]
    fn test_parse_global_version() {
        let cli = Cli::try_parse_from(["offcache", "install", "--cache-version", "4"]).unwrap();
        assert!(matches!(cli.command, Command::Install));
        assert_eq!(cli.cache_version, Some(4));
    }

    #[test]
    fn test_fetch_requires_url() {
        assert!(Cli::try_parse_from(["offcache", "fetch"]).is_err());
    }
}
