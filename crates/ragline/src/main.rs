// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ragline - multi-tenant retrieval-augmented chat.
//!
//! This is the binary entry point: it loads configuration, builds the
//! use-case graph, and runs one subcommand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod ingest;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragline_config::RaglineConfig;

/// Ragline - multi-tenant retrieval-augmented chat.
#[derive(Parser, Debug)]
#[command(name = "ragline", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to the XDG lookup hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway.
    Serve,
    /// Ingest sources into a new knowledge space and print the outcome.
    Ingest {
        /// Tenant that owns the new space.
        #[arg(long)]
        tenant: String,
        /// Display name of the new space.
        #[arg(long)]
        name: String,
        /// Markdown product catalog to ingest instead of URLs.
        #[arg(long, conflicts_with = "urls")]
        products: Option<PathBuf>,
        /// Source URLs to crawl.
        #[arg(required_unless_present = "products")]
        urls: Vec<String>,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and print the effective settings.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> RaglineConfig {
    let loaded = match path {
        Some(path) => ragline_config::load_and_validate_path(path),
        None => ragline_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            ragline_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `logging.level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ragline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Commands::Serve => {
            init_tracing(&config.logging.level);
            serve::run_serve(config).await
        }
        Commands::Ingest {
            tenant,
            name,
            products,
            urls,
        } => {
            init_tracing(&config.logging.level);
            ingest::run_ingest(config, ingest::IngestArgs {
                tenant,
                name,
                products,
                urls,
            })
            .await
        }
        Commands::Config {
            action: ConfigAction::Check,
        } => app::check_config(&config).map(|summary| println!("{summary}")),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
