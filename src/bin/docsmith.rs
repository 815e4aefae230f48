//! CLI binary for docsmith.
//!
//! Results are printed to stdout as pretty JSON; tracing goes to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docsmith::{DocsmithConfig, build_engine};
use docsmith_engine::{DocsEngine, EngineError};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Docsmith: search library documentation and find code examples.
#[derive(Parser)]
#[command(name = "docsmith", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "DOCSMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search a library's documentation.
    Search {
        /// Library to search, e.g. `python`.
        library: String,
        /// Search term.
        term: String,
        /// Number of results to return.
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// Find code examples for a function.
    Examples {
        /// Library the function belongs to.
        library: String,
        /// Function or module name.
        function: String,
        /// Only return examples in this language.
        #[arg(short, long)]
        language: Option<String>,
        /// Number of examples to return.
        #[arg(short = 'n', long)]
        max_examples: Option<usize>,
    },

    /// List the configured libraries.
    Libraries,

    /// Print adapter health, optionally after probing every library.
    Health {
        /// Search every library for this term first.
        #[arg(long)]
        probe: Option<String>,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docsmith=info,docsmith_engine=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::InitConfig { force } = cli.command {
        let path = cli
            .config
            .unwrap_or_else(DocsmithConfig::default_config_path);
        return init_config(path, force);
    }

    let config = DocsmithConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    let engine = build_engine(&config).context("failed to start engine")?;

    match cli.command {
        Command::Search {
            library,
            term,
            max_results,
        } => {
            let result = engine
                .search_docs(&library, &term, max_results)
                .await
                .map_err(engine_error)?;
            print_json(&result)
        }
        Command::Examples {
            library,
            function,
            language,
            max_examples,
        } => {
            let result = engine
                .code_examples(&library, &function, language.as_deref(), max_examples)
                .await
                .map_err(engine_error)?;
            print_json(&result)
        }
        Command::Libraries => print_json(&engine.available_libraries()),
        Command::Health { probe } => {
            if let Some(term) = probe {
                probe_all(&engine, &term).await;
            }
            print_json(&engine.health())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn init_config(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    DocsmithConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

async fn probe_all(engine: &DocsEngine, term: &str) {
    let probes = engine
        .available_libraries()
        .into_iter()
        .map(|library| async move {
            let outcome = engine.search_docs(&library, term, None).await;
            (library, outcome)
        });
    for (library, outcome) in futures::future::join_all(probes).await {
        match outcome {
            Ok(result) => tracing::info!(
                library,
                hits = result.hits.len(),
                partial = result.partial,
                "probe answered"
            ),
            Err(e) => tracing::warn!(library, error = %e, "probe failed"),
        }
    }
}

fn engine_error(err: EngineError) -> anyhow::Error {
    anyhow::anyhow!("{err} (status {})", err.status_code())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
