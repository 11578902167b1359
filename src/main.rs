// CLI for applying batches and querying committed state

use clap::{Parser, Subcommand};
use politoken::config::{ConfigError, GenesisConfig};
use politoken::storage::{LedgerStore, StoreError};
use politoken::{Engine, EngineFault};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "politoken")]
#[command(about = "Deterministic ledger and order book for entity tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a batch of JSON-lines transactions and commit it
    Apply {
        /// Data directory of the snapshot store
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Genesis file, used when the store is empty
        #[arg(short, long)]
        genesis: Option<PathBuf>,

        /// Height of this batch
        #[arg(long)]
        height: u64,

        /// File with one transaction per line
        file: PathBuf,
    },

    /// Answer a point query against the last committed snapshot
    Query {
        #[arg(short, long)]
        data_dir: PathBuf,

        #[arg(short, long)]
        genesis: Option<PathBuf>,

        /// Query path, e.g. account/alice or orderbook/X
        path: String,
    },

    /// Show committed height and digest
    Status {
        #[arg(short, long)]
        data_dir: PathBuf,

        #[arg(short, long)]
        genesis: Option<PathBuf>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("engine fault: {0}")]
    Fault(#[from] EngineFault),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

fn open_engine(data_dir: &Path, genesis: Option<&Path>) -> Result<Engine, CliError> {
    let genesis = match genesis {
        Some(path) => GenesisConfig::load(path)?,
        None => GenesisConfig::default(),
    };
    let store = LedgerStore::open(data_dir)?;
    Ok(Engine::open(&genesis, store)?)
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Apply {
            data_dir,
            genesis,
            height,
            file,
        } => {
            let mut engine = open_engine(&data_dir, genesis.as_deref())?;
            let text = std::fs::read_to_string(&file).map_err(|source| CliError::Read {
                path: file.display().to_string(),
                source,
            })?;
            let txs: Vec<Vec<u8>> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| line.as_bytes().to_vec())
                .collect();

            let outcome = engine.apply_batch(height, &txs)?;
            for result in &outcome.results {
                println!("{}", serde_json::to_string(result)?);
            }
            for intent in &outcome.withdrawals {
                println!("{}", serde_json::to_string(&serde_json::json!({ "withdrawal": intent }))?);
            }
            println!(
                "{}",
                serde_json::json!({ "height": outcome.height, "digest": outcome.digest_hex() })
            );
        }
        Commands::Query {
            data_dir,
            genesis,
            path,
        } => {
            let engine = open_engine(&data_dir, genesis.as_deref())?;
            let response = engine.query(&path)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Status { data_dir, genesis } => {
            let engine = open_engine(&data_dir, genesis.as_deref())?;
            let response = engine.query("status")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "politoken failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
