// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parlance - pronunciation practice with prepaid credits.
//!
//! This is the binary entry point: it loads configuration, opens storage and
//! dispatches to the subcommand modules.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod credits;
mod doctor;
mod stats;
mod submit;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parlance_config::ParlanceConfig;
use parlance_core::ParlanceError;
use parlance_storage::SqliteStorage;

/// Parlance - pronunciation practice with prepaid credits.
#[derive(Parser, Debug)]
#[command(name = "parlance", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit an audio turn and wait for its pronunciation analysis.
    Submit(submit::SubmitArgs),
    /// Show a user's phoneme accuracy report.
    Stats {
        user: String,
        /// Number of weakest phonemes to list.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show a user's credit balance and recent transactions.
    Credits {
        user: String,
        /// Number of transactions to list.
        #[arg(long, default_value_t = 10)]
        history: usize,
        #[arg(long)]
        json: bool,
    },
    /// Add purchased credits to a user's balance.
    TopUp {
        user: String,
        amount: i64,
        #[arg(long, default_value = "top-up")]
        reason: String,
        /// External reference, such as a payment id.
        #[arg(long)]
        reference: Option<String>,
    },
    /// Reset a user's balance to their monthly allowance.
    Refresh {
        user: String,
        /// Refresh even if the current period has not ended.
        #[arg(long)]
        force: bool,
        /// Set a new monthly allowance before refreshing.
        #[arg(long)]
        allowance: Option<i64>,
    },
    /// Run diagnostic checks against the configured services.
    Doctor {
        /// Also run integrity and backlog checks.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => parlance_config::load_and_validate_path(path),
        None => parlance_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            parlance_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Submit(args) => submit::run_submit(&config, args).await,
        Commands::Stats { user, limit, json } => {
            stats::run_stats(&config, &user, limit, json).await
        }
        Commands::Credits {
            user,
            history,
            json,
        } => credits::run_credits(&config, &user, history, json).await,
        Commands::TopUp {
            user,
            amount,
            reason,
            reference,
        } => credits::run_top_up(&config, &user, amount, &reason, reference.as_deref()).await,
        Commands::Refresh {
            user,
            force,
            allowance,
        } => credits::run_refresh(&config, &user, force, allowance).await,
        Commands::Doctor { deep, plain } => doctor::run_doctor(&config, deep, plain).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Opens the configured SQLite database, applying migrations.
pub(crate) async fn open_storage(
    config: &ParlanceConfig,
) -> Result<Arc<SqliteStorage>, ParlanceError> {
    SqliteStorage::open(config.storage.clone()).await.map(Arc::new)
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parlance={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
