//! Cli things
//!

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::backfill::{BackfillOptions, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::store::{ProbeMode, StoreOptions};

pub fn db_path_default() -> String {
    shellexpand::tilde("~/.cache/pixvault.sqlite3").to_string()
}

#[derive(Parser, Debug)]
#[command(name = "pixvault", version, about = "Image store with normalized derivatives")]
pub struct CliOpts {
    #[clap(long, help = "Path to the database file", env = "PIXVAULT_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[clap(long, help = "Enable debug logging")]
    pub debug: bool,

    #[clap(long, help = "Don't apply pending schema migrations at startup")]
    pub no_migrate: bool,

    #[clap(
        long,
        help = "Remember whether optional columns exist instead of checking on every call"
    )]
    pub cache_schema_probe: bool,

    #[clap(
        long,
        help = "Total attempts for store operations that fail transiently",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        env = "PIXVAULT_RETRY_ATTEMPTS"
    )]
    pub retry_attempts: u32,

    #[clap(
        long,
        help = "Delay before the first retry in milliseconds, doubled after each attempt",
        default_value_t = 1000,
        env = "PIXVAULT_RETRY_DELAY_MS"
    )]
    pub retry_delay_ms: u64,

    #[clap(long, help = "Log statements slower than this many milliseconds")]
    pub slow_query_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliOpts {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| db_path_default().into())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ),
            probe_mode: match self.cache_schema_probe {
                true => ProbeMode::Cached,
                false => ProbeMode::PerCall,
            },
            slow_query_ms: self.slow_query_ms,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (the default)
    Serve,
    /// Generate missing derivatives and placeholders for stored assets
    Backfill(BackfillArgs),
    /// Ingest every image in a directory
    Import(ImportArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BackfillArgs {
    /// Assets per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Assets processed at once within a batch
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Pause between batches in milliseconds
    #[arg(long, default_value_t = 100)]
    pub batch_pause_ms: u64,
}

impl From<&BackfillArgs> for BackfillOptions {
    fn from(args: &BackfillArgs) -> Self {
        BackfillOptions {
            batch_size: args.batch_size,
            concurrency: args.concurrency,
            batch_pause: Duration::from_millis(args.batch_pause_ms),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ImportArgs {
    /// Directory to read images from
    pub dir: PathBuf,
    /// Status given to imported assets
    #[arg(long)]
    pub status: Option<String>,
}
