//! Configuration types for admission-import
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration for a pipeline run, with validation

use crate::error::ConfigError;
use crate::partition::DEFAULT_BATCH_SIZE;
use crate::pipeline::PipelineOptions;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 256;

/// Maximum records per batch
const MAX_BATCH_SIZE: usize = 10_000;

/// Environment variable that sets the default worker count
pub const THREADS_ENV_VAR: &str = "ADMISSION_IMPORT_THREADS";

/// Concurrent import of admission candidates into SQLite
#[derive(Parser, Debug, Clone)]
#[command(
    name = "admission-import",
    version,
    about = "Concurrent two-phase import of admission candidates",
    after_help = "EXAMPLES:\n    \
        admission-import --db admission.db init\n    \
        admission-import reference seed.json\n    \
        admission-import load --call-round round-1 candidates.csv\n    \
        admission-import run --call-round round-1 -w 8 -b 100\n    \
        admission-import stats"
)]
pub struct CliArgs {
    /// SQLite database file
    #[arg(long, global = true, default_value = "admission.db", value_name = "FILE")]
    pub db: PathBuf,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the schema and seed the fixed taxonomies
    Init,

    /// Load periods, call rounds, programs, queues and postal codes from JSON
    Reference {
        #[arg(value_name = "FILE.json")]
        file: PathBuf,
    },

    /// Stage raw candidate rows for a call round
    Load {
        /// Call round the rows belong to
        #[arg(long, value_name = "ID")]
        call_round: String,

        #[arg(value_name = "FILE.csv")]
        file: PathBuf,
    },

    /// Run the import pipeline for a call round
    Run(RunArgs),

    /// Show row counts for every table
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Call round to import
    #[arg(long, value_name = "ID")]
    pub call_round: String,

    /// Worker threads per phase (defaults to $ADMISSION_IMPORT_THREADS, then CPU count)
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Records per batch
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub batch_size: usize,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validated configuration for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub db_path: PathBuf,
    pub call_round_id: String,
    pub options: PipelineOptions,
    pub json: bool,
}

impl ImportConfig {
    pub fn from_args(db_path: &Path, args: &RunArgs) -> Result<Self, ConfigError> {
        let env = std::env::var(THREADS_ENV_VAR).ok();
        Self::from_args_with_env(db_path, args, env.as_deref())
    }

    fn from_args_with_env(db_path: &Path, args: &RunArgs, env: Option<&str>) -> Result<Self, ConfigError> {
        let call_round_id = args.call_round.trim();
        if call_round_id.is_empty() {
            return Err(ConfigError::EmptyCallRound);
        }

        let worker_threads = resolve_workers(args.workers, env)?;

        if args.batch_size == 0 || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                value: args.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }

        Ok(ImportConfig {
            db_path: db_path.to_path_buf(),
            call_round_id: call_round_id.to_string(),
            options: PipelineOptions {
                worker_threads,
                batch_size: args.batch_size,
            },
            json: args.json,
        })
    }
}

/// Explicit flag, then the environment, then available parallelism
fn resolve_workers(explicit: Option<usize>, env: Option<&str>) -> Result<usize, ConfigError> {
    let workers = match (explicit, env) {
        (Some(n), _) => n,
        (None, Some(raw)) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
            var: THREADS_ENV_VAR,
            value: raw.to_string(),
        })?,
        (None, None) => PipelineOptions::default().worker_threads,
    };

    if workers == 0 || workers > MAX_WORKERS {
        return Err(ConfigError::InvalidWorkerCount {
            value: workers,
            max: MAX_WORKERS,
        });
    }

    Ok(workers)
}
