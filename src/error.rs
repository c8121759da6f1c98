// 🚨 Error Types - one taxonomy for the whole import run
//
// Every failure aborts the run. The kinds below only say WHERE it came from:
// - Precondition: nothing was touched yet
// - Data: a raw record or a reference lookup was bad
// - Concurrency: a lock or barrier broke
// - Persistence: a bulk insert failed (other batches may already be written)

use crate::entities::EntityCategory;
use thiserror::Error;

/// Alias for Results returning [`ImportError`].
pub type Result<T> = std::result::Result<T, ImportError>;

/// Top-level error type for the importer
#[derive(Error, Debug)]
pub enum ImportError {
    // ========================================================================
    // PRECONDITIONS
    // ========================================================================
    #[error("No enrollment period is in progress")]
    NoPeriodInProgress,

    #[error("Call round '{call_round}' belongs to enrollment period '{period}', which is not in progress")]
    PeriodNotInProgress { call_round: String, period: String },

    #[error("Call round not found: '{0}'")]
    CallRoundNotFound(String),

    // ========================================================================
    // DATA
    // ========================================================================
    #[error("Malformed {field} '{value}': {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Reference data missing: {kind} '{key}'")]
    ReferenceMissing { kind: &'static str, key: String },

    // ========================================================================
    // CONCURRENCY
    // ========================================================================
    #[error("Index merge lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Completion barrier broken: {signalled} of {expected} tasks signalled")]
    BarrierBroken { expected: usize, signalled: usize },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    // ========================================================================
    // PERSISTENCE
    // ========================================================================
    #[error("Failed to persist {category} batch: {source}")]
    Persistence {
        category: EntityCategory,
        #[source]
        source: rusqlite::Error,
    },

    // ========================================================================
    // INFRASTRUCTURE
    // ========================================================================
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Where in the run an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Data,
    Concurrency,
    Persistence,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Data => "data",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::NoPeriodInProgress
            | ImportError::PeriodNotInProgress { .. }
            | ImportError::CallRoundNotFound(_) => ErrorKind::Precondition,
            ImportError::Malformed { .. } | ImportError::ReferenceMissing { .. } => ErrorKind::Data,
            ImportError::LockPoisoned(_)
            | ImportError::BarrierBroken { .. }
            | ImportError::Pool(_) => ErrorKind::Concurrency,
            ImportError::Persistence { .. } => ErrorKind::Persistence,
            ImportError::Database(_)
            | ImportError::Csv(_)
            | ImportError::Json(_)
            | ImportError::Io(_)
            | ImportError::Config(_) => ErrorKind::Infrastructure,
        }
    }

    /// Shorthand for a field that failed to parse
    pub fn malformed(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ImportError::Malformed {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn reference_missing(kind: &'static str, key: impl ToString) -> Self {
        ImportError::ReferenceMissing {
            kind,
            key: key.to_string(),
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Worker count must be between 1 and {max}, got {value}")]
    InvalidWorkerCount { value: usize, max: usize },

    #[error("Batch size must be between 1 and {max}, got {value}")]
    InvalidBatchSize { value: usize, max: usize },

    #[error("Call round identifier must not be empty")]
    EmptyCallRound,

    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidEnvVar { var: &'static str, value: String },
}
