// Admission Import - Core Library
// Two-phase concurrent import of admission candidates for one call round

pub mod config;
pub mod db;
pub mod entities;   // Derived entities + pure factories
pub mod error;
pub mod index;      // Existing-entity index (phase 1)
pub mod model;
pub mod partition;
pub mod persist;    // Batch persister (phase 2b)
pub mod pipeline;
pub mod reconcile;  // Record reconciler (phase 2a)
pub mod store;      // Collaborator traits
pub mod sync;       // Worker pool + completion barrier

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{CliArgs, Command, ImportConfig, RunArgs};
pub use db::{
    apply_reference_seed, load_csv, seed_defaults, setup_database, stage_records, table_counts,
    ReferenceSeed, SqliteStore, StageSummary, TableCount,
};
pub use entities::{EntityBatch, EntityCategory, EntityCounts};
pub use error::{ConfigError, ErrorKind, ImportError, Result};
pub use index::ExistingEntityIndex;
pub use model::{CallRound, EnrollmentPeriod, PeriodStatus, RawCandidateRecord, ReferenceData};
pub use partition::{partition, Batch, DEFAULT_BATCH_SIZE};
pub use pipeline::{ImportReport, Importer, PhaseTimings, PipelineOptions};
pub use reconcile::BatchAccumulator;
pub use store::{Batcher, CandidateSource, ExistingStateLookup, ReferenceLookup};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
