// 🚀 Import Pipeline - one call round, four phases, strictly in sequence
//
//   validate period → reference data → partition → index → reconcile → persist
//
// The index phase gets its own pool. Reconcile and persist share a second
// pool. Each pool is dropped only after its last barrier has released.

use crate::entities::EntityCounts;
use crate::error::{ImportError, Result};
use crate::index::build_index;
use crate::partition::{partition, DEFAULT_BATCH_SIZE};
use crate::persist::persist_all;
use crate::reconcile::{reconcile_all, ReconcileContext};
use crate::store::{Batcher, CandidateSource, ExistingStateLookup, ReferenceLookup};
use crate::sync::WorkerPool;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub worker_threads: usize,
    pub batch_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Wall-clock time spent in each phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    pub index_build: Duration,
    pub reconcile: Duration,
    pub persist: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.index_build + self.reconcile + self.persist
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub call_round_id: String,
    pub enrollment_period_id: String,
    pub records: usize,
    pub batches: usize,
    pub created: EntityCounts,
    pub rows_persisted: usize,
    pub timings: PhaseTimings,
}

/// Orchestrates one call-round import against its collaborators
pub struct Importer {
    source: Arc<dyn CandidateSource>,
    reference: Arc<dyn ReferenceLookup>,
    existing: Arc<dyn ExistingStateLookup>,
    batcher: Arc<dyn Batcher>,
    options: PipelineOptions,
}

impl Importer {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        reference: Arc<dyn ReferenceLookup>,
        existing: Arc<dyn ExistingStateLookup>,
        batcher: Arc<dyn Batcher>,
        options: PipelineOptions,
    ) -> Self {
        Importer {
            source,
            reference,
            existing,
            batcher,
            options,
        }
    }

    /// One store playing every collaborator role
    pub fn with_store<S>(store: Arc<S>, options: PipelineOptions) -> Self
    where
        S: CandidateSource + ReferenceLookup + ExistingStateLookup + Batcher + 'static,
    {
        Importer::new(store.clone(), store.clone(), store.clone(), store, options)
    }

    pub fn run(&self, call_round_id: &str) -> Result<ImportReport> {
        // Precondition: checked once, before any work
        let call_round = self.source.fetch_call_round(call_round_id)?;
        let period = self.reference.fetch_active_enrollment_period()?;
        if call_round.enrollment_period_id != period.id {
            return Err(ImportError::PeriodNotInProgress {
                call_round: call_round.id,
                period: call_round.enrollment_period_id,
            });
        }

        let reference = self.reference.load_reference_data()?;
        let programs = self
            .reference
            .lookup_programs_by_competition(&call_round.competition_id)?;
        let queues = self.reference.lookup_all_queues()?;

        let records = self.source.fetch_call_round_records(call_round_id)?;
        let record_count = records.len();
        let batches = partition(records, self.options.batch_size);
        info!(
            call_round = call_round_id,
            records = record_count,
            batches = batches.len(),
            "Total batches: {}",
            batches.len()
        );

        let mut timings = PhaseTimings::default();

        // Phase: existing-entity index
        let start = Instant::now();
        let index = {
            let pool = WorkerPool::new("index", self.options.worker_threads)?;
            build_index(&pool, &batches, Arc::clone(&self.existing), &period)?
        };
        timings.index_build = start.elapsed();
        info!(
            elapsed_ms = timings.index_build.as_millis() as u64,
            personal_data = index.personal_data_by_national_id.len(),
            candidates = index.candidate_by_national_id.len(),
            exam_data = index.exam_data_by_exam_number.len(),
            postal = index.address_by_postal_code.len(),
            "Index build finished"
        );

        let pool = WorkerPool::new("import", self.options.worker_threads)?;
        let ctx = Arc::new(ReconcileContext {
            call_round: call_round.clone(),
            period: period.clone(),
            reference,
            programs,
            queues,
        });

        // Phase: reconcile
        let start = Instant::now();
        let accumulators = reconcile_all(&pool, &batches, ctx, Arc::new(index))?;
        timings.reconcile = start.elapsed();

        let mut created = EntityCounts::default();
        for acc in &accumulators {
            created.add(&acc.counts());
        }
        info!(
            elapsed_ms = timings.reconcile.as_millis() as u64,
            new_entities = created.total(),
            "Reconciliation finished"
        );

        // Phase: persist
        let start = Instant::now();
        let rows_persisted = persist_all(&pool, accumulators, Arc::clone(&self.batcher))?;
        timings.persist = start.elapsed();
        drop(pool);
        info!(
            elapsed_ms = timings.persist.as_millis() as u64,
            rows = rows_persisted,
            "Persistence finished"
        );

        info!(call_round = call_round_id, "Import completed");

        Ok(ImportReport {
            call_round_id: call_round.id,
            enrollment_period_id: period.id,
            records: record_count,
            batches: batches.len(),
            created,
            rows_persisted,
            timings,
        })
    }
}
