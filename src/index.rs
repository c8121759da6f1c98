// 🗂️ Existing-Entity Index - what was already persisted before this run
//
// Built once, concurrently: each batch probes the store for its own keys,
// then unions its partial maps into the shared index inside one short
// critical section. After the phase the index is frozen and read without
// locking.
//
// Entities created by THIS run are never added here, so two batches that
// both see an unknown key will each create their own entity for it.

use crate::error::{ImportError, Result};
use crate::model::{EnrollmentPeriod, PostalRecord};
use crate::partition::Batch;
use crate::store::ExistingStateLookup;
use crate::sync::WorkerPool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

// ============================================================================
// INDEX
// ============================================================================

/// Natural key → persisted entity, for entities that predate the run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingEntityIndex {
    /// national ID → personal data id
    pub personal_data_by_national_id: HashMap<String, String>,

    /// exam number → exam data id
    pub exam_data_by_exam_number: HashMap<String, String>,

    /// national ID → candidate id (current enrollment period only)
    pub candidate_by_national_id: HashMap<String, String>,

    /// postal code → postal record
    pub address_by_postal_code: HashMap<String, PostalRecord>,
}

impl ExistingEntityIndex {
    pub fn personal_data(&self, national_id: &str) -> Option<&str> {
        self.personal_data_by_national_id.get(national_id).map(String::as_str)
    }

    pub fn exam_data(&self, exam_number: &str) -> Option<&str> {
        self.exam_data_by_exam_number.get(exam_number).map(String::as_str)
    }

    pub fn candidate(&self, national_id: &str) -> Option<&str> {
        self.candidate_by_national_id.get(national_id).map(String::as_str)
    }

    pub fn postal(&self, postal_code: &str) -> Option<&PostalRecord> {
        self.address_by_postal_code.get(postal_code)
    }

    /// Union a batch's findings. A key seen twice maps to the same persisted id.
    fn absorb(&mut self, partial: PartialIndex) {
        self.personal_data_by_national_id.extend(partial.personal_data);
        self.exam_data_by_exam_number.extend(partial.exam_data);
        self.candidate_by_national_id.extend(partial.candidates);
        self.address_by_postal_code.extend(partial.postal);
    }
}

/// One batch's lookup results, before merging
#[derive(Debug, Default)]
pub struct PartialIndex {
    pub personal_data: HashMap<String, String>,
    pub exam_data: HashMap<String, String>,
    pub candidates: HashMap<String, String>,
    pub postal: HashMap<String, PostalRecord>,
}

// ============================================================================
// MERGER (the only shared mutable state in the run)
// ============================================================================

#[derive(Debug, Default)]
pub struct IndexMerger {
    shared: Mutex<ExistingEntityIndex>,
}

impl IndexMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Critical section: the lock guard releases only what it acquired
    pub fn merge(&self, partial: PartialIndex) -> Result<()> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|e| ImportError::LockPoisoned(e.to_string()))?;
        shared.absorb(partial);
        Ok(())
    }

    /// Take the finished index out, leaving an empty one behind
    pub fn finish(&self) -> Result<ExistingEntityIndex> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|e| ImportError::LockPoisoned(e.to_string()))?;
        Ok(std::mem::take(&mut *shared))
    }
}

// ============================================================================
// BUILD
// ============================================================================

/// Probe the store for the keys one batch carries
pub fn probe_batch(
    batch: &Batch,
    lookup: &dyn ExistingStateLookup,
    period: &EnrollmentPeriod,
) -> Result<PartialIndex> {
    let national_ids: HashSet<String> = batch.records.iter().map(|r| r.national_id_key()).collect();
    let exam_numbers: HashSet<String> = batch.records.iter().map(|r| r.exam_number_key()).collect();
    let postal_codes: Vec<String> = batch
        .records
        .iter()
        .map(|r| r.postal_code_key())
        .filter(|code| !code.is_empty())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let personal_data = lookup.lookup_existing_personal_data(&national_ids)?;
    let exam_data = lookup.lookup_existing_exam_data(&exam_numbers)?;

    // Candidates are only looked up for people that already exist
    let known_people: Vec<String> = personal_data.values().cloned().collect();
    let candidates = if known_people.is_empty() {
        HashMap::new()
    } else {
        lookup.lookup_existing_candidates(&known_people, period)?
    };

    let postal = lookup.lookup_postal_records(&postal_codes)?;

    debug!(
        batch = batch.ordinal,
        personal_data = personal_data.len(),
        exam_data = exam_data.len(),
        candidates = candidates.len(),
        postal = postal.len(),
        "batch probed"
    );

    Ok(PartialIndex {
        personal_data,
        exam_data,
        candidates,
        postal,
    })
}

/// Build the frozen index across every batch on `pool`
pub fn build_index(
    pool: &WorkerPool,
    batches: &[Arc<Batch>],
    lookup: Arc<dyn ExistingStateLookup>,
    period: &EnrollmentPeriod,
) -> Result<ExistingEntityIndex> {
    let merger = Arc::new(IndexMerger::new());
    let task_merger = Arc::clone(&merger);
    let period = period.clone();

    pool.run_all(batches.to_vec(), move |batch: Arc<Batch>| {
        let partial = probe_batch(&batch, lookup.as_ref(), &period)?;
        task_merger.merge(partial)
    })?;

    merger.finish()
}
