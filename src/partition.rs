// ✂️ Batch Partitioner - fixed-size chunks of raw rows

use crate::model::RawCandidateRecord;
use std::sync::Arc;

/// Rows per batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A chunk of raw rows. `ordinal` is 1-based and only used in logs.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub ordinal: usize,
    pub records: Vec<RawCandidateRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split rows into batches of `batch_size`, preserving order.
/// The last batch may be smaller; no rows → no batches.
pub fn partition(records: Vec<RawCandidateRecord>, batch_size: usize) -> Vec<Arc<Batch>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut records = records.into_iter().peekable();

    while records.peek().is_some() {
        let chunk: Vec<RawCandidateRecord> = records.by_ref().take(batch_size).collect();
        batches.push(Arc::new(Batch {
            ordinal: batches.len() + 1,
            records: chunk,
        }));
    }

    batches
}
