// 💾 Batch Persister - bulk-insert every accumulator, one task per batch
//
// Within a batch the nine categories go out in EntityCategory::INSERT_ORDER.
// Across batches there is no ordering and no rollback: a failed batch aborts
// the run, and whatever other batches already committed stays committed.

use crate::error::Result;
use crate::reconcile::BatchAccumulator;
use crate::store::Batcher;
use crate::sync::WorkerPool;
use std::sync::Arc;
use tracing::debug;

/// Insert one accumulator's nine categories in order. Returns rows written.
pub fn persist_batch(acc: &BatchAccumulator, batcher: &dyn Batcher) -> Result<usize> {
    let mut written = 0;
    for batch in acc.insert_order() {
        written += batcher.bulk_insert(batch)?;
    }

    debug!(batch = acc.ordinal, rows = written, "batch persisted");
    Ok(written)
}

/// Persist every accumulator on `pool`; returns once all batches signalled
pub fn persist_all(
    pool: &WorkerPool,
    accumulators: Vec<BatchAccumulator>,
    batcher: Arc<dyn Batcher>,
) -> Result<usize> {
    let written = pool.run_all(accumulators, move |acc: BatchAccumulator| {
        persist_batch(&acc, batcher.as_ref())
    })?;

    Ok(written.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityCategory;
    use crate::error::ImportError;
    use crate::index::ExistingEntityIndex;
    use crate::partition::partition;
    use crate::reconcile::reconcile_batch;
    use crate::testing::{sample_context, sample_records, RecordingBatcher};

    fn accumulators(records: usize, batch_size: usize) -> Vec<BatchAccumulator> {
        let ctx = sample_context();
        let index = ExistingEntityIndex::default();
        partition(sample_records(records), batch_size)
            .iter()
            .map(|batch| reconcile_batch(batch, &ctx, &index).unwrap())
            .collect()
    }

    #[test]
    fn test_persist_batch_uses_fixed_order() {
        let batcher = RecordingBatcher::default();
        let acc = accumulators(5, 5).remove(0);

        let written = persist_batch(&acc, &batcher).unwrap();

        assert_eq!(batcher.categories(), EntityCategory::INSERT_ORDER.to_vec());
        assert_eq!(written, acc.counts().total());
    }

    #[test]
    fn test_persist_all_runs_every_batch() {
        let pool = WorkerPool::new("test-persist", 3).unwrap();
        let batcher = Arc::new(RecordingBatcher::default());
        let accs = accumulators(250, 100);
        let expected: usize = accs.iter().map(|a| a.counts().total()).sum();

        let written = persist_all(&pool, accs, batcher.clone()).unwrap();

        assert_eq!(written, expected);
        assert_eq!(batcher.calls(), 3 * 9);
        assert_eq!(batcher.rows(EntityCategory::PersonalData), 250);
        assert_eq!(batcher.rows(EntityCategory::ExamCourseOption), 250);
    }

    #[test]
    fn test_persist_failure_is_fatal() {
        let pool = WorkerPool::new("test-persist", 2).unwrap();
        let batcher = Arc::new(RecordingBatcher::failing_on(EntityCategory::OptionHistory));

        let err = persist_all(&pool, accumulators(30, 10), batcher.clone()).unwrap_err();

        assert!(matches!(
            err,
            ImportError::Persistence {
                category: EntityCategory::OptionHistory,
                ..
            }
        ));
        // Each batch stopped at the failing category; nothing after it was attempted
        assert_eq!(batcher.rows(EntityCategory::SocioeconomicProfile), 0);
        assert_eq!(batcher.rows(EntityCategory::CourseOption), 30);
    }
}
