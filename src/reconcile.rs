// 🔁 Record Reconciler - raw row → derived entities, reusing what exists
//
// Per row, four steps in this order (later steps consume earlier results):
//   1. personal data (+ address, phones)
//   2. candidate
//   3. course option (+ option history, socioeconomic profile)
//   4. exam data (+ exam/course-option link)
//
// Deduplicated steps follow one policy: key in the frozen index → reuse the
// persisted id; key already created earlier in THIS batch → reuse that;
// otherwise build a new entity and append it to the batch accumulator.

use crate::entities::{
    build_address, build_candidate, build_course_option, build_exam_course_option_link,
    build_exam_data, build_option_history, build_personal_data, build_phone,
    build_socioeconomic_profile, AddressRecord, Candidate, CourseOption, EntityBatch, EntityCounts,
    ExamCourseOptionLink, ExamData, OptionHistory, PersonalData, PhoneRecord, SocioeconomicProfile,
};
use crate::error::Result;
use crate::index::ExistingEntityIndex;
use crate::model::{CallRound, EnrollmentPeriod, Program, Queue, RawCandidateRecord, ReferenceData};
use crate::partition::Batch;
use crate::sync::WorkerPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// CONTEXT (read-only, shared by every batch)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub call_round: CallRound,
    pub period: EnrollmentPeriod,
    pub reference: ReferenceData,
    pub programs: HashMap<i64, Program>,
    pub queues: HashMap<i64, Queue>,
}

// ============================================================================
// BATCH ACCUMULATOR
// ============================================================================

/// New entities produced by one batch, owned by the task that built it
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    pub ordinal: usize,
    pub personal_data: Vec<PersonalData>,
    pub candidates: Vec<Candidate>,
    pub exam_data: Vec<ExamData>,
    pub course_options: Vec<CourseOption>,
    pub option_history: Vec<OptionHistory>,
    pub socioeconomic_profiles: Vec<SocioeconomicProfile>,
    pub phones: Vec<PhoneRecord>,
    pub addresses: Vec<AddressRecord>,
    pub exam_course_options: Vec<ExamCourseOptionLink>,

    // Keys created earlier in this batch → new entity id
    created_personal_data: HashMap<String, String>,
    created_candidates: HashMap<String, String>,
    created_exam_data: HashMap<String, String>,
}

impl BatchAccumulator {
    pub fn new(ordinal: usize) -> Self {
        BatchAccumulator {
            ordinal,
            ..Self::default()
        }
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            personal_data: self.personal_data.len(),
            candidates: self.candidates.len(),
            exam_data: self.exam_data.len(),
            course_options: self.course_options.len(),
            option_history: self.option_history.len(),
            socioeconomic_profiles: self.socioeconomic_profiles.len(),
            phones: self.phones.len(),
            addresses: self.addresses.len(),
            exam_course_options: self.exam_course_options.len(),
        }
    }

    /// Every category, in foreign-key-safe insert order
    pub fn insert_order(&self) -> [EntityBatch<'_>; 9] {
        [
            EntityBatch::PersonalData(&self.personal_data),
            EntityBatch::Candidates(&self.candidates),
            EntityBatch::ExamData(&self.exam_data),
            EntityBatch::CourseOptions(&self.course_options),
            EntityBatch::OptionHistory(&self.option_history),
            EntityBatch::SocioeconomicProfiles(&self.socioeconomic_profiles),
            EntityBatch::Phones(&self.phones),
            EntityBatch::Addresses(&self.addresses),
            EntityBatch::ExamCourseOptions(&self.exam_course_options),
        ]
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Reconcile one batch. The first factory error aborts the whole batch.
pub fn reconcile_batch(
    batch: &Batch,
    ctx: &ReconcileContext,
    index: &ExistingEntityIndex,
) -> Result<BatchAccumulator> {
    let mut acc = BatchAccumulator::new(batch.ordinal);

    for record in &batch.records {
        let personal_data_id = reconcile_personal_data(&mut acc, record, ctx, index)?;
        let candidate_id = reconcile_candidate(&mut acc, record, ctx, index, &personal_data_id);
        let course_option_id = reconcile_course_option(&mut acc, record, ctx, &candidate_id)?;
        reconcile_exam_data(&mut acc, record, index, &course_option_id)?;
    }

    debug!(batch = batch.ordinal, records = batch.len(), "batch reconciled");
    Ok(acc)
}

/// Step 1: personal data by national ID, then the always-new side rows
fn reconcile_personal_data(
    acc: &mut BatchAccumulator,
    record: &RawCandidateRecord,
    ctx: &ReconcileContext,
    index: &ExistingEntityIndex,
) -> Result<String> {
    let national_id = record.national_id_key();

    let known = index
        .personal_data(&national_id)
        .or_else(|| acc.created_personal_data.get(&national_id).map(String::as_str))
        .map(str::to_string);

    let personal_data_id = match known {
        Some(id) => id,
        None => {
            let personal = build_personal_data(record)?;
            let id = personal.id.clone();
            acc.created_personal_data.insert(national_id, id.clone());
            acc.personal_data.push(personal);
            id
        }
    };

    if let Some(postal) = index.postal(&record.postal_code_key()) {
        acc.addresses.push(build_address(
            record,
            &ctx.reference.address_type,
            &ctx.reference.country,
            postal,
            &personal_data_id,
        ));
    }

    for number in [&record.phone_1, &record.phone_2] {
        if !number.trim().is_empty() {
            acc.phones
                .push(build_phone(number, &ctx.reference.phone_type, &personal_data_id));
        }
    }

    Ok(personal_data_id)
}

/// Step 2: candidate by national ID within the enrollment period
fn reconcile_candidate(
    acc: &mut BatchAccumulator,
    record: &RawCandidateRecord,
    ctx: &ReconcileContext,
    index: &ExistingEntityIndex,
    personal_data_id: &str,
) -> String {
    let national_id = record.national_id_key();

    let known = index
        .candidate(&national_id)
        .or_else(|| acc.created_candidates.get(&national_id).map(String::as_str))
        .map(str::to_string);
    if let Some(id) = known {
        return id;
    }

    let candidate = build_candidate(record, &ctx.period, personal_data_id);
    let id = candidate.id.clone();
    acc.created_candidates.insert(national_id, id.clone());
    acc.candidates.push(candidate);
    id
}

/// Step 3: course option, history entry and profile are always new
fn reconcile_course_option(
    acc: &mut BatchAccumulator,
    record: &RawCandidateRecord,
    ctx: &ReconcileContext,
    candidate_id: &str,
) -> Result<String> {
    let option = build_course_option(
        record,
        candidate_id,
        &ctx.call_round,
        &ctx.reference.initial_status,
        &ctx.programs,
        &ctx.queues,
    )?;
    let history = build_option_history(&ctx.reference.system_user, &option);
    let profile = build_socioeconomic_profile(record, &option)?;

    let id = option.id.clone();
    acc.course_options.push(option);
    acc.option_history.push(history);
    acc.socioeconomic_profiles.push(profile);
    Ok(id)
}

/// Step 4: exam data by exam number, then the always-new link
fn reconcile_exam_data(
    acc: &mut BatchAccumulator,
    record: &RawCandidateRecord,
    index: &ExistingEntityIndex,
    course_option_id: &str,
) -> Result<()> {
    let exam_number = record.exam_number_key();

    let known = index
        .exam_data(&exam_number)
        .or_else(|| acc.created_exam_data.get(&exam_number).map(String::as_str))
        .map(str::to_string);

    let exam_data_id = match known {
        Some(id) => id,
        None => {
            let exam = build_exam_data(record)?;
            let id = exam.id.clone();
            acc.created_exam_data.insert(exam_number, id.clone());
            acc.exam_data.push(exam);
            id
        }
    };

    acc.exam_course_options
        .push(build_exam_course_option_link(&exam_data_id, course_option_id));
    Ok(())
}

/// Reconcile every batch on `pool`, one task per batch, sorted by ordinal
pub fn reconcile_all(
    pool: &WorkerPool,
    batches: &[Arc<Batch>],
    ctx: Arc<ReconcileContext>,
    index: Arc<ExistingEntityIndex>,
) -> Result<Vec<BatchAccumulator>> {
    let mut accumulators = pool.run_all(batches.to_vec(), move |batch: Arc<Batch>| {
        reconcile_batch(&batch, &ctx, &index)
    })?;

    accumulators.sort_by_key(|acc| acc.ordinal);
    Ok(accumulators)
}
