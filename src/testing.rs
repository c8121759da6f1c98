// Test fixtures: sample rows, reference data and in-memory collaborators

use crate::entities::{EntityBatch, EntityCategory};
use crate::error::{ImportError, Result};
use crate::model::*;
use crate::reconcile::ReconcileContext;
use crate::store::{Batcher, CandidateSource, ExistingStateLookup, ReferenceLookup};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const PERIOD_ID: &str = "period-2024";
pub const CALL_ROUND_ID: &str = "round-1";

// ============================================================================
// SAMPLE DATA
// ============================================================================

/// Row `n` has unique natural keys derived from `n`
pub fn sample_record(n: usize) -> RawCandidateRecord {
    RawCandidateRecord {
        national_id: format!("{:011}", n),
        full_name: format!("Candidate {n}"),
        birth_date: "2005-03-14".to_string(),
        email: format!("candidate{n}@example.com"),
        exam_number: format!("23{:010}", n),
        score_languages: "600".to_string(),
        score_humanities: "620".to_string(),
        score_natural_sciences: "580".to_string(),
        score_mathematics: "720".to_string(),
        score_essay: "880".to_string(),
        postal_code: format!("{:08}", 21_940_000 + n),
        street: "Rua Alfa".to_string(),
        street_number: n.to_string(),
        complement: String::new(),
        district: "Centro".to_string(),
        city: "Rio de Janeiro".to_string(),
        state: "RJ".to_string(),
        phone_1: format!("(21) 9{:08}", n),
        phone_2: format!("(21) 3{:07}", n),
        program_code: if n % 2 == 0 { "102" } else { "101" }.to_string(),
        queue_code: "1".to_string(),
        ranking: n.to_string(),
        final_score: "700,5".to_string(),
        family_income: "1-3".to_string(),
        school_type: "public".to_string(),
        household_size: "4".to_string(),
    }
}

pub fn sample_records(count: usize) -> Vec<RawCandidateRecord> {
    (1..=count).map(sample_record).collect()
}

pub fn sample_period() -> EnrollmentPeriod {
    EnrollmentPeriod {
        id: PERIOD_ID.to_string(),
        competition_id: "comp-1".to_string(),
        description: "2024 admissions".to_string(),
        status: PeriodStatus::InProgress,
    }
}

pub fn sample_call_round() -> CallRound {
    CallRound {
        id: CALL_ROUND_ID.to_string(),
        competition_id: "comp-1".to_string(),
        enrollment_period_id: PERIOD_ID.to_string(),
        number: 1,
        description: "First call".to_string(),
    }
}

pub fn sample_reference() -> ReferenceData {
    ReferenceData {
        address_type: AddressType {
            id: "addr-type-1".to_string(),
            description: RESIDENTIAL_DESCRIPTION.to_string(),
        },
        phone_type: PhoneType {
            id: "phone-type-1".to_string(),
            description: RESIDENTIAL_DESCRIPTION.to_string(),
        },
        country: Country {
            id: "country-br".to_string(),
            name: HOME_COUNTRY.to_string(),
        },
        initial_status: Status {
            id: "status-b01".to_string(),
            code: INITIAL_STATUS_CODE.to_string(),
            description: "Convocado".to_string(),
        },
        system_user: SystemUser {
            id: "user-system".to_string(),
            login: SYSTEM_USER_LOGIN.to_string(),
        },
    }
}

pub fn sample_programs() -> HashMap<i64, Program> {
    [(101, "Medicina"), (102, "Engenharia Civil")]
        .into_iter()
        .map(|(code, name)| {
            let program = Program {
                id: format!("program-{code}"),
                competition_id: "comp-1".to_string(),
                code,
                name: name.to_string(),
            };
            (code, program)
        })
        .collect()
}

pub fn sample_queues() -> HashMap<i64, Queue> {
    [(1, "Ampla concorrência"), (2, "Escola pública")]
        .into_iter()
        .map(|(code, description)| {
            let queue = Queue {
                id: format!("queue-{code}"),
                code,
                description: description.to_string(),
            };
            (code, queue)
        })
        .collect()
}

pub fn sample_postal(postal_code: &str) -> PostalRecord {
    PostalRecord {
        id: format!("postal-{postal_code}"),
        postal_code: postal_code.to_string(),
        street: "Av. Pedro Calmon".to_string(),
        district: "Cidade Universitária".to_string(),
        city: "Rio de Janeiro".to_string(),
        state: "RJ".to_string(),
    }
}

pub fn sample_context() -> ReconcileContext {
    ReconcileContext {
        call_round: sample_call_round(),
        period: sample_period(),
        reference: sample_reference(),
        programs: sample_programs(),
        queues: sample_queues(),
    }
}

// ============================================================================
// RECORDING BATCHER
// ============================================================================

/// Records every bulk insert; optionally fails one category
#[derive(Default)]
pub struct RecordingBatcher {
    log: Mutex<Vec<(EntityCategory, usize)>>,
    fail_on: Option<EntityCategory>,
}

impl RecordingBatcher {
    pub fn failing_on(category: EntityCategory) -> Self {
        RecordingBatcher {
            log: Mutex::new(Vec::new()),
            fail_on: Some(category),
        }
    }

    pub fn categories(&self) -> Vec<EntityCategory> {
        self.log.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn rows(&self, category: EntityCategory) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, rows)| rows)
            .sum()
    }
}

impl Batcher for RecordingBatcher {
    fn bulk_insert(&self, batch: EntityBatch<'_>) -> Result<usize> {
        let category = batch.category();
        if self.fail_on == Some(category) {
            self.log.lock().unwrap().push((category, 0));
            return Err(ImportError::Persistence {
                category,
                source: rusqlite::Error::InvalidQuery,
            });
        }

        self.log.lock().unwrap().push((category, batch.len()));
        Ok(batch.len())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

struct StoredCandidate {
    personal_data_id: String,
    national_id: String,
    candidate_id: String,
    period_id: String,
}

/// Every collaborator backed by in-memory maps
pub struct MemoryStore {
    records: Vec<RawCandidateRecord>,
    period: Mutex<EnrollmentPeriod>,
    people: Mutex<HashMap<String, String>>,
    candidates: Mutex<Vec<StoredCandidate>>,
    exams: Mutex<HashMap<String, String>>,
    postal: Mutex<HashMap<String, PostalRecord>>,
    pub batcher: RecordingBatcher,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::with_records(Vec::new())
    }
}

impl MemoryStore {
    pub fn with_records(records: Vec<RawCandidateRecord>) -> Self {
        MemoryStore {
            records,
            period: Mutex::new(sample_period()),
            people: Mutex::new(HashMap::new()),
            candidates: Mutex::new(Vec::new()),
            exams: Mutex::new(HashMap::new()),
            postal: Mutex::new(HashMap::new()),
            batcher: RecordingBatcher::default(),
        }
    }

    pub fn set_period_status(&self, status: PeriodStatus) {
        self.period.lock().unwrap().status = status;
    }

    pub fn add_person(&self, record: &RawCandidateRecord, personal_data_id: &str) {
        self.people
            .lock()
            .unwrap()
            .insert(record.national_id_key(), personal_data_id.to_string());
    }

    pub fn add_candidate(&self, personal_data_id: &str, record: &RawCandidateRecord, candidate_id: &str) {
        self.add_candidate_in_period(personal_data_id, record, candidate_id, PERIOD_ID);
    }

    pub fn add_candidate_in_period(
        &self,
        personal_data_id: &str,
        record: &RawCandidateRecord,
        candidate_id: &str,
        period_id: &str,
    ) {
        self.candidates.lock().unwrap().push(StoredCandidate {
            personal_data_id: personal_data_id.to_string(),
            national_id: record.national_id_key(),
            candidate_id: candidate_id.to_string(),
            period_id: period_id.to_string(),
        });
    }

    pub fn add_exam(&self, record: &RawCandidateRecord, exam_data_id: &str) {
        self.exams
            .lock()
            .unwrap()
            .insert(record.exam_number_key(), exam_data_id.to_string());
    }

    pub fn add_postal(&self, postal: PostalRecord) {
        self.postal
            .lock()
            .unwrap()
            .insert(postal.postal_code.clone(), postal);
    }
}

impl CandidateSource for MemoryStore {
    fn fetch_call_round(&self, call_round_id: &str) -> Result<CallRound> {
        if call_round_id == CALL_ROUND_ID {
            Ok(sample_call_round())
        } else {
            Err(ImportError::CallRoundNotFound(call_round_id.to_string()))
        }
    }

    fn fetch_call_round_records(&self, call_round_id: &str) -> Result<Vec<RawCandidateRecord>> {
        if call_round_id == CALL_ROUND_ID {
            Ok(self.records.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

impl ReferenceLookup for MemoryStore {
    fn fetch_active_enrollment_period(&self) -> Result<EnrollmentPeriod> {
        let period = self.period.lock().unwrap().clone();
        if period.is_in_progress() {
            Ok(period)
        } else {
            Err(ImportError::NoPeriodInProgress)
        }
    }

    fn find_address_type(&self, _description: &str) -> Result<Option<AddressType>> {
        Ok(Some(sample_reference().address_type))
    }

    fn find_phone_type(&self, _description: &str) -> Result<Option<PhoneType>> {
        Ok(Some(sample_reference().phone_type))
    }

    fn find_country(&self, _name: &str) -> Result<Option<Country>> {
        Ok(Some(sample_reference().country))
    }

    fn find_status(&self, _code: &str) -> Result<Option<Status>> {
        Ok(Some(sample_reference().initial_status))
    }

    fn find_system_user(&self) -> Result<Option<SystemUser>> {
        Ok(Some(sample_reference().system_user))
    }

    fn lookup_programs_by_competition(&self, _competition_id: &str) -> Result<HashMap<i64, Program>> {
        Ok(sample_programs())
    }

    fn lookup_all_queues(&self) -> Result<HashMap<i64, Queue>> {
        Ok(sample_queues())
    }
}

impl ExistingStateLookup for MemoryStore {
    fn lookup_existing_personal_data(&self, national_ids: &HashSet<String>) -> Result<HashMap<String, String>> {
        let people = self.people.lock().unwrap();
        Ok(national_ids
            .iter()
            .filter_map(|id| people.get(id).map(|pd| (id.clone(), pd.clone())))
            .collect())
    }

    fn lookup_existing_exam_data(&self, exam_numbers: &HashSet<String>) -> Result<HashMap<String, String>> {
        let exams = self.exams.lock().unwrap();
        Ok(exam_numbers
            .iter()
            .filter_map(|n| exams.get(n).map(|id| (n.clone(), id.clone())))
            .collect())
    }

    fn lookup_existing_candidates(
        &self,
        personal_data_ids: &[String],
        period: &EnrollmentPeriod,
    ) -> Result<HashMap<String, String>> {
        let candidates = self.candidates.lock().unwrap();
        Ok(candidates
            .iter()
            .filter(|c| c.period_id == period.id && personal_data_ids.contains(&c.personal_data_id))
            .map(|c| (c.national_id.clone(), c.candidate_id.clone()))
            .collect())
    }

    fn lookup_postal_records(&self, postal_codes: &[String]) -> Result<HashMap<String, PostalRecord>> {
        let postal = self.postal.lock().unwrap();
        Ok(postal_codes
            .iter()
            .filter_map(|code| postal.get(code).map(|p| (code.clone(), p.clone())))
            .collect())
    }
}

impl Batcher for MemoryStore {
    fn bulk_insert(&self, batch: EntityBatch<'_>) -> Result<usize> {
        self.batcher.bulk_insert(batch)
    }
}
