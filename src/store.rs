// 🔌 Collaborators - what the pipeline needs from the outside world
//
// The pipeline only talks to these traits. `db::SqliteStore` implements all of
// them; tests swap in in-memory fakes per phase.
//
// Every map returned by a lookup contains ONLY keys that already exist.

use crate::entities::EntityBatch;
use crate::error::{ImportError, Result};
use crate::model::{
    AddressType, CallRound, Country, EnrollmentPeriod, PhoneType, PostalRecord, Program, Queue,
    RawCandidateRecord, ReferenceData, Status, SystemUser, HOME_COUNTRY, INITIAL_STATUS_CODE,
    RESIDENTIAL_DESCRIPTION,
};
use std::collections::{HashMap, HashSet};

/// Source of the staged raw rows for a call round
pub trait CandidateSource: Send + Sync {
    fn fetch_call_round(&self, call_round_id: &str) -> Result<CallRound>;

    fn fetch_call_round_records(&self, call_round_id: &str) -> Result<Vec<RawCandidateRecord>>;
}

/// Master data resolved once per run
pub trait ReferenceLookup: Send + Sync {
    /// Fails with `NoPeriodInProgress` when nothing is in progress
    fn fetch_active_enrollment_period(&self) -> Result<EnrollmentPeriod>;

    fn find_address_type(&self, description: &str) -> Result<Option<AddressType>>;

    fn find_phone_type(&self, description: &str) -> Result<Option<PhoneType>>;

    fn find_country(&self, name: &str) -> Result<Option<Country>>;

    fn find_status(&self, code: &str) -> Result<Option<Status>>;

    fn find_system_user(&self) -> Result<Option<SystemUser>>;

    fn lookup_programs_by_competition(&self, competition_id: &str) -> Result<HashMap<i64, Program>>;

    fn lookup_all_queues(&self) -> Result<HashMap<i64, Queue>>;

    /// Resolve the fixed taxonomies every batch shares
    fn load_reference_data(&self) -> Result<ReferenceData> {
        Ok(ReferenceData {
            address_type: self
                .find_address_type(RESIDENTIAL_DESCRIPTION)?
                .ok_or_else(|| ImportError::reference_missing("address type", RESIDENTIAL_DESCRIPTION))?,
            phone_type: self
                .find_phone_type(RESIDENTIAL_DESCRIPTION)?
                .ok_or_else(|| ImportError::reference_missing("phone type", RESIDENTIAL_DESCRIPTION))?,
            country: self
                .find_country(HOME_COUNTRY)?
                .ok_or_else(|| ImportError::reference_missing("country", HOME_COUNTRY))?,
            initial_status: self
                .find_status(INITIAL_STATUS_CODE)?
                .ok_or_else(|| ImportError::reference_missing("status", INITIAL_STATUS_CODE))?,
            system_user: self
                .find_system_user()?
                .ok_or_else(|| ImportError::reference_missing("user", "system"))?,
        })
    }
}

/// Probes for entities that were persisted before this run
pub trait ExistingStateLookup: Send + Sync {
    /// national ID → personal data id
    fn lookup_existing_personal_data(&self, national_ids: &HashSet<String>) -> Result<HashMap<String, String>>;

    /// exam number → exam data id
    fn lookup_existing_exam_data(&self, exam_numbers: &HashSet<String>) -> Result<HashMap<String, String>>;

    /// national ID → candidate id, for candidates of `period` owned by the given people
    fn lookup_existing_candidates(
        &self,
        personal_data_ids: &[String],
        period: &EnrollmentPeriod,
    ) -> Result<HashMap<String, String>>;

    /// postal code → postal record
    fn lookup_postal_records(&self, postal_codes: &[String]) -> Result<HashMap<String, PostalRecord>>;
}

/// Bulk persistence sink. One call is all-or-nothing.
pub trait Batcher: Send + Sync {
    /// Returns the number of rows written
    fn bulk_insert(&self, batch: EntityBatch<'_>) -> Result<usize>;
}
