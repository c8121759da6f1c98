// 📥 Input Model - raw candidate rows + the reference data they resolve against
//
// Raw rows are kept as strings exactly as staged; factories parse them.
// Natural keys are normalized here so lookups and factories agree.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Description shared by the residential address type and phone type
pub const RESIDENTIAL_DESCRIPTION: &str = "Residencial";

/// Country every imported address is registered under
pub const HOME_COUNTRY: &str = "Brasil";

/// Status every new course option starts in
pub const INITIAL_STATUS_CODE: &str = "B01";

/// Login of the actor recorded on automatic status changes
pub const SYSTEM_USER_LOGIN: &str = "sistema";

// ============================================================================
// RAW CANDIDATE RECORD
// ============================================================================

/// One staged row for a call round. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidateRecord {
    // Person
    pub national_id: String,
    pub full_name: String,
    pub birth_date: String,
    #[serde(default)]
    pub email: String,

    // Exam
    pub exam_number: String,
    pub score_languages: String,
    pub score_humanities: String,
    pub score_natural_sciences: String,
    pub score_mathematics: String,
    pub score_essay: String,

    // Address
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub street_number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,

    // Phones
    #[serde(default)]
    pub phone_1: String,
    #[serde(default)]
    pub phone_2: String,

    // Course choice
    pub program_code: String,
    pub queue_code: String,
    pub ranking: String,
    pub final_score: String,

    // Socioeconomic answers
    #[serde(default)]
    pub family_income: String,
    #[serde(default)]
    pub school_type: String,
    #[serde(default)]
    pub household_size: String,
}

impl RawCandidateRecord {
    /// National ID with punctuation stripped ("123.456.789-09" → "12345678909")
    pub fn national_id_key(&self) -> String {
        digits_only(&self.national_id)
    }

    pub fn exam_number_key(&self) -> String {
        self.exam_number.trim().to_string()
    }

    /// Postal code with punctuation stripped ("21941-901" → "21941901")
    pub fn postal_code_key(&self) -> String {
        digits_only(&self.postal_code)
    }

    /// Hash used to skip rows already staged for the same call round
    /// NOTE: deduplicates STAGING only, never derived entities
    pub fn compute_idempotency_hash(&self, call_round_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            call_round_id,
            self.national_id_key(),
            self.exam_number_key(),
            self.program_code.trim(),
            self.queue_code.trim()
        ));
        format!("{:x}", hasher.finalize())
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// ENROLLMENT PERIOD + CALL ROUND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Planned,
    InProgress,
    Closed,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Planned => "planned",
            PeriodStatus::InProgress => "in_progress",
            PeriodStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(PeriodStatus::Planned),
            "in_progress" => Some(PeriodStatus::InProgress),
            "closed" => Some(PeriodStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentPeriod {
    pub id: String,
    pub competition_id: String,
    pub description: String,
    pub status: PeriodStatus,
}

impl EnrollmentPeriod {
    pub fn is_in_progress(&self) -> bool {
        self.status == PeriodStatus::InProgress
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRound {
    pub id: String,
    pub competition_id: String,
    pub enrollment_period_id: String,
    pub number: i64,
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressType {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneType {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemUser {
    pub id: String,
    pub login: String,
}

/// Degree program offered in a competition, keyed by its integer code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub competition_id: String,
    pub code: i64,
    pub name: String,
}

/// Admission queue (quota/affirmative-action track), keyed by its integer code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub id: String,
    pub code: i64,
    pub description: String,
}

/// Known postal code with its canonical location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalRecord {
    pub id: String,
    pub postal_code: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

/// Reference data loaded once per run and shared read-only by every batch
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub address_type: AddressType,
    pub phone_type: PhoneType,
    pub country: Country,
    pub initial_status: Status,
    pub system_user: SystemUser,
}
