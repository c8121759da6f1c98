// 🎓 Candidate - one person applying within one enrollment period

use crate::model::{EnrollmentPeriod, RawCandidateRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub personal_data_id: String,
    pub enrollment_period_id: String,

    /// Copied from the person so the candidate can be looked up by natural key
    pub national_id: String,

    pub created_at: DateTime<Utc>,
}

pub fn build_candidate(
    record: &RawCandidateRecord,
    period: &EnrollmentPeriod,
    personal_data_id: &str,
) -> Candidate {
    Candidate {
        id: uuid::Uuid::new_v4().to_string(),
        personal_data_id: personal_data_id.to_string(),
        enrollment_period_id: period.id.clone(),
        national_id: record.national_id_key(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_period, sample_record};

    #[test]
    fn test_build_candidate() {
        let period = sample_period();
        let candidate = build_candidate(&sample_record(3), &period, "pd-3");

        assert!(!candidate.id.is_empty());
        assert_eq!(candidate.personal_data_id, "pd-3");
        assert_eq!(candidate.enrollment_period_id, period.id);
        assert_eq!(candidate.national_id, "00000000003");
    }
}
