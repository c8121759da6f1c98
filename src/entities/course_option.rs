// 📋 Course Option - a candidate's place in one program queue for one call round
//
// Never deduplicated. Every imported row produces exactly one course option,
// one option-history entry and one socioeconomic profile.

use super::{non_blank, parse_code, parse_decimal};
use crate::error::{ImportError, Result};
use crate::model::{CallRound, Program, Queue, RawCandidateRecord, Status, SystemUser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// COURSE OPTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOption {
    pub id: String,
    pub candidate_id: String,
    pub call_round_id: String,
    pub program_id: String,
    pub queue_id: String,
    pub status_id: String,
    pub ranking: i64,
    pub final_score: f64,
    pub created_at: DateTime<Utc>,
}

pub fn build_course_option(
    record: &RawCandidateRecord,
    candidate_id: &str,
    call_round: &CallRound,
    initial_status: &Status,
    programs: &HashMap<i64, Program>,
    queues: &HashMap<i64, Queue>,
) -> Result<CourseOption> {
    let program_code = parse_code("program_code", &record.program_code)?;
    let program = programs
        .get(&program_code)
        .ok_or_else(|| ImportError::reference_missing("program", program_code))?;

    let queue_code = parse_code("queue_code", &record.queue_code)?;
    let queue = queues
        .get(&queue_code)
        .ok_or_else(|| ImportError::reference_missing("queue", queue_code))?;

    let ranking = parse_code("ranking", &record.ranking)?;
    if ranking < 0 {
        return Err(ImportError::malformed("ranking", &record.ranking, "must not be negative"));
    }

    Ok(CourseOption {
        id: uuid::Uuid::new_v4().to_string(),
        candidate_id: candidate_id.to_string(),
        call_round_id: call_round.id.clone(),
        program_id: program.id.clone(),
        queue_id: queue.id.clone(),
        status_id: initial_status.id.clone(),
        ranking,
        final_score: parse_decimal("final_score", &record.final_score)?,
        created_at: Utc::now(),
    })
}

// ============================================================================
// OPTION HISTORY
// ============================================================================

/// Audit entry: which status the option entered, who set it, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionHistory {
    pub id: String,
    pub course_option_id: String,
    pub status_id: String,
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
}

pub fn build_option_history(system_user: &SystemUser, course_option: &CourseOption) -> OptionHistory {
    OptionHistory {
        id: uuid::Uuid::new_v4().to_string(),
        course_option_id: course_option.id.clone(),
        status_id: course_option.status_id.clone(),
        user_id: system_user.id.clone(),
        recorded_at: course_option.created_at,
    }
}

// ============================================================================
// SOCIOECONOMIC PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocioeconomicProfile {
    pub id: String,
    pub course_option_id: String,
    pub family_income: Option<String>,
    pub school_type: Option<String>,
    pub household_size: Option<i64>,
}

pub fn build_socioeconomic_profile(
    record: &RawCandidateRecord,
    course_option: &CourseOption,
) -> Result<SocioeconomicProfile> {
    let household_size = match non_blank(&record.household_size) {
        Some(size) => Some(parse_code("household_size", &size)?),
        None => None,
    };

    Ok(SocioeconomicProfile {
        id: uuid::Uuid::new_v4().to_string(),
        course_option_id: course_option.id.clone(),
        family_income: non_blank(&record.family_income),
        school_type: non_blank(&record.school_type),
        household_size,
    })
}
