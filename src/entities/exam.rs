// 📝 Exam Data - national exam results, deduplicated by exam number
//
// The link row is always new: it ties the (possibly reused) exam data to
// the course option created for this import.

use super::{non_blank, parse_decimal};
use crate::error::{ImportError, Result};
use crate::model::RawCandidateRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamData {
    pub id: String,

    /// Natural key
    pub exam_number: String,

    pub score_languages: f64,
    pub score_humanities: f64,
    pub score_natural_sciences: f64,
    pub score_mathematics: f64,
    pub score_essay: f64,
    pub created_at: DateTime<Utc>,
}

impl ExamData {
    /// Plain mean of the five areas
    pub fn average(&self) -> f64 {
        (self.score_languages
            + self.score_humanities
            + self.score_natural_sciences
            + self.score_mathematics
            + self.score_essay)
            / 5.0
    }
}

pub fn build_exam_data(record: &RawCandidateRecord) -> Result<ExamData> {
    let exam_number = non_blank(&record.exam_number)
        .ok_or_else(|| ImportError::malformed("exam_number", &record.exam_number, "value is empty"))?;

    Ok(ExamData {
        id: uuid::Uuid::new_v4().to_string(),
        exam_number,
        score_languages: parse_decimal("score_languages", &record.score_languages)?,
        score_humanities: parse_decimal("score_humanities", &record.score_humanities)?,
        score_natural_sciences: parse_decimal("score_natural_sciences", &record.score_natural_sciences)?,
        score_mathematics: parse_decimal("score_mathematics", &record.score_mathematics)?,
        score_essay: parse_decimal("score_essay", &record.score_essay)?,
        created_at: Utc::now(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamCourseOptionLink {
    pub id: String,
    pub exam_data_id: String,
    pub course_option_id: String,
}

pub fn build_exam_course_option_link(exam_data_id: &str, course_option_id: &str) -> ExamCourseOptionLink {
    ExamCourseOptionLink {
        id: uuid::Uuid::new_v4().to_string(),
        exam_data_id: exam_data_id.to_string(),
        course_option_id: course_option_id.to_string(),
    }
}
