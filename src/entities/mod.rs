// Derived Entities - everything one raw candidate row turns into
//
// Each entity has:
// - Stable identity (UUID) assigned at construction
// - Foreign keys to the entities it depends on
// - A pure factory: raw record + reference data → new entity, no lookups

pub mod candidate;
pub mod course_option;
pub mod exam;
pub mod person;

pub use candidate::{build_candidate, Candidate};
pub use course_option::{
    build_course_option, build_option_history, build_socioeconomic_profile, CourseOption,
    OptionHistory, SocioeconomicProfile,
};
pub use exam::{build_exam_course_option_link, build_exam_data, ExamCourseOptionLink, ExamData};
pub use person::{build_address, build_personal_data, build_phone, AddressRecord, PersonalData, PhoneRecord};

use crate::error::{ImportError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTITY CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    PersonalData,
    Candidate,
    ExamData,
    CourseOption,
    OptionHistory,
    SocioeconomicProfile,
    Phone,
    Address,
    ExamCourseOption,
}

impl EntityCategory {
    /// Referenced rows come before the rows that point at them
    pub const INSERT_ORDER: [EntityCategory; 9] = [
        EntityCategory::PersonalData,
        EntityCategory::Candidate,
        EntityCategory::ExamData,
        EntityCategory::CourseOption,
        EntityCategory::OptionHistory,
        EntityCategory::SocioeconomicProfile,
        EntityCategory::Phone,
        EntityCategory::Address,
        EntityCategory::ExamCourseOption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::PersonalData => "personal data",
            EntityCategory::Candidate => "candidate",
            EntityCategory::ExamData => "exam data",
            EntityCategory::CourseOption => "course option",
            EntityCategory::OptionHistory => "option history",
            EntityCategory::SocioeconomicProfile => "socioeconomic profile",
            EntityCategory::Phone => "phone",
            EntityCategory::Address => "address",
            EntityCategory::ExamCourseOption => "exam course option",
        }
    }

    /// Table the category is persisted into
    pub fn table(&self) -> &'static str {
        match self {
            EntityCategory::PersonalData => "personal_data",
            EntityCategory::Candidate => "candidates",
            EntityCategory::ExamData => "exam_data",
            EntityCategory::CourseOption => "course_options",
            EntityCategory::OptionHistory => "option_history",
            EntityCategory::SocioeconomicProfile => "socioeconomic_profiles",
            EntityCategory::Phone => "phones",
            EntityCategory::Address => "addresses",
            EntityCategory::ExamCourseOption => "exam_course_options",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITY BATCH (one category, borrowed)
// ============================================================================

/// A run of new entities of one category, handed to the bulk inserter
#[derive(Debug, Clone, Copy)]
pub enum EntityBatch<'a> {
    PersonalData(&'a [PersonalData]),
    Candidates(&'a [Candidate]),
    ExamData(&'a [ExamData]),
    CourseOptions(&'a [CourseOption]),
    OptionHistory(&'a [OptionHistory]),
    SocioeconomicProfiles(&'a [SocioeconomicProfile]),
    Phones(&'a [PhoneRecord]),
    Addresses(&'a [AddressRecord]),
    ExamCourseOptions(&'a [ExamCourseOptionLink]),
}

impl EntityBatch<'_> {
    pub fn category(&self) -> EntityCategory {
        match self {
            EntityBatch::PersonalData(_) => EntityCategory::PersonalData,
            EntityBatch::Candidates(_) => EntityCategory::Candidate,
            EntityBatch::ExamData(_) => EntityCategory::ExamData,
            EntityBatch::CourseOptions(_) => EntityCategory::CourseOption,
            EntityBatch::OptionHistory(_) => EntityCategory::OptionHistory,
            EntityBatch::SocioeconomicProfiles(_) => EntityCategory::SocioeconomicProfile,
            EntityBatch::Phones(_) => EntityCategory::Phone,
            EntityBatch::Addresses(_) => EntityCategory::Address,
            EntityBatch::ExamCourseOptions(_) => EntityCategory::ExamCourseOption,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EntityBatch::PersonalData(rows) => rows.len(),
            EntityBatch::Candidates(rows) => rows.len(),
            EntityBatch::ExamData(rows) => rows.len(),
            EntityBatch::CourseOptions(rows) => rows.len(),
            EntityBatch::OptionHistory(rows) => rows.len(),
            EntityBatch::SocioeconomicProfiles(rows) => rows.len(),
            EntityBatch::Phones(rows) => rows.len(),
            EntityBatch::Addresses(rows) => rows.len(),
            EntityBatch::ExamCourseOptions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// ENTITY COUNTS
// ============================================================================

/// Number of new entities per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub personal_data: usize,
    pub candidates: usize,
    pub exam_data: usize,
    pub course_options: usize,
    pub option_history: usize,
    pub socioeconomic_profiles: usize,
    pub phones: usize,
    pub addresses: usize,
    pub exam_course_options: usize,
}

impl EntityCounts {
    pub fn add(&mut self, other: &EntityCounts) {
        self.personal_data += other.personal_data;
        self.candidates += other.candidates;
        self.exam_data += other.exam_data;
        self.course_options += other.course_options;
        self.option_history += other.option_history;
        self.socioeconomic_profiles += other.socioeconomic_profiles;
        self.phones += other.phones;
        self.addresses += other.addresses;
        self.exam_course_options += other.exam_course_options;
    }

    pub fn get(&self, category: EntityCategory) -> usize {
        match category {
            EntityCategory::PersonalData => self.personal_data,
            EntityCategory::Candidate => self.candidates,
            EntityCategory::ExamData => self.exam_data,
            EntityCategory::CourseOption => self.course_options,
            EntityCategory::OptionHistory => self.option_history,
            EntityCategory::SocioeconomicProfile => self.socioeconomic_profiles,
            EntityCategory::Phone => self.phones,
            EntityCategory::Address => self.addresses,
            EntityCategory::ExamCourseOption => self.exam_course_options,
        }
    }

    pub fn total(&self) -> usize {
        EntityCategory::INSERT_ORDER
            .iter()
            .map(|category| self.get(*category))
            .sum()
    }
}

// ============================================================================
// FIELD PARSERS (shared by the factories)
// ============================================================================

/// Decimal with either '.' or ',' as separator ("650,5" → 650.5)
pub(crate) fn parse_decimal(field: &'static str, value: &str) -> Result<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ImportError::malformed(field, value, "value is empty"));
    }

    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| ImportError::malformed(field, value, "not a decimal number"))
}

pub(crate) fn parse_code(field: &'static str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| ImportError::malformed(field, value, e.to_string()))
}

pub(crate) fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| ImportError::malformed(field, value, "expected YYYY-MM-DD or DD/MM/YYYY"))
}

/// Empty or whitespace-only strings become None
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_order_respects_foreign_keys() {
        let position = |category| {
            EntityCategory::INSERT_ORDER
                .iter()
                .position(|c| *c == category)
                .unwrap()
        };

        assert!(position(EntityCategory::PersonalData) < position(EntityCategory::Candidate));
        assert!(position(EntityCategory::Candidate) < position(EntityCategory::CourseOption));
        assert!(position(EntityCategory::CourseOption) < position(EntityCategory::OptionHistory));
        assert!(position(EntityCategory::PersonalData) < position(EntityCategory::Phone));
        assert!(position(EntityCategory::ExamData) < position(EntityCategory::ExamCourseOption));
        assert_eq!(
            EntityCategory::INSERT_ORDER.last(),
            Some(&EntityCategory::ExamCourseOption)
        );
    }

    #[test]
    fn test_parse_decimal_accepts_comma() {
        assert_eq!(parse_decimal("score", "650,5").unwrap(), 650.5);
        assert_eq!(parse_decimal("score", " 712.25 ").unwrap(), 712.25);
        assert!(parse_decimal("score", "").is_err());
        assert!(parse_decimal("score", "abc").is_err());
        assert!(parse_decimal("score", "NaN").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2005, 3, 14).unwrap();
        assert_eq!(parse_date("birth_date", "2005-03-14").unwrap(), expected);
        assert_eq!(parse_date("birth_date", "14/03/2005").unwrap(), expected);
        assert!(parse_date("birth_date", "03-14-2005").is_err());
    }

    #[test]
    fn test_entity_counts_add_and_total() {
        let mut total = EntityCounts::default();
        let batch = EntityCounts {
            personal_data: 2,
            phones: 3,
            ..EntityCounts::default()
        };

        total.add(&batch);
        total.add(&batch);

        assert_eq!(total.personal_data, 4);
        assert_eq!(total.phones, 6);
        assert_eq!(total.get(EntityCategory::Phone), 6);
        assert_eq!(total.total(), 10);
    }
}
