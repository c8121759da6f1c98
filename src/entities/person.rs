// 👤 Person Entities - PersonalData + the phone/address rows hanging off it
//
// PersonalData is deduplicated by national ID.
// Phones and addresses are NOT: every imported row creates fresh ones.

use super::{non_blank, parse_date};
use crate::error::{ImportError, Result};
use crate::model::{digits_only, AddressType, Country, PhoneType, PostalRecord, RawCandidateRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Length of a normalized national ID
pub const NATIONAL_ID_DIGITS: usize = 11;

// ============================================================================
// PERSONAL DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalData {
    pub id: String,

    /// Natural key (digits only)
    pub national_id: String,

    pub full_name: String,
    pub birth_date: NaiveDate,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn build_personal_data(record: &RawCandidateRecord) -> Result<PersonalData> {
    let national_id = record.national_id_key();
    if national_id.len() != NATIONAL_ID_DIGITS {
        return Err(ImportError::malformed(
            "national_id",
            &record.national_id,
            format!("expected {} digits, found {}", NATIONAL_ID_DIGITS, national_id.len()),
        ));
    }

    let full_name = non_blank(&record.full_name)
        .ok_or_else(|| ImportError::malformed("full_name", &record.full_name, "value is empty"))?;

    Ok(PersonalData {
        id: uuid::Uuid::new_v4().to_string(),
        national_id,
        full_name,
        birth_date: parse_date("birth_date", &record.birth_date)?,
        email: non_blank(&record.email),
        created_at: Utc::now(),
    })
}

// ============================================================================
// PHONE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneRecord {
    pub id: String,
    pub personal_data_id: String,
    pub phone_type_id: String,

    /// Digits only ("(21) 99876-5432" → "21998765432")
    pub number: String,
}

/// Callers only pass non-blank numbers
pub fn build_phone(number: &str, phone_type: &PhoneType, personal_data_id: &str) -> PhoneRecord {
    PhoneRecord {
        id: uuid::Uuid::new_v4().to_string(),
        personal_data_id: personal_data_id.to_string(),
        phone_type_id: phone_type.id.clone(),
        number: digits_only(number),
    }
}

// ============================================================================
// ADDRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: String,
    pub personal_data_id: String,
    pub address_type_id: String,
    pub country_id: String,
    pub postal_code_id: String,
    pub street: String,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
}

/// Raw fields win; blanks fall back to the postal record's canonical location
pub fn build_address(
    record: &RawCandidateRecord,
    address_type: &AddressType,
    country: &Country,
    postal: &PostalRecord,
    personal_data_id: &str,
) -> AddressRecord {
    let or_postal = |raw: &str, canonical: &str| non_blank(raw).unwrap_or_else(|| canonical.to_string());

    AddressRecord {
        id: uuid::Uuid::new_v4().to_string(),
        personal_data_id: personal_data_id.to_string(),
        address_type_id: address_type.id.clone(),
        country_id: country.id.clone(),
        postal_code_id: postal.id.clone(),
        street: or_postal(&record.street, &postal.street),
        number: non_blank(&record.street_number),
        complement: non_blank(&record.complement),
        district: or_postal(&record.district, &postal.district),
        city: or_postal(&record.city, &postal.city),
        state: or_postal(&record.state, &postal.state),
    }
}
