use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Oldest plausible age for a date of birth, in years.
pub const MAX_PLAUSIBLE_AGE_YEARS: i32 = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    /// Owning account: a doctor, or an assistant whose supervisor is the owning doctor.
    pub doctor_id: Option<Uuid>,
}

impl Patient {
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth.map(|dob| age_in_years(dob, today))
    }
}

/// Whole years elapsed between `dob` and `today`, birthday-adjusted.
pub fn age_in_years(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Why a date of birth was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplausibleBirthDate {
    InFuture,
    TooOld,
}

impl std::fmt::Display for ImplausibleBirthDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InFuture => f.write_str("Date of birth cannot be in the future"),
            Self::TooOld => write!(
                f,
                "Date of birth cannot be more than {MAX_PLAUSIBLE_AGE_YEARS} years ago"
            ),
        }
    }
}

/// Plausibility check shared by interactive entry and import.
pub fn check_birth_date(dob: NaiveDate, today: NaiveDate) -> Result<(), ImplausibleBirthDate> {
    if dob > today {
        return Err(ImplausibleBirthDate::InFuture);
    }
    // Feb 29 has no counterpart in most years; fall back to Feb 28.
    let earliest = NaiveDate::from_ymd_opt(
        today.year() - MAX_PLAUSIBLE_AGE_YEARS,
        today.month(),
        today.day(),
    )
    .or_else(|| NaiveDate::from_ymd_opt(today.year() - MAX_PLAUSIBLE_AGE_YEARS, today.month(), 28));
    match earliest {
        Some(earliest) if dob < earliest => Err(ImplausibleBirthDate::TooOld),
        _ => Ok(()),
    }
}
