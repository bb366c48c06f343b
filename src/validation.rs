//! Business-rule checks for a fully populated record.
//!
//! Errors block a save, warnings are advisory. Nothing here mutates the
//! record or touches storage.

use chrono::{Months, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::StudentRecord;

pub const GPA_MIN: f64 = 0.0;
pub const GPA_MAX: f64 = 4.0;

const MIN_AGE_YEARS: u32 = 16;
const MAX_AGE_YEARS: u32 = 100;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{6,10}$").expect("valid id pattern"));
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d{9,10}$").expect("valid phone pattern"));
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

/// Local mobile number: `0` followed by 9 or 10 digits.
pub fn is_phone_number(text: &str) -> bool {
    PHONE_PATTERN.is_match(text)
}

pub fn gpa_in_range(gpa: f64) -> bool {
    gpa.is_finite() && (GPA_MIN..=GPA_MAX).contains(&gpa)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate(record: &StudentRecord) -> ValidationReport {
    validate_as_of(record, Utc::now().date_naive())
}

pub fn validate_as_of(record: &StudentRecord, today: NaiveDate) -> ValidationReport {
    let mut report = ValidationReport::default();

    let id = record.id.trim();
    if id.is_empty() {
        report.errors.push("student id is required".to_string());
    } else if !ID_PATTERN.is_match(id) {
        report
            .warnings
            .push(format!("student id '{id}' should be 6-10 letters or digits"));
    }

    if record.full_name.trim().chars().count() < 2 {
        report
            .errors
            .push("full name must be at least 2 characters".to_string());
    }

    if record.class_name.trim().is_empty() {
        report.errors.push("class name is required".to_string());
    }

    if !is_phone_number(record.phone.trim()) {
        report.errors.push(format!(
            "phone '{}' must be 0 followed by 9-10 digits",
            record.phone
        ));
    }

    let email = record.email.trim();
    if !email.is_empty() && !EMAIL_PATTERN.is_match(email) {
        report
            .warnings
            .push(format!("email '{email}' does not look like an email address"));
    }

    if !gpa_in_range(record.gpa) {
        report
            .errors
            .push(format!("GPA {} must be between 0.0 and 4.0", record.gpa));
    }

    if let Some(birth_date) = record.birth_date {
        check_birth_date(birth_date, today, &mut report);
    }

    report
}

fn check_birth_date(birth_date: NaiveDate, today: NaiveDate, report: &mut ValidationReport) {
    if birth_date > today {
        report
            .errors
            .push(format!("birth date {birth_date} is in the future"));
        return;
    }

    let oldest = today.checked_sub_months(Months::new(MAX_AGE_YEARS * 12));
    if oldest.is_some_and(|limit| birth_date < limit) {
        report.errors.push(format!(
            "birth date {birth_date} is more than {MAX_AGE_YEARS} years ago"
        ));
        return;
    }

    let youngest = today.checked_sub_months(Months::new(MIN_AGE_YEARS * 12));
    if youngest.is_some_and(|limit| birth_date > limit) {
        report
            .warnings
            .push(format!("student is younger than {MIN_AGE_YEARS}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_record;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn clean_record_has_no_issues() {
        let report = validate_as_of(&sample_record("SV0001", 3.2), today());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn out_of_range_gpa_is_an_error_not_a_clamp() {
        let record = sample_record("SV0001", 4.5);
        let report = validate_as_of(&record, today());
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("GPA"));
        assert_eq!(record.gpa, 4.5);

        let report = validate_as_of(&sample_record("SV0001", -0.1), today());
        assert!(!report.is_valid());
    }

    #[test]
    fn short_id_is_only_a_warning() {
        let report = validate_as_of(&sample_record("SV1", 3.0), today());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn required_fields_are_errors() {
        let mut record = sample_record("", 3.0);
        record.full_name = "A".to_string();
        record.class_name = "  ".to_string();
        record.phone = "12345".to_string();
        let report = validate_as_of(&record, today());
        assert_eq!(report.errors.len(), 4, "{:?}", report.errors);
    }

    #[test]
    fn bad_email_is_a_warning() {
        let mut record = sample_record("SV0001", 3.0);
        record.email = "not-an-email".to_string();
        let report = validate_as_of(&record, today());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);

        record.email.clear();
        assert!(validate_as_of(&record, today()).warnings.is_empty());
    }

    #[test]
    fn birth_date_bounds() {
        let mut record = sample_record("SV0001", 3.0);

        record.birth_date = NaiveDate::from_ymd_opt(2012, 1, 1);
        let report = validate_as_of(&record, today());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);

        record.birth_date = NaiveDate::from_ymd_opt(1920, 1, 1);
        assert!(!validate_as_of(&record, today()).is_valid());

        record.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(!validate_as_of(&record, today()).is_valid());

        record.birth_date = None;
        assert!(validate_as_of(&record, today()).is_valid());
    }

    #[test]
    fn phone_pattern() {
        assert!(is_phone_number("0912345678"));
        assert!(is_phone_number("09123456789"));
        assert!(!is_phone_number("091234567"));
        assert!(!is_phone_number("091234567890"));
        assert!(!is_phone_number("1912345678"));
        assert!(!is_phone_number("09123a5678"));
    }
}
