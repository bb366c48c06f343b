use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rank::AcademicRank;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Accepts the English labels in any case and the localized `Nam`/`Nữ`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("male") || text == "Nam" || text == "nam" {
            Some(Gender::Male)
        } else if text.eq_ignore_ascii_case("female") || text == "Nữ" || text == "nữ" {
            Some(Gender::Female)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub class_name: String,
    pub major: String,
    pub gpa: f64,
}

impl StudentRecord {
    pub fn academic_rank(&self) -> AcademicRank {
        AcademicRank::from_gpa(self.gpa)
    }

    /// `dd/MM/yyyy`, or empty when no birth date is known.
    pub fn birth_date_text(&self) -> String {
        self.birth_date
            .map(|date| date.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for StudentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} - {}", self.id, self.full_name, self.class_name)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str, gpa: f64) -> StudentRecord {
    StudentRecord {
        id: id.to_string(),
        full_name: "Nguyen Van A".to_string(),
        birth_date: NaiveDate::from_ymd_opt(2000, 3, 15),
        gender: Gender::Male,
        address: "12 Le Loi St".to_string(),
        phone: "0912345678".to_string(),
        email: "a@example.com".to_string(),
        class_name: "CS01".to_string(),
        major: "IT".to_string(),
        gpa,
    }
}
