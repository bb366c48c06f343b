use std::cmp::Ordering;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{Gender, StudentRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Id,
    Name,
    Gpa,
    Class,
}

/// Filters, ordering and limit over the roster. Empty query = whole roster by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterQuery {
    /// Case-insensitive substring over id, name, class and major
    pub keyword: Option<String>,
    pub class_name: Option<String>,
    pub major: Option<String>,
    pub gender: Option<Gender>,
    pub min_gpa: Option<f64>,
    pub max_gpa: Option<f64>,
    pub sort: SortKey,
    pub descending: bool,
    pub limit: Option<usize>,
}

impl RosterQuery {
    pub fn top_by_gpa(limit: usize) -> Self {
        Self {
            sort: SortKey::Gpa,
            descending: true,
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &StudentRecord) -> bool {
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            let needle = keyword.to_lowercase();
            let hit = [
                &record.id,
                &record.full_name,
                &record.class_name,
                &record.major,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(class_name) = &self.class_name {
            if &record.class_name != class_name {
                return false;
            }
        }
        if let Some(major) = &self.major {
            if &record.major != major {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if record.gender != gender {
                return false;
            }
        }
        if self.min_gpa.is_some_and(|min| record.gpa < min) {
            return false;
        }
        if self.max_gpa.is_some_and(|max| record.gpa > max) {
            return false;
        }
        true
    }

    pub fn apply(&self, records: Vec<StudentRecord>) -> Vec<StudentRecord> {
        let mut selected: Vec<StudentRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();

        selected.sort_by(|a, b| {
            let ordering = self.compare(a, b);
            let ordering = if self.descending {
                ordering.reverse()
            } else {
                ordering
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }

    fn compare(&self, a: &StudentRecord, b: &StudentRecord) -> Ordering {
        match self.sort {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Name => a.full_name.cmp(&b.full_name),
            SortKey::Gpa => a.gpa.partial_cmp(&b.gpa).unwrap_or(Ordering::Equal),
            SortKey::Class => a.class_name.cmp(&b.class_name),
        }
    }
}
