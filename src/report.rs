use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;

use crate::models::StudentRecord;
use crate::rank::AcademicRank;

const NO_MAJOR: &str = "(none)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankSummary {
    pub rank: AcademicRank,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterStatistics {
    pub total: usize,
    pub average_gpa: Option<f64>,
    pub max_gpa: Option<f64>,
    pub min_gpa: Option<f64>,
    pub by_gender: Vec<GroupCount>,
    /// Every rank, best first, including empty ones
    pub by_rank: Vec<RankSummary>,
    pub by_class: Vec<GroupCount>,
    pub by_major: Vec<GroupCount>,
}

/// Groups by `key`, largest group first, ties by label.
fn count_by<F>(records: &[StudentRecord], key: F) -> Vec<GroupCount>
where
    F: Fn(&StudentRecord) -> String,
{
    let mut map: HashMap<String, usize> = HashMap::new();
    for record in records {
        *map.entry(key(record)).or_insert(0) += 1;
    }

    let mut groups: Vec<GroupCount> = map
        .into_iter()
        .map(|(label, count)| GroupCount { label, count })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    groups
}

pub fn compute_statistics(records: &[StudentRecord]) -> RosterStatistics {
    let total = records.len();
    let gpas = records.iter().map(|r| r.gpa);

    let (average_gpa, max_gpa, min_gpa) = if total == 0 {
        (None, None, None)
    } else {
        let sum: f64 = gpas.clone().sum();
        (
            Some(sum / total as f64),
            gpas.clone().reduce(f64::max),
            gpas.reduce(f64::min),
        )
    };

    let by_rank = AcademicRank::ALL
        .iter()
        .map(|&rank| RankSummary {
            rank,
            count: records.iter().filter(|r| r.academic_rank() == rank).count(),
        })
        .collect();

    RosterStatistics {
        total,
        average_gpa,
        max_gpa,
        min_gpa,
        by_gender: count_by(records, |r| r.gender.label().to_string()),
        by_rank,
        by_class: count_by(records, |r| r.class_name.clone()),
        by_major: count_by(records, |r| {
            if r.major.trim().is_empty() {
                NO_MAJOR.to_string()
            } else {
                r.major.clone()
            }
        }),
    }
}

fn write_groups(output: &mut String, title: &str, groups: &[GroupCount]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    if groups.is_empty() {
        let _ = writeln!(output, "No students recorded.");
    } else {
        for group in groups {
            let _ = writeln!(output, "- {}: {}", group.label, group.count);
        }
    }
}

pub fn build_report(stats: &RosterStatistics, top: &[StudentRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Roster Report");
    let _ = writeln!(output, "Total students: {}", stats.total);

    let _ = writeln!(output);
    let _ = writeln!(output, "## GPA");
    match (stats.average_gpa, stats.max_gpa, stats.min_gpa) {
        (Some(avg), Some(max), Some(min)) => {
            let _ = writeln!(output, "- Average: {avg:.2}");
            let _ = writeln!(output, "- Highest: {max:.2}");
            let _ = writeln!(output, "- Lowest: {min:.2}");
        }
        _ => {
            let _ = writeln!(output, "No students recorded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Academic Rank");
    for summary in &stats.by_rank {
        let share = if stats.total == 0 {
            0.0
        } else {
            summary.count as f64 * 100.0 / stats.total as f64
        };
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            summary.rank, summary.count, share
        );
    }

    write_groups(&mut output, "Gender", &stats.by_gender);
    write_groups(&mut output, "Class", &stats.by_class);
    write_groups(&mut output, "Major", &stats.by_major);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Students");
    if top.is_empty() {
        let _ = writeln!(output, "No students recorded.");
    } else {
        for record in top {
            let _ = writeln!(
                output,
                "- {} ({}, {}) GPA {:.2} {}",
                record.full_name,
                record.id,
                record.class_name,
                record.gpa,
                record.academic_rank()
            );
        }
    }

    output
}
