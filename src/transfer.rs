//! Bulk CSV import and export against a repository.
//!
//! Import never stops at a bad row: each row ends up as a success, a
//! duplicate, a replacement or a failure, and the caller gets the tally plus
//! one "Row N: ..." message per row that did not simply import. Only an
//! unreadable file fails the whole call.

use std::io::Write;
use std::path::Path;
use std::str::Utf8Error;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::TransferError;
use crate::models::StudentRecord;
use crate::repository::StudentRepository;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub validate_before_save: bool,
    /// Overwrite records whose id already exists instead of counting them as
    /// duplicates
    pub replace_existing: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            validate_before_save: true,
            replace_existing: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub success: usize,
    pub failure: usize,
    pub duplicate: usize,
    pub replaced: usize,
    /// Per-row outcomes other than a plain import, in file order
    pub messages: Vec<String>,
    /// Non-blocking validation warnings, in file order
    pub warnings: Vec<String>,
}

impl ImportSummary {
    pub fn total_processed(&self) -> usize {
        self.success + self.failure + self.duplicate + self.replaced
    }

    pub fn has_errors(&self) -> bool {
        self.failure > 0
    }

    fn fail(&mut self, line_number: usize, reason: impl std::fmt::Display) {
        debug!("Row {line_number} failed: {reason}");
        self.failure += 1;
        self.messages.push(format!("Row {line_number}: {reason}"));
    }
}

enum RowOutcome {
    Imported,
    Replaced,
    Duplicate(String),
    Failed(String),
}

async fn read_file(path: &Path) -> Result<Vec<u8>, TransferError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| TransferError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Data lines with their 1-based file line numbers. The first line is always
/// treated as the header; blank lines are dropped. Lines that are not UTF-8
/// come back as errors so the caller can fail just that row.
fn data_lines(bytes: &[u8]) -> impl Iterator<Item = (usize, Result<&str, Utf8Error>)> {
    bytes
        .split(|&b| b == b'\n')
        .enumerate()
        .skip(1)
        .map(|(index, line)| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (index + 1, std::str::from_utf8(line))
        })
        .filter(|(_, line)| !matches!(line, Ok(text) if text.trim().is_empty()))
}

fn not_utf8(line_number: usize, err: Utf8Error) -> String {
    warn!("Row {line_number} is not valid UTF-8: {err}");
    format!("not valid UTF-8: {err}")
}

pub async fn import_from_csv(
    path: &Path,
    repository: &dyn StudentRepository,
    options: ImportOptions,
) -> Result<ImportSummary, TransferError> {
    let bytes = read_file(path).await?;
    info!("Importing students from {}", path.display());

    let mut summary = ImportSummary::default();
    for (line_number, line) in data_lines(&bytes) {
        let outcome = match line {
            Ok(line) => import_row(line_number, line, repository, options, &mut summary).await,
            Err(err) => RowOutcome::Failed(not_utf8(line_number, err)),
        };
        match outcome {
            RowOutcome::Imported => summary.success += 1,
            RowOutcome::Replaced => {
                summary.replaced += 1;
                summary
                    .messages
                    .push(format!("Row {line_number}: replaced existing record"));
            }
            RowOutcome::Duplicate(id) => {
                summary.duplicate += 1;
                summary
                    .messages
                    .push(format!("Row {line_number}: duplicate id {id}"));
            }
            RowOutcome::Failed(reason) => summary.fail(line_number, reason),
        }
    }

    repository.commit().await?;

    info!(
        "Import finished: {} imported, {} failed, {} duplicate, {} replaced",
        summary.success, summary.failure, summary.duplicate, summary.replaced
    );
    Ok(summary)
}

async fn import_row(
    line_number: usize,
    line: &str,
    repository: &dyn StudentRepository,
    options: ImportOptions,
    summary: &mut ImportSummary,
) -> RowOutcome {
    let record = match codec::parse_line(line) {
        Ok(record) => record,
        Err(err) => return RowOutcome::Failed(err.to_string()),
    };

    let exists = match repository.exists_by_id(&record.id).await {
        Ok(exists) => exists,
        Err(err) => return RowOutcome::Failed(format!("lookup failed: {err}")),
    };
    if exists && !options.replace_existing {
        return RowOutcome::Duplicate(record.id);
    }

    if options.validate_before_save {
        let report = validation::validate(&record);
        summary.warnings.extend(
            report
                .warnings
                .iter()
                .map(|warning| format!("Row {line_number}: {warning}")),
        );
        if !report.is_valid() {
            return RowOutcome::Failed(format!(
                "validation failed: {}",
                report.errors.join("; ")
            ));
        }
    }

    match repository.save(&record).await {
        Ok(true) if exists => RowOutcome::Replaced,
        Ok(true) => RowOutcome::Imported,
        Ok(false) => RowOutcome::Failed("save failed".to_string()),
        Err(err) => RowOutcome::Failed(format!("save failed: {err}")),
    }
}

/// Parses and validates a file without touching any repository.
///
/// `success` counts rows that would import; duplicates are not detected.
pub async fn check_csv(path: &Path) -> Result<ImportSummary, TransferError> {
    let bytes = read_file(path).await?;
    let mut summary = ImportSummary::default();

    for (line_number, line) in data_lines(&bytes) {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                summary.fail(line_number, not_utf8(line_number, err));
                continue;
            }
        };
        let record = match codec::parse_line(line) {
            Ok(record) => record,
            Err(err) => {
                summary.fail(line_number, err);
                continue;
            }
        };
        let report = validation::validate(&record);
        summary.warnings.extend(
            report
                .warnings
                .iter()
                .map(|warning| format!("Row {line_number}: {warning}")),
        );
        if report.is_valid() {
            summary.success += 1;
        } else {
            summary.fail(
                line_number,
                format!("validation failed: {}", report.errors.join("; ")),
            );
        }
    }
    Ok(summary)
}

pub fn export_to_writer<W: Write>(writer: W, records: &[StudentRecord]) -> Result<(), TransferError> {
    codec::write_csv(writer, records)?;
    Ok(())
}

/// Writes `records` to `path`. Failures are logged and reported as `false`.
pub async fn export_to_csv(path: &Path, records: &[StudentRecord]) -> bool {
    let mut buffer = Vec::new();
    if let Err(err) = export_to_writer(&mut buffer, records) {
        warn!("Failed to encode CSV export: {err}");
        return false;
    }

    match tokio::fs::write(path, &buffer).await {
        Ok(()) => {
            info!("Exported {} students to {}", records.len(), path.display());
            true
        }
        Err(err) => {
            warn!("Failed to write {}: {err}", path.display());
            false
        }
    }
}
