//! Roster storage.
//!
//! One trait, two backends: a serialized JSON file and a SQL table. The
//! backend is chosen once at startup by [`open_repository`]; everything else
//! works against `Arc<dyn StudentRepository>`.
//!
//! The trait only exposes validated writes; the raw upserts stay private to
//! each backend.

mod file;
mod query;
mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{AppConfig, BackendKind};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::StudentRecord;
use crate::validation;

pub use file::FileRepository;
pub use query::{RosterQuery, SortKey};
pub use sql::SqlRepository;

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn exists_by_id(&self, id: &str) -> RepositoryResult<bool>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<StudentRecord>>;

    /// Every record, ordered by id.
    async fn find_all(&self) -> RepositoryResult<Vec<StudentRecord>>;

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool>;

    async fn count(&self) -> RepositoryResult<u64>;

    /// Persists pending changes. Backends that write through do nothing.
    async fn commit(&self) -> RepositoryResult<()> {
        Ok(())
    }

    /// Validates, then inserts or updates by id.
    async fn save(&self, record: &StudentRecord) -> RepositoryResult<bool>;

    /// Validates the whole batch, then writes every record or none of them.
    async fn save_all(&self, records: &[StudentRecord]) -> RepositoryResult<usize>;

    async fn search(&self, query: &RosterQuery) -> RepositoryResult<Vec<StudentRecord>> {
        let records = self.find_all().await?;
        Ok(query.apply(records))
    }

    async fn top_by_gpa(&self, limit: usize) -> RepositoryResult<Vec<StudentRecord>> {
        self.search(&RosterQuery::top_by_gpa(limit)).await
    }
}

/// Called by every backend before a write.
fn reject_invalid(record: &StudentRecord) -> RepositoryResult<()> {
    let report = validation::validate(record);
    if report.is_valid() {
        Ok(())
    } else {
        debug!(id = %record.id, errors = ?report.errors, "rejecting invalid record");
        Err(RepositoryError::Invalid(report.errors))
    }
}

/// Builds the backend named in the config.
pub async fn open_repository(config: &AppConfig) -> RepositoryResult<Arc<dyn StudentRepository>> {
    match config.backend {
        BackendKind::File => {
            let repository = FileRepository::open(&config.data_file).await?;
            Ok(Arc::new(repository))
        }
        BackendKind::Sql => {
            let repository = SqlRepository::connect(&config.database).await?;
            Ok(Arc::new(repository))
        }
    }
}
