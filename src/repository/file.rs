//! Roster kept in memory and serialized to a JSON file on `commit`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{reject_invalid, StudentRepository};
use crate::error::RepositoryResult;
use crate::models::StudentRecord;

#[derive(Debug, Default)]
struct Roster {
    records: BTreeMap<String, StudentRecord>,
    dirty: bool,
}

pub struct FileRepository {
    path: PathBuf,
    roster: RwLock<Roster>,
}

impl FileRepository {
    /// Loads `path` if it exists; a missing file is an empty roster that
    /// will be created on the first commit.
    pub async fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let roster = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<StudentRecord> = serde_json::from_slice(&bytes)?;
                debug!("Loaded {} records from {}", records.len(), path.display());
                Roster {
                    records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
                    dirty: false,
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("{} does not exist yet, starting empty", path.display());
                Roster {
                    records: BTreeMap::new(),
                    dirty: true,
                }
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            roster: RwLock::new(roster),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.roster.read().await.dirty
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "roster".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }
}

#[async_trait]
impl StudentRepository for FileRepository {
    async fn exists_by_id(&self, id: &str) -> RepositoryResult<bool> {
        Ok(self.roster.read().await.records.contains_key(id))
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<StudentRecord>> {
        Ok(self.roster.read().await.records.get(id).cloned())
    }

    async fn find_all(&self) -> RepositoryResult<Vec<StudentRecord>> {
        Ok(self.roster.read().await.records.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool> {
        let mut roster = self.roster.write().await;
        let removed = roster.records.remove(id).is_some();
        roster.dirty |= removed;
        Ok(removed)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.roster.read().await.records.len() as u64)
    }

    async fn save(&self, record: &StudentRecord) -> RepositoryResult<bool> {
        reject_invalid(record)?;
        let mut roster = self.roster.write().await;
        roster.records.insert(record.id.clone(), record.clone());
        roster.dirty = true;
        Ok(true)
    }

    async fn save_all(&self, records: &[StudentRecord]) -> RepositoryResult<usize> {
        for record in records {
            reject_invalid(record)?;
        }
        let mut roster = self.roster.write().await;
        for record in records {
            roster.records.insert(record.id.clone(), record.clone());
        }
        roster.dirty |= !records.is_empty();
        Ok(records.len())
    }

    async fn commit(&self) -> RepositoryResult<()> {
        let mut roster = self.roster.write().await;
        if !roster.dirty {
            return Ok(());
        }

        let written = roster.records.len();
        let bytes = {
            let records: Vec<&StudentRecord> = roster.records.values().collect();
            serde_json::to_vec_pretty(&records)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        if let Err(err) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err.into());
        }

        roster.dirty = false;
        info!("Wrote {} records to {}", written, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::RepositoryError;
    use crate::models::sample_record;

    #[tokio::test]
    async fn missing_file_starts_empty_and_commit_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.json");

        let repository = FileRepository::open(&path).await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 0);
        assert!(!path.exists());

        repository.commit().await.unwrap();
        assert!(path.exists());
        assert!(!repository.has_pending_changes().await);
    }

    #[tokio::test]
    async fn changes_persist_only_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.json");

        let repository = FileRepository::open(&path).await.unwrap();
        repository.save(&sample_record("SV0002", 3.1)).await.unwrap();
        repository.save(&sample_record("SV0001", 2.7)).await.unwrap();
        assert!(!path.exists());

        repository.commit().await.unwrap();

        let reopened = FileRepository::open(&path).await.unwrap();
        let ids: Vec<String> = reopened
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["SV0001", "SV0002"]);
    }

    #[tokio::test]
    async fn save_replaces_by_id_and_delete_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::open(dir.path().join("s.json")).await.unwrap();

        repository.save(&sample_record("SV0001", 2.0)).await.unwrap();
        repository.save(&sample_record("SV0001", 3.9)).await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 1);
        let stored = repository.find_by_id("SV0001").await.unwrap().unwrap();
        assert_eq!(stored.gpa, 3.9);

        assert!(repository.delete_by_id("SV0001").await.unwrap());
        assert!(!repository.delete_by_id("SV0001").await.unwrap());
        assert!(!repository.exists_by_id("SV0001").await.unwrap());
    }

    #[tokio::test]
    async fn invalid_gpa_is_rejected_at_the_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::open(dir.path().join("s.json")).await.unwrap();

        let result = repository.save(&sample_record("SV0001", 4.2)).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn trait_object_cannot_store_out_of_range_gpa() {
        let dir = tempfile::tempdir().unwrap();
        let repository: Arc<dyn StudentRepository> =
            Arc::new(FileRepository::open(dir.path().join("s.json")).await.unwrap());

        let result = repository.save(&sample_record("SV0001", 9.0)).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        let result = repository.save_all(&[sample_record("SV0002", 9.0)]).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));

        assert_eq!(repository.find_by_id("SV0001").await.unwrap(), None);
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_all_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::open(dir.path().join("s.json")).await.unwrap();

        let batch = vec![sample_record("SV0001", 3.0), sample_record("SV0002", 9.0)];
        assert!(repository.save_all(&batch).await.is_err());
        assert_eq!(repository.count().await.unwrap(), 0);

        let batch = vec![sample_record("SV0001", 3.0), sample_record("SV0002", 3.5)];
        assert_eq!(repository.save_all(&batch).await.unwrap(), 2);
        assert_eq!(repository.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileRepository::open(&path).await;
        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
    }
}
