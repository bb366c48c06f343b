//! Serial job runner.
//!
//! Long-running roster work (import, export, statistics) is queued to a single
//! Tokio task that owns the repository handle. Jobs run one at a time in
//! submission order and each result is sent back exactly once over its own
//! oneshot channel.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{RepositoryError, TransferError};
use crate::report::{self, RosterStatistics};
use crate::repository::{RosterQuery, StudentRepository};
use crate::transfer::{self, ImportOptions, ImportSummary};

const QUEUE_DEPTH: usize = 16;

enum Job {
    Import {
        path: PathBuf,
        options: ImportOptions,
        reply: oneshot::Sender<Result<ImportSummary, TransferError>>,
    },
    Export {
        path: PathBuf,
        query: RosterQuery,
        reply: oneshot::Sender<Result<bool, TransferError>>,
    },
    Statistics {
        reply: oneshot::Sender<Result<RosterStatistics, RepositoryError>>,
    },
}

/// Handle for submitting jobs. Cloning shares the same queue; the worker
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct JobRunner {
    sender: mpsc::Sender<Job>,
}

impl JobRunner {
    pub fn spawn(repository: Arc<dyn StudentRepository>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(repository, receiver));
        Self { sender }
    }

    pub async fn import(
        &self,
        path: PathBuf,
        options: ImportOptions,
    ) -> Result<ImportSummary, TransferError> {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Import {
            path,
            options,
            reply,
        })
        .await?;
        response.await.map_err(|_| TransferError::RunnerStopped)?
    }

    /// Exports the records selected by `query`.
    pub async fn export(&self, path: PathBuf, query: RosterQuery) -> Result<bool, TransferError> {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Export { path, query, reply }).await?;
        response.await.map_err(|_| TransferError::RunnerStopped)?
    }

    pub async fn statistics(&self) -> Result<RosterStatistics, TransferError> {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Statistics { reply }).await?;
        let stats = response.await.map_err(|_| TransferError::RunnerStopped)??;
        Ok(stats)
    }

    async fn submit(&self, job: Job) -> Result<(), TransferError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| TransferError::RunnerStopped)
    }
}

async fn run(repository: Arc<dyn StudentRepository>, mut receiver: mpsc::Receiver<Job>) {
    debug!("Job runner started");
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Import {
                path,
                options,
                reply,
            } => {
                let result = transfer::import_from_csv(&path, repository.as_ref(), options).await;
                deliver(reply, result, "import");
            }
            Job::Export { path, query, reply } => {
                let result: Result<bool, TransferError> = match repository.search(&query).await {
                    Ok(records) => Ok(transfer::export_to_csv(&path, &records).await),
                    Err(err) => Err(err.into()),
                };
                deliver(reply, result, "export");
            }
            Job::Statistics { reply } => {
                let result = repository
                    .find_all()
                    .await
                    .map(|records| report::compute_statistics(&records));
                deliver(reply, result, "statistics");
            }
        }
    }
    debug!("Job runner stopped");
}

fn deliver<T>(reply: oneshot::Sender<T>, result: T, job: &str) {
    if reply.send(result).is_err() {
        warn!("Caller went away before the {job} job finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_record;
    use crate::repository::FileRepository;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("in.csv");
        let rows = vec![sample_record("SV0001", 3.7), sample_record("SV0002", 2.4)];
        let mut buffer = Vec::new();
        transfer::export_to_writer(&mut buffer, &rows).unwrap();
        std::fs::write(&csv_path, buffer).unwrap();

        let repository = Arc::new(
            FileRepository::open(dir.path().join("students.json"))
                .await
                .unwrap(),
        );
        let runner = JobRunner::spawn(repository.clone());

        // join! polls in order, so the import is queued before the statistics job
        // and the statistics must see its rows.
        let (summary, stats) = tokio::join!(
            runner.import(csv_path, ImportOptions::default()),
            runner.statistics(),
        );
        assert_eq!(summary.unwrap().success, 2);
        assert_eq!(stats.unwrap().total, 2);

        let export_path = dir.path().join("out.csv");
        let (stats, exported) = tokio::join!(
            runner.statistics(),
            runner.export(export_path.clone(), RosterQuery::top_by_gpa(1)),
        );
        assert_eq!(stats.unwrap().total, 2);
        assert!(exported.unwrap());
        let written = std::fs::read_to_string(&export_path).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("SV0001"));
    }

    #[tokio::test]
    async fn import_errors_come_back_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(
            FileRepository::open(dir.path().join("students.json"))
                .await
                .unwrap(),
        );
        let runner = JobRunner::spawn(repository);

        let result = runner
            .import(dir.path().join("missing.csv"), ImportOptions::default())
            .await;
        assert!(matches!(result, Err(TransferError::Io { .. })));
    }
}
