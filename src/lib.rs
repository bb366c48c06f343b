//! Student roster records: CSV import/export with validation, pluggable
//! storage (JSON file or SQL), queries and statistics.

pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod rank;
pub mod report;
pub mod repository;
pub mod transfer;
pub mod validation;
pub mod worker;

pub use config::{AppConfig, BackendKind, DatabaseConfig};
pub use error::{ConfigError, ParseError, RepositoryError, TransferError};
pub use models::{Gender, StudentRecord};
pub use rank::AcademicRank;
pub use repository::{open_repository, RosterQuery, SortKey, StudentRepository};
pub use transfer::{export_to_csv, import_from_csv, ImportOptions, ImportSummary};
pub use validation::{validate, ValidationReport};
