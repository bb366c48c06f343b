//! Relational backend on a `sqlx` SQLite pool.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{reject_invalid, RosterQuery, SortKey, StudentRepository};
use crate::config::DatabaseConfig;
use crate::error::RepositoryResult;
use crate::models::{Gender, StudentRecord};

const SELECT_COLUMNS: &str = "SELECT id, full_name, birth_date, gender, address, phone, email, \
     class_name, major, gpa FROM students";

pub struct SqlRepository {
    pool: SqlitePool,
    /// Held for every write so that writes never overlap.
    write_gate: Mutex<()>,
}

impl SqlRepository {
    /// Opens the pool and brings the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> RepositoryResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to {}", config.url);

        Ok(Self {
            pool,
            write_gate: Mutex::new(()),
        })
    }

    /// Insert or replace without validation.
    async fn upsert(&self, record: &StudentRecord) -> RepositoryResult<bool> {
        let _guard = self.write_gate.lock().await;
        let result = upsert_query(record).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// One transaction; rolled back when any row fails.
    async fn upsert_all(&self, records: &[StudentRecord]) -> RepositoryResult<usize> {
        let _guard = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        for record in records {
            if let Err(err) = upsert_query(record).execute(&mut *tx).await {
                debug!(id = %record.id, "batch write failed, rolling back");
                tx.rollback().await?;
                return Err(err.into());
            }
        }

        tx.commit().await?;
        Ok(records.len())
    }
}

fn upsert_query(record: &StudentRecord) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO students
        (id, full_name, birth_date, gender, address, phone, email, class_name, major, gpa)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE
        SET full_name = excluded.full_name, birth_date = excluded.birth_date,
            gender = excluded.gender, address = excluded.address, phone = excluded.phone,
            email = excluded.email, class_name = excluded.class_name, major = excluded.major,
            gpa = excluded.gpa, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(record.id.as_str())
    .bind(record.full_name.as_str())
    .bind(record.birth_date)
    .bind(record.gender.label())
    .bind(record.address.as_str())
    .bind(record.phone.as_str())
    .bind(record.email.as_str())
    .bind(record.class_name.as_str())
    .bind(record.major.as_str())
    .bind(record.gpa)
}

fn row_to_record(row: &SqliteRow) -> RepositoryResult<StudentRecord> {
    let gender_text: String = row.try_get("gender")?;
    let gender = Gender::parse(&gender_text).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown gender '{gender_text}' in students table").into())
    })?;

    Ok(StudentRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        birth_date: row.try_get("birth_date")?,
        gender,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        class_name: row.try_get("class_name")?,
        major: row.try_get("major")?,
        gpa: row.try_get("gpa")?,
    })
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::Id => "id",
        SortKey::Name => "full_name",
        SortKey::Gpa => "gpa",
        SortKey::Class => "class_name",
    }
}

/// `%keyword%` with LIKE wildcards in the keyword escaped.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl StudentRepository for SqlRepository {
    async fn exists_by_id(&self, id: &str) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<StudentRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_all(&self) -> RepositoryResult<Vec<StudentRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool> {
        let _guard = self.write_gate.lock().await;
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn save(&self, record: &StudentRecord) -> RepositoryResult<bool> {
        reject_invalid(record)?;
        self.upsert(record).await
    }

    async fn save_all(&self, records: &[StudentRecord]) -> RepositoryResult<usize> {
        for record in records {
            reject_invalid(record)?;
        }
        self.upsert_all(records).await
    }

    async fn search(&self, query: &RosterQuery) -> RepositoryResult<Vec<StudentRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push(" WHERE 1 = 1");

        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
            let pattern = like_pattern(keyword);
            builder.push(" AND (");
            for (index, column) in ["id", "full_name", "class_name", "major"].iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push(*column)
                    .push(" LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            builder.push(")");
        }
        if let Some(class_name) = &query.class_name {
            builder.push(" AND class_name = ").push_bind(class_name.clone());
        }
        if let Some(major) = &query.major {
            builder.push(" AND major = ").push_bind(major.clone());
        }
        if let Some(gender) = query.gender {
            builder.push(" AND gender = ").push_bind(gender.label());
        }
        if let Some(min) = query.min_gpa {
            builder.push(" AND gpa >= ").push_bind(min);
        }
        if let Some(max) = query.max_gpa {
            builder.push(" AND gpa <= ").push_bind(max);
        }

        builder
            .push(" ORDER BY ")
            .push(sort_column(query.sort))
            .push(if query.descending { " DESC" } else { " ASC" })
            .push(", id ASC");

        if let Some(limit) = query.limit {
            builder
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use crate::models::sample_record;

    async fn memory_repository() -> SqlRepository {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        SqlRepository::connect(&config)
            .await
            .expect("Failed to create test database")
    }

    #[tokio::test]
    async fn save_then_find_round_trips() {
        let repository = memory_repository().await;
        let record = sample_record("SV0001", 3.25);

        assert!(repository.save(&record).await.unwrap());
        assert!(repository.exists_by_id("SV0001").await.unwrap());
        assert_eq!(
            repository.find_by_id("SV0001").await.unwrap(),
            Some(record)
        );
        assert_eq!(repository.find_by_id("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_updates_existing_id() {
        let repository = memory_repository().await;
        repository.save(&sample_record("SV0001", 2.0)).await.unwrap();

        let mut updated = sample_record("SV0001", 3.7);
        updated.birth_date = None;
        repository.save(&updated).await.unwrap();

        assert_eq!(repository.count().await.unwrap(), 1);
        assert_eq!(
            repository.find_by_id("SV0001").await.unwrap(),
            Some(updated)
        );
    }

    #[tokio::test]
    async fn invalid_records_never_reach_the_table() {
        let repository = memory_repository().await;
        let result = repository.save(&sample_record("SV0001", -1.0)).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_all_rejects_the_whole_batch_before_writing() {
        let repository: std::sync::Arc<dyn StudentRepository> =
            std::sync::Arc::new(memory_repository().await);

        let batch = vec![sample_record("SV0001", 3.0), sample_record("SV0002", 9.0)];
        let result = repository.save_all(&batch).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_rolls_back_on_constraint_failure() {
        let repository = memory_repository().await;

        // upsert_all skips validation, so the CHECK constraint is what fails.
        let batch = vec![sample_record("SV0001", 3.0), sample_record("SV0002", 7.0)];
        assert!(repository.upsert_all(&batch).await.is_err());
        assert_eq!(repository.count().await.unwrap(), 0);

        let batch = vec![sample_record("SV0001", 3.0), sample_record("SV0002", 3.5)];
        assert_eq!(repository.save_all(&batch).await.unwrap(), 2);
        assert_eq!(repository.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_and_find_all_order() {
        let repository = memory_repository().await;
        for id in ["SV0003", "SV0001", "SV0002"] {
            repository.save(&sample_record(id, 3.0)).await.unwrap();
        }

        let ids: Vec<String> = repository
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["SV0001", "SV0002", "SV0003"]);

        assert!(repository.delete_by_id("SV0002").await.unwrap());
        assert!(!repository.delete_by_id("SV0002").await.unwrap());
        assert_eq!(repository.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_matches_in_memory_query() {
        let repository = memory_repository().await;
        let mut records = vec![
            sample_record("SV0001", 2.1),
            sample_record("SV0002", 3.8),
            sample_record("SV0003", 3.8),
        ];
        records[0].class_name = "CS02".to_string();
        records[1].full_name = "Tran Thi Lan".to_string();
        records[1].gender = Gender::Female;
        repository.save_all(&records).await.unwrap();

        let queries = [
            RosterQuery::top_by_gpa(2),
            RosterQuery {
                keyword: Some("LAN".to_string()),
                ..RosterQuery::default()
            },
            RosterQuery {
                class_name: Some("CS01".to_string()),
                gender: Some(Gender::Male),
                min_gpa: Some(3.0),
                ..RosterQuery::default()
            },
            RosterQuery {
                sort: SortKey::Name,
                descending: true,
                ..RosterQuery::default()
            },
        ];

        for query in queries {
            let from_sql = repository.search(&query).await.unwrap();
            let in_memory = query.apply(records.clone());
            assert_eq!(from_sql, in_memory, "{query:?}");
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_a"), "%50\\%\\_a%");
    }
}
