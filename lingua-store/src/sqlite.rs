//! SQLite-backed [`RecordStore`].
//!
//! The configured database/collection pair maps onto one table named after
//! the collection; every row is stamped with the database name so several
//! logical databases can share one file.
use crate::{is_identifier, RecordStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use lingua_common::TeacherRecord;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

pub struct SqliteRecordStore {
    pool: SqlitePool,
    database: String,
    collection: String,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `url` and make sure the collection table exists.
    pub async fn connect(url: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await?;
        Self::from_pool(pool, database, collection).await
    }

    /// Wrap an existing pool. In-memory databases need a single-connection pool.
    pub async fn from_pool(
        pool: SqlitePool,
        database: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        if !is_identifier(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        let store = Self {
            pool,
            database: database.to_string(),
            collection: collection.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
              id               INTEGER PRIMARY KEY AUTOINCREMENT,
              db_name          TEXT NOT NULL,
              rating           TEXT NOT NULL,
              student_count    TEXT NOT NULL,
              lesson_count     TEXT NOT NULL,
              attendance       TEXT NOT NULL,
              price            TEXT,
              about            TEXT NOT NULL,
              as_teacher       TEXT NOT NULL,
              teaching_style   TEXT NOT NULL,
              languages_taught TEXT NOT NULL,
              country          TEXT NOT NULL,
              inserted_at      TEXT NOT NULL
            )
            "#,
            table = self.collection
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        debug!(collection = %self.collection, "store.ensure_schema");
        Ok(())
    }

    /// Read back every row of this database's collection in insertion order.
    pub async fn records(&self) -> Result<Vec<TeacherRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT rating, student_count, lesson_count, attendance, price,
                   about, as_teacher, teaching_style, languages_taught, country
            FROM {table}
            WHERE db_name = ?1
            ORDER BY id ASC
            "#,
            table = self.collection
        );
        let rows = sqlx::query(&sql)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|r| -> Result<TeacherRecord, StoreError> {
                let languages: String = r.try_get("languages_taught")?;
                Ok(TeacherRecord {
                    rating: r.try_get("rating")?,
                    student_count: r.try_get("student_count")?,
                    lesson_count: r.try_get("lesson_count")?,
                    attendance: r.try_get("attendance")?,
                    price: r.try_get("price")?,
                    about: r.try_get("about")?,
                    as_teacher: r.try_get("as_teacher")?,
                    teaching_style: r.try_get("teaching_style")?,
                    languages_taught: serde_json::from_str(&languages)?,
                    country: r.try_get("country")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_many(&self, records: &[TeacherRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            r#"INSERT INTO {table}
            (db_name, rating, student_count, lesson_count, attendance, price,
             about, as_teacher, teaching_style, languages_taught, country, inserted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            table = self.collection
        );
        let inserted_at = Utc::now().to_rfc3339();

        // Single txn so a batch lands completely or not at all.
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for record in records {
            let languages = serde_json::to_string(&record.languages_taught)?;
            let res = sqlx::query(&sql)
                .bind(&self.database)
                .bind(&record.rating)
                .bind(&record.student_count)
                .bind(&record.lesson_count)
                .bind(&record.attendance)
                .bind(&record.price)
                .bind(&record.about)
                .bind(&record.as_teacher)
                .bind(&record.teaching_style)
                .bind(languages)
                .bind(&record.country)
                .bind(&inserted_at)
                .execute(&mut *tx)
                .await?;
            written += res.rows_affected();
        }
        tx.commit().await?;

        info!(
            database = %self.database,
            collection = %self.collection,
            rows = written,
            "store.insert_many"
        );
        Ok(written)
    }
}
