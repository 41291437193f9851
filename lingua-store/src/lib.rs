//! Durable sink for extracted records.
//!
//! The harvester only needs append semantics: [`RecordStore::insert_many`]
//! writes a batch into a fixed collection and returns the number of rows
//! written. There is no upsert and no deduplication, so repeated runs append
//! duplicates.
use async_trait::async_trait;
use lingua_common::{HarvestError, TeacherRecord};
use std::sync::{Arc, Mutex};

pub mod sqlite;

pub use sqlite::SqliteRecordStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid collection name `{0}`")]
    InvalidCollection(String),
}

impl From<StoreError> for HarvestError {
    fn from(err: StoreError) -> Self {
        HarvestError::Store(err.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append `records` in order; returns how many were written.
    async fn insert_many(&self, records: &[TeacherRecord]) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert_many(&self, records: &[TeacherRecord]) -> Result<u64, StoreError> {
        (**self).insert_many(records).await
    }
}

/// In-process store, useful for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<Mutex<Vec<TeacherRecord>>>,
    batches: Arc<Mutex<usize>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn records(&self) -> Vec<TeacherRecord> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Number of non-empty `insert_many` calls received.
    pub fn batches(&self) -> usize {
        self.batches.lock().map(|b| *b).unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_many(&self, records: &[TeacherRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        if let Ok(mut rows) = self.rows.lock() {
            rows.extend_from_slice(records);
        }
        if let Ok(mut batches) = self.batches.lock() {
            *batches += 1;
        }
        Ok(records.len() as u64)
    }
}

/// Whether `name` can be used unquoted as a table name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
