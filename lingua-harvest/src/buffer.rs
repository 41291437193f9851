use lingua_common::{Result, TeacherRecord};
use lingua_store::RecordStore;
use tracing::{debug, warn};

/// Extracted records waiting to be written.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    pending: Vec<TeacherRecord>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TeacherRecord) {
        self.pending.push(record);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[TeacherRecord] {
        &self.pending
    }

    /// Write everything pending in one batch and clear the buffer.
    ///
    /// On failure the records stay buffered for the next flush.
    pub async fn flush<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<u64> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        match store.insert_many(&self.pending).await {
            Ok(written) => {
                debug!(records = self.pending.len(), written, "buffer.flushed");
                self.pending.clear();
                Ok(written)
            }
            Err(err) => {
                warn!(pending = self.pending.len(), error = %err, "buffer.flush_failed");
                Err(err.into())
            }
        }
    }
}
