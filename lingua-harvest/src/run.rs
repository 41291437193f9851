//! Top-level sequencing of one harvest run.
use crate::buffer::RecordBuffer;
use crate::extract::DetailExtractor;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use lingua_common::{HarvestError, Result};
use lingua_config::HarvestConfig;
use lingua_drivers::PageDriver;
use lingua_store::RecordStore;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Summary of one run, returned by [`Harvester::run`] and logged at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub categories_visited: u32,
    pub sub_categories_visited: u32,
    pub sub_categories_skipped: u32,
    pub pages_loaded: u32,
    pub items_attempted: u64,
    pub items_failed: u64,
    pub records_stored: u64,
}

impl RunReport {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            categories_visited: 0,
            sub_categories_visited: 0,
            sub_categories_skipped: 0,
            pages_loaded: 0,
            items_attempted: 0,
            items_failed: 0,
            records_stored: 0,
        }
    }
}

/// Walks the whole filtered listing once and persists what it extracts.
///
/// Owns the driver session, the record store and the record buffer for the
/// lifetime of the run.
pub struct Harvester<D: PageDriver, S: RecordStore> {
    pub(crate) driver: D,
    pub(crate) store: S,
    pub(crate) config: HarvestConfig,
    pub(crate) extractor: DetailExtractor,
    pub(crate) retry: RetryPolicy,
    pub(crate) buffer: RecordBuffer,
    pub(crate) report: RunReport,
}

impl<D: PageDriver, S: RecordStore> Harvester<D, S> {
    pub fn new(driver: D, store: S, config: HarvestConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HarvestError::Config(e.to_string()))?;
        let extractor = DetailExtractor::new(&config.detail)?;
        let retry = RetryPolicy::from(&config.retry);
        Ok(Self {
            driver,
            store,
            config,
            extractor,
            retry,
            buffer: RecordBuffer::new(),
            report: RunReport::start(),
        })
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Open the listing, walk every filter selection, flush, shut down.
    ///
    /// The final flush and the driver shutdown happen even when the walk
    /// fails; the first error in that order is returned.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(
            run_id = %self.report.run_id,
            url = %self.config.target.listing_url,
            "run.start"
        );

        let walked = self.drive().await;
        let flushed = self.flush().await;
        let shutdown = self.driver.shutdown().await;
        if let Err(err) = &shutdown {
            warn!(error = %err, "run.shutdown_failed");
        }
        self.report.finished_at = Some(Utc::now());

        let report = &self.report;
        match &walked {
            Ok(()) => info!(
                run_id = %report.run_id,
                categories = report.categories_visited,
                sub_categories = report.sub_categories_visited,
                skipped = report.sub_categories_skipped,
                pages = report.pages_loaded,
                attempted = report.items_attempted,
                failed = report.items_failed,
                stored = report.records_stored,
                "run.finished"
            ),
            Err(err) => error!(
                run_id = %report.run_id,
                error = %err,
                stored = report.records_stored,
                unflushed = self.buffer.len(),
                "run.failed"
            ),
        }

        walked?;
        flushed?;
        shutdown?;
        Ok(self.report)
    }

    async fn drive(&mut self) -> Result<()> {
        self.driver.navigate(&self.config.target.listing_url).await?;
        self.reopen_menu().await?;
        self.walk_filters().await
    }

    /// Drain the buffer into the store, counting what was written.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        let written = self.buffer.flush(&self.store).await?;
        self.report.records_stored += written;
        Ok(())
    }
}
