//! Per-item detail extraction in throwaway browsing contexts.
//!
//! Each selected item link is opened with a modified click, extracted in its
//! own context, and the context is closed again whatever the extraction
//! outcome. Focus always returns to the listing context.
use crate::buffer::RecordBuffer;
use crate::extract::DetailExtractor;
use crate::paginate::scroll_to_top;
use lingua_common::{HarvestError, Result, TeacherRecord};
use lingua_config::{ListingLayout, TabConfig};
use lingua_drivers::{ContextHandle, PageDriver};
use std::ops::Range;
use tracing::{debug, info, warn};

const REMOVE_ELEMENT: &str = "arguments[0].remove();";

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Item links rendered when the batch was taken.
    pub visible: usize,
    pub attempted: usize,
    pub extracted: usize,
    pub failed: usize,
}

/// Indices of the items to open out of `len` visible ones: the last
/// `items_per_batch` before the trailing `trailing_skip`, or every item
/// before the skip when no batch size is set.
pub fn batch_window(len: usize, tabs: &TabConfig) -> Range<usize> {
    let end = len.saturating_sub(tabs.trailing_skip);
    let start = match tabs.items_per_batch {
        Some(n) => end.saturating_sub(n),
        None => 0,
    };
    start..end
}

/// Bring the listing into a clickable state: scrolled to the top, item list
/// rendered, instant-book banner removed when present.
pub async fn prepare_listing<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    tabs: &TabConfig,
) -> Result<D::Element> {
    scroll_to_top(driver).await?;
    let list = driver
        .wait_until_present(&listing.item_list, tabs.prepare_settle())
        .await?;

    match driver.find(&listing.banner).await {
        Ok(banner) => {
            driver.run_script(REMOVE_ELEMENT, &[banner]).await?;
            debug!("tabs.banner_removed");
        }
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => debug!(error = %err, "tabs.banner_absent"),
    }
    Ok(list)
}

/// Open the selected window of the visible item links one by one and push
/// every successful extraction into `buffer`.
///
/// A failed item is logged and counted; only fatal errors end the batch.
pub async fn open_item_tabs<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    tabs: &TabConfig,
    extractor: &DetailExtractor,
    buffer: &mut RecordBuffer,
) -> Result<BatchOutcome> {
    let list = prepare_listing(driver, listing, tabs).await?;
    let links = driver.find_all_in(&list, &listing.item_link).await?;

    let window = batch_window(links.len(), tabs);
    let mut outcome = BatchOutcome {
        visible: links.len(),
        ..BatchOutcome::default()
    };
    info!(visible = links.len(), start = window.start, end = window.end, "tabs.batch.start");

    for index in window {
        outcome.attempted += 1;
        match open_item_tab(driver, &links[index], tabs, extractor).await {
            Ok(record) => {
                buffer.push(record);
                outcome.extracted += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(index, error = %err, "tabs.extract.failed");
                outcome.failed += 1;
            }
        }
    }

    info!(
        attempted = outcome.attempted,
        extracted = outcome.extracted,
        failed = outcome.failed,
        "tabs.batch.done"
    );
    Ok(outcome)
}

/// Open one item in a new context, extract it, then close the context and
/// return to the one that was active before.
///
/// Teardown runs whether or not extraction succeeded; a teardown failure is
/// fatal because the session's active context is no longer known.
pub async fn open_item_tab<D: PageDriver>(
    driver: &D,
    link: &D::Element,
    tabs: &TabConfig,
    extractor: &DetailExtractor,
) -> Result<TeacherRecord> {
    let origin = driver.current_context().await?;
    let before = driver.list_context_handles().await?;

    let handle = match driver.modified_click(link).await {
        Ok(handle) => handle,
        Err(err) => {
            discard_new_contexts(driver, &before, &origin).await?;
            return Err(err);
        }
    };
    let extracted = extract_in(driver, &handle, tabs, extractor).await;
    close_and_return(driver, &handle, &origin).await?;

    match driver.list_context_handles().await {
        Ok(after) if after.len() != before.len() => {
            warn!(before = before.len(), after = after.len(), "tabs.context_leak");
        }
        Ok(_) => {}
        Err(err) => debug!(error = %err, "tabs.context_count_failed"),
    }
    extracted
}

async fn extract_in<D: PageDriver>(
    driver: &D,
    handle: &ContextHandle,
    tabs: &TabConfig,
    extractor: &DetailExtractor,
) -> Result<TeacherRecord> {
    driver.switch_context(handle).await?;
    driver
        .wait_until_present(extractor.ready_locator(), tabs.render_timeout())
        .await?;
    let html = driver.page_source().await?;
    extractor.extract(&html)
}

async fn close_and_return<D: PageDriver>(
    driver: &D,
    handle: &ContextHandle,
    origin: &ContextHandle,
) -> Result<()> {
    let teardown = async {
        let open = driver.list_context_handles().await?;
        if open.contains(handle) {
            driver.switch_context(handle).await?;
            driver.close_context().await?;
        }
        driver.switch_context(origin).await
    };
    teardown
        .await
        .map_err(|e| HarvestError::Fatal(format!("tab teardown for {handle}: {e}")))
}

// A click that failed part way may still have opened a context.
async fn discard_new_contexts<D: PageDriver>(
    driver: &D,
    before: &[ContextHandle],
    origin: &ContextHandle,
) -> Result<()> {
    let teardown = async {
        let open = driver.list_context_handles().await?;
        for stray in open.iter().filter(|h| !before.contains(h)) {
            debug!(%stray, "tabs.stray_context");
            driver.switch_context(stray).await?;
            driver.close_context().await?;
        }
        driver.switch_context(origin).await
    };
    teardown
        .await
        .map_err(|e| HarvestError::Fatal(format!("tab teardown after failed click: {e}")))
}
