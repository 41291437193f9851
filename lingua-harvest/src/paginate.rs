//! "Load more" pagination inside one filter selection.
//!
//! The only progress signal is the load-more control itself: its presence
//! and the tail of the link it points to. After each click the walker waits
//! for the item list to grow instead of sleeping a fixed interval.
use lingua_common::{HarvestError, Result};
use lingua_config::{ListingLayout, PaginationConfig};
use lingua_drivers::PageDriver;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0);";

/// How a pagination pass ended. `pages` counts successful load-more clicks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageWalk {
    /// The filter selection shows no results at all.
    NoResults { pages: u32 },
    /// The load-more link pointed at the last page.
    LastPage { pages: u32 },
    /// The load-more control could not be used; whatever is loaded stays.
    ControlFailed { pages: u32, error: HarvestError },
    /// Stopped at `pagination.max_pages`.
    PageLimit { pages: u32 },
}

impl PageWalk {
    pub fn pages(&self) -> u32 {
        match self {
            PageWalk::NoResults { pages }
            | PageWalk::LastPage { pages }
            | PageWalk::ControlFailed { pages, .. }
            | PageWalk::PageLimit { pages } => *pages,
        }
    }

    /// Whether there is a loaded result set worth harvesting.
    pub fn has_batch(&self) -> bool {
        !matches!(self, PageWalk::NoResults { .. })
    }
}

/// `href` ends with the configured last-page marker.
pub fn is_last_page(href: &str, sentinel: &str) -> bool {
    href.ends_with(sentinel)
}

pub async fn scroll_to_top<D: PageDriver>(driver: &D) -> Result<()> {
    driver.run_script(SCROLL_TO_TOP, &[]).await.map(|_| ())
}

/// Drive the load-more cursor for the current filter selection.
///
/// A failing load-more control ends the walk as
/// [`PageWalk::ControlFailed`]; other errors, and fatal ones from the
/// control, are returned to the caller.
pub async fn walk_pages<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    cfg: &PaginationConfig,
) -> Result<PageWalk> {
    scroll_to_top(driver).await?;
    let mut pages = 0u32;

    loop {
        if !has_results(driver, listing, cfg).await? {
            info!(pages, "paginate.no_results");
            return Ok(PageWalk::NoResults { pages });
        }
        if pages >= cfg.max_pages {
            warn!(pages, max_pages = cfg.max_pages, "paginate.page_limit");
            return Ok(PageWalk::PageLimit { pages });
        }

        let before = count_or(driver, listing, 0).await?;
        match click_load_more(driver, listing, cfg).await {
            Ok(()) => pages += 1,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(pages, error = %err, "paginate.control_failed");
                return Ok(PageWalk::ControlFailed { pages, error: err });
            }
        }
        wait_for_growth(driver, listing, cfg, before).await?;

        match check_cursor(driver, listing, cfg).await {
            Ok(()) => debug!(pages, "paginate.page_loaded"),
            Err(HarvestError::EndOfPages) => {
                info!(pages, "paginate.last_page");
                return Ok(PageWalk::LastPage { pages });
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(pages, error = %err, "paginate.control_failed");
                return Ok(PageWalk::ControlFailed { pages, error: err });
            }
        }
    }
}

async fn has_results<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    cfg: &PaginationConfig,
) -> Result<bool> {
    match driver.wait_until_present(&listing.results, cfg.settle()).await {
        Ok(_) => Ok(true),
        Err(HarvestError::NotFound(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

async fn click_load_more<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    cfg: &PaginationConfig,
) -> Result<()> {
    let control = driver
        .wait_until_present(&listing.load_more, cfg.load_more_timeout())
        .await?;
    driver.click(&control).await
}

/// Read where load-more points now; `Err(EndOfPages)` on the last page.
async fn check_cursor<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    cfg: &PaginationConfig,
) -> Result<()> {
    let control = driver.find(&listing.load_more).await?;
    let href = driver
        .read_attribute(&control, "href")
        .await?
        .ok_or_else(|| HarvestError::NotFound("load-more control has no href".into()))?;

    if is_last_page(&href, &cfg.last_page_sentinel) {
        return Err(HarvestError::EndOfPages);
    }
    Ok(())
}

/// Number of item links currently rendered; zero when the list is absent.
pub(crate) async fn item_count<D: PageDriver>(driver: &D, listing: &ListingLayout) -> Result<usize> {
    let lists = driver.find_all(&listing.item_list).await?;
    match lists.first() {
        Some(list) => Ok(driver.find_all_in(list, &listing.item_link).await?.len()),
        None => Ok(0),
    }
}

// Non-fatal lookup failures count as `fallback`.
async fn count_or<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    fallback: usize,
) -> Result<usize> {
    match item_count(driver, listing).await {
        Ok(n) => Ok(n),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(error = %err, "paginate.count_failed");
            Ok(fallback)
        }
    }
}

async fn wait_for_growth<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    cfg: &PaginationConfig,
    before: usize,
) -> Result<()> {
    let deadline = Instant::now() + cfg.settle();
    loop {
        if count_or(driver, listing, before).await? > before {
            return Ok(());
        }
        if Instant::now() >= deadline {
            debug!(before, "paginate.settle_elapsed");
            return Ok(());
        }
        sleep(cfg.poll()).await;
    }
}
