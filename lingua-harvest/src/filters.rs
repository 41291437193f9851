//! Two-level filter walk: categories, then the sub-categories inside each.
//!
//! Filter nodes are never held across a navigation. A node is addressed by
//! its [`FilterPath`] and looked up again from the live menu right before it
//! is used; the counts bounding both loops are re-read on every iteration.
use crate::paginate::{PageWalk, walk_pages};
use crate::retry::{guarded, reload};
use crate::run::Harvester;
use crate::tabs::open_item_tabs;
use lingua_common::{HarvestError, Result};
use lingua_config::{FilterConfig, ListingLayout};
use lingua_drivers::PageDriver;
use lingua_store::RecordStore;
use std::fmt;
use tracing::{debug, info, warn};

/// Position of one sub-category in the filter menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterPath {
    pub category: usize,
    pub sub_category: usize,
}

impl fmt::Display for FilterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.sub_category)
    }
}

/// Click the language filter button and wait for the category menus.
pub async fn open_filter_menu<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    filters: &FilterConfig,
) -> Result<Vec<D::Element>> {
    let button = driver
        .wait_until_present(&listing.language_button, filters.menu_timeout())
        .await?;
    driver.click(&button).await?;
    driver
        .wait_until_present(&listing.category_menu, filters.menu_timeout())
        .await?;
    driver.find_all(&listing.category_menu).await
}

/// Sub-category nodes of category `category`, read from the live menu.
pub async fn resolve_sub_categories<D: PageDriver>(
    driver: &D,
    listing: &ListingLayout,
    category: usize,
) -> Result<Vec<D::Element>> {
    let menus = driver.find_all(&listing.category_menu).await?;
    let menu = menus
        .get(category)
        .ok_or_else(|| HarvestError::NotFound(format!("category menu {category}")))?;
    driver.find_all_in(menu, &listing.sub_category).await
}

impl<D: PageDriver, S: RecordStore> Harvester<D, S> {
    /// Visit every sub-category of every category after the curated ones.
    pub(crate) async fn walk_filters(&mut self) -> Result<()> {
        let mut category = self.config.filters.skip_leading_categories;
        loop {
            let count = self.driver.find_all(&self.config.listing.category_menu).await?.len();
            if category >= count {
                break;
            }
            self.walk_category(category).await?;
            category += 1;
        }
        info!(
            categories = self.report.categories_visited,
            sub_categories = self.report.sub_categories_visited,
            "filters.done"
        );
        Ok(())
    }

    async fn walk_category(&mut self, category: usize) -> Result<()> {
        self.report.categories_visited += 1;
        let mut sub_category = 0;
        loop {
            let count = self.sub_category_count(category).await?;
            if sub_category >= count {
                break;
            }
            self.visit_with_recovery(FilterPath {
                category,
                sub_category,
            })
            .await?;
            sub_category += 1;
        }
        debug!(category, "filters.category.done");
        Ok(())
    }

    async fn sub_category_count(&self, category: usize) -> Result<usize> {
        let listing = &self.config.listing;
        match resolve_sub_categories(&self.driver, listing, category).await {
            Ok(nodes) => Ok(nodes.len()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(category, error = %err, "filters.resolve_failed");
                self.recover_from_reload().await?;
                Ok(resolve_sub_categories(&self.driver, listing, category).await?.len())
            }
        }
    }

    /// Visit one sub-category. A stale failure recovers and re-attempts the
    /// same path up to `filters.stale_retries` times; any other non-fatal
    /// failure recovers and skips the path.
    async fn visit_with_recovery(&mut self, path: FilterPath) -> Result<()> {
        let mut stale_retries = 0;
        loop {
            match self.visit(path).await {
                Ok(()) => {
                    self.report.sub_categories_visited += 1;
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if err.is_stale() && stale_retries < self.config.filters.stale_retries => {
                    stale_retries += 1;
                    warn!(%path, attempt = stale_retries, error = %err, "filters.visit.stale");
                    self.recover_from_reload().await?;
                }
                Err(err) => {
                    warn!(%path, error = %err, "filters.visit.skipped");
                    self.report.sub_categories_skipped += 1;
                    self.recover_from_reload().await?;
                    return Ok(());
                }
            }
        }
    }

    async fn visit(&mut self, path: FilterPath) -> Result<()> {
        info!(%path, "filters.visit.start");
        let nodes = resolve_sub_categories(&self.driver, &self.config.listing, path.category).await?;
        let node = nodes
            .get(path.sub_category)
            .ok_or_else(|| HarvestError::NotFound(format!("sub-category {path}")))?;
        self.driver.click(node).await?;

        let walk = walk_pages(&self.driver, &self.config.listing, &self.config.pagination).await?;
        self.report.pages_loaded += walk.pages();
        if let PageWalk::ControlFailed { pages, error } = &walk {
            info!(%path, pages, error = %error, "filters.visit.partial_listing");
        }
        if walk.has_batch() {
            self.harvest_batch().await?;
        }

        self.reopen_menu().await?;
        debug!(%path, pages = walk.pages(), "filters.visit.done");
        Ok(())
    }

    /// Run the item tab opener over the loaded listing, then flush once
    /// enough records are pending.
    async fn harvest_batch(&mut self) -> Result<()> {
        let outcome = open_item_tabs(
            &self.driver,
            &self.config.listing,
            &self.config.tabs,
            &self.extractor,
            &mut self.buffer,
        )
        .await?;
        self.report.items_attempted += outcome.attempted as u64;
        self.report.items_failed += outcome.failed as u64;

        if self.buffer.len() >= self.config.store.flush_every {
            if let Err(err) = self.flush().await {
                if !matches!(err, HarvestError::Store(_)) {
                    return Err(err);
                }
                warn!(pending = self.buffer.len(), error = %err, "filters.flush_deferred");
            }
        }
        Ok(())
    }

    /// Open the filter menu under the retry guard. Running out of attempts
    /// is fatal: without the menu no further selection can be made.
    pub(crate) async fn reopen_menu(&self) -> Result<()> {
        let driver = &self.driver;
        let listing = &self.config.listing;
        let filters = &self.config.filters;
        guarded(driver, &self.retry, "filters.open_menu", || {
            open_filter_menu(driver, listing, filters)
        })
        .await
        .map(|_| ())
        .map_err(|err| match err {
            HarvestError::Fatal(_) => err,
            other => HarvestError::Fatal(format!("filter menu unavailable: {other}")),
        })
    }

    /// Reload, let the page settle, and reopen the filter menu.
    async fn recover_from_reload(&self) -> Result<()> {
        warn!("filters.reload");
        reload(&self.driver).await?;
        tokio::time::sleep(self.config.filters.reload_pause()).await;
        self.reopen_menu().await
    }
}
