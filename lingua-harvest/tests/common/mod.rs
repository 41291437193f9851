#![allow(dead_code)]
//! Scripted in-memory listing implementing `PageDriver`.
//!
//! Elements carry the view epoch they were found in; any navigation, reload
//! or filter selection bumps the epoch, and using an older element fails with
//! `HarvestError::Stale` like a real browser would.
use async_trait::async_trait;
use lingua_common::observability::{LogConfig, init_logging};
use lingua_common::{HarvestError, Locator, Result};
use lingua_config::{DetailLayout, HarvestConfig, ListingLayout};
use lingua_drivers::{ContextHandle, PageDriver};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const MAIN: &str = "main";
const LAST_PAGE_HREF: &str = "https://www.italki.com/en/teachers/english?page=10";
const NEXT_PAGE_HREF: &str = "https://www.italki.com/en/teachers/english?page=next";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    LanguageButton,
    CategoryMenu(usize),
    SubCategory(usize, usize),
    Results,
    LoadMore,
    ItemList,
    ItemLink(usize),
    Banner,
    DetailReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub kind: Kind,
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    LanguageButton,
    CategoryMenu,
    SubCategory,
    Results,
    LoadMore,
    ItemList,
    ItemLink,
    Banner,
    DetailReady,
}

/// One sub-category's listing: `pages` pages of `items_per_page` items.
#[derive(Debug, Clone)]
pub struct SubListing {
    pub items_per_page: usize,
    pub pages: u32,
    /// The load-more link points at the last page once it is loaded; when
    /// false the control disappears instead.
    pub sentinel_on_last: bool,
    /// Every detail page lacks most fields.
    pub broken: bool,
    /// Per-item detail markup; `None` never renders.
    pub details: HashMap<usize, Option<String>>,
}

impl SubListing {
    pub fn new(items_per_page: usize, pages: u32) -> Self {
        Self {
            items_per_page,
            pages,
            sentinel_on_last: true,
            broken: false,
            details: HashMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 1)
    }

    pub fn without_sentinel(mut self) -> Self {
        self.sentinel_on_last = false;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn with_detail(mut self, item: usize, html: Option<String>) -> Self {
        self.details.insert(item, html);
        self
    }

    fn detail(&self, item: usize) -> Option<String> {
        if let Some(html) = self.details.get(&item) {
            return html.clone();
        }
        if self.broken {
            return Some(incomplete_detail_html());
        }
        Some(detail_html(item))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub categories: Vec<Vec<SubListing>>,
    /// Language-button lookups that fail before the menu can be opened.
    pub menu_failures: u32,
    /// Sub-categories whose next `n` clicks fail with a stale reference.
    pub stale_clicks: HashMap<(usize, usize), u32>,
    pub banner: bool,
    /// The language button disappears for good once this many
    /// sub-categories have been visited.
    pub menu_gone_after_visits: Option<usize>,
    /// Modified clicks that open and focus a tab, then fail.
    pub broken_modified_clicks: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub navigations: u32,
    pub refreshes: u32,
    pub load_more_clicks: u32,
    pub modified_clicks: u32,
    pub banner_removals: u32,
    pub open_contexts: usize,
    pub max_open_contexts: usize,
    pub visited: Vec<(usize, usize)>,
    pub active: Option<String>,
    pub shutdown: bool,
}

#[derive(Debug, Default)]
struct State {
    epoch: u64,
    menu_open: bool,
    selected: Option<(usize, usize)>,
    page: u32,
    contexts: Vec<String>,
    active: Option<String>,
    next_tab: u32,
    tabs: HashMap<String, ((usize, usize), usize)>,
    banner: bool,
    menu_failures: u32,
    stale_clicks: HashMap<(usize, usize), u32>,
    broken_modified_clicks: u32,
    counters: Counters,
}

#[derive(Clone)]
pub struct FakeListing {
    scenario: Arc<Scenario>,
    listing: ListingLayout,
    ready: Locator,
    state: Arc<Mutex<State>>,
}

impl FakeListing {
    pub fn new(scenario: Scenario) -> Self {
        let state = State {
            contexts: vec![MAIN.to_string()],
            active: Some(MAIN.to_string()),
            banner: scenario.banner,
            menu_failures: scenario.menu_failures,
            stale_clicks: scenario.stale_clicks.clone(),
            broken_modified_clicks: scenario.broken_modified_clicks,
            ..State::default()
        };
        Self {
            scenario: Arc::new(scenario),
            listing: ListingLayout::default(),
            ready: Locator::css(DetailLayout::default().rating.selector),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Jump straight to a selected sub-category with its first page loaded.
    pub fn select(&self, category: usize, sub_category: usize) {
        let mut state = self.lock();
        state.selected = Some((category, sub_category));
        state.page = 1;
        state.epoch += 1;
    }

    pub fn counters(&self) -> Counters {
        let state = self.lock();
        let mut counters = state.counters.clone();
        counters.open_contexts = state.contexts.len();
        counters.active = state.active.clone();
        counters
    }

    pub fn listing(&self) -> &ListingLayout {
        &self.listing
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn target(&self, locator: &Locator) -> Option<Target> {
        let l = &self.listing;
        let table = [
            (&l.language_button, Target::LanguageButton),
            (&l.category_menu, Target::CategoryMenu),
            (&l.sub_category, Target::SubCategory),
            (&l.results, Target::Results),
            (&l.load_more, Target::LoadMore),
            (&l.item_list, Target::ItemList),
            (&l.item_link, Target::ItemLink),
            (&l.banner, Target::Banner),
            (&self.ready, Target::DetailReady),
        ];
        table
            .into_iter()
            .find(|(candidate, _)| *candidate == locator)
            .map(|(_, target)| target)
    }

    fn sub_listing(&self, state: &State) -> Option<&SubListing> {
        let (c, j) = state.selected?;
        self.scenario.categories.get(c)?.get(j)
    }

    fn on_main(state: &State) -> bool {
        state.active.as_deref() == Some(MAIN)
    }

    fn visible_items(&self, state: &State) -> usize {
        self.sub_listing(state)
            .map(|s| s.items_per_page * state.page as usize)
            .unwrap_or(0)
    }

    fn lookup(&self, state: &State, target: Target) -> Vec<FakeElement> {
        let epoch = state.epoch;
        let one = |kind| vec![FakeElement { kind, epoch }];
        let main = Self::on_main(state);
        let current = self.sub_listing(state);

        match target {
            Target::LanguageButton if main => one(Kind::LanguageButton),
            Target::CategoryMenu if main && state.menu_open => (0..self.scenario.categories.len())
                .map(|c| FakeElement {
                    kind: Kind::CategoryMenu(c),
                    epoch,
                })
                .collect(),
            Target::Results if main && current.is_some_and(|s| s.items_per_page > 0) => {
                one(Kind::Results)
            }
            Target::LoadMore
                if main
                    && current.is_some_and(|s| state.page < s.pages || s.sentinel_on_last) =>
            {
                one(Kind::LoadMore)
            }
            Target::ItemList if main && current.is_some_and(|s| s.items_per_page > 0) => {
                one(Kind::ItemList)
            }
            Target::Banner if main && state.banner => one(Kind::Banner),
            Target::DetailReady => match self.tab_detail(state) {
                Some(Some(_)) => one(Kind::DetailReady),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Detail markup for the active tab: `None` when not on a tab.
    fn tab_detail(&self, state: &State) -> Option<Option<String>> {
        let handle = state.active.as_ref()?;
        let ((c, j), item) = *state.tabs.get(handle)?;
        let sub = self.scenario.categories.get(c)?.get(j)?;
        Some(sub.detail(item))
    }

    fn present(&self, locator: &Locator) -> Result<FakeElement> {
        let mut state = self.lock();
        let target = self
            .target(locator)
            .ok_or_else(|| HarvestError::NotFound(format!("unknown locator {locator}")))?;
        if target == Target::LanguageButton && state.menu_failures > 0 {
            state.menu_failures -= 1;
            return Err(HarvestError::NotFound(locator.to_string()));
        }
        if target == Target::LanguageButton
            && self
                .scenario
                .menu_gone_after_visits
                .is_some_and(|n| state.counters.visited.len() >= n)
        {
            return Err(HarvestError::NotFound(locator.to_string()));
        }
        self.lookup(&state, target)
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::NotFound(locator.to_string()))
    }

    fn check(state: &State, element: &FakeElement) -> Result<()> {
        if element.epoch != state.epoch {
            return Err(HarvestError::Stale(format!("{:?}", element.kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakeListing {
    type Element = FakeElement;

    async fn navigate(&self, _url: &str) -> Result<()> {
        let mut state = self.lock();
        state.counters.navigations += 1;
        state.epoch += 1;
        state.menu_open = false;
        state.selected = None;
        state.page = 0;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let mut state = self.lock();
        state.counters.refreshes += 1;
        state.epoch += 1;
        state.menu_open = false;
        state.page = if state.selected.is_some() { 1 } else { 0 };
        Ok(())
    }

    async fn wait_until_present(&self, locator: &Locator, _timeout: Duration) -> Result<FakeElement> {
        self.present(locator)
    }

    async fn find(&self, locator: &Locator) -> Result<FakeElement> {
        self.present(locator)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>> {
        let state = self.lock();
        Ok(match self.target(locator) {
            Some(target) => self.lookup(&state, target),
            None => Vec::new(),
        })
    }

    async fn find_all_in(&self, parent: &FakeElement, locator: &Locator) -> Result<Vec<FakeElement>> {
        let state = self.lock();
        Self::check(&state, parent)?;
        let epoch = state.epoch;
        let found = match (parent.kind, self.target(locator)) {
            (Kind::CategoryMenu(c), Some(Target::SubCategory)) => {
                let subs = self.scenario.categories.get(c).map_or(0, Vec::len);
                (0..subs)
                    .map(|j| FakeElement {
                        kind: Kind::SubCategory(c, j),
                        epoch,
                    })
                    .collect()
            }
            (Kind::ItemList, Some(Target::ItemLink)) => (0..self.visible_items(&state))
                .map(|i| FakeElement {
                    kind: Kind::ItemLink(i),
                    epoch,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(found)
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, element)?;
        match element.kind {
            Kind::LanguageButton => state.menu_open = true,
            Kind::SubCategory(c, j) => {
                if let Some(left) = state.stale_clicks.get_mut(&(c, j)) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(HarvestError::Stale(format!("sub-category {c}/{j}")));
                    }
                }
                state.selected = Some((c, j));
                state.page = 1;
                state.menu_open = false;
                state.epoch += 1;
                state.counters.visited.push((c, j));
            }
            Kind::LoadMore => {
                state.counters.load_more_clicks += 1;
                let pages = self.sub_listing(&state).map_or(0, |s| s.pages);
                if state.page < pages {
                    state.page += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn modified_click(&self, element: &FakeElement) -> Result<ContextHandle> {
        let mut state = self.lock();
        Self::check(&state, element)?;
        let Kind::ItemLink(item) = element.kind else {
            return Err(HarvestError::NotFound("modified click on a non-link".into()));
        };
        let selected = state
            .selected
            .ok_or_else(|| HarvestError::NotFound("no listing selected".into()))?;

        state.next_tab += 1;
        let handle = format!("tab-{}", state.next_tab);
        state.contexts.push(handle.clone());
        state.tabs.insert(handle.clone(), (selected, item));
        state.counters.modified_clicks += 1;
        state.counters.max_open_contexts = state.counters.max_open_contexts.max(state.contexts.len());
        if state.broken_modified_clicks > 0 {
            state.broken_modified_clicks -= 1;
            state.active = Some(handle);
            return Err(HarvestError::Transient("switch back after modified click".into()));
        }
        Ok(ContextHandle(handle))
    }

    async fn current_context(&self) -> Result<ContextHandle> {
        let state = self.lock();
        state
            .active
            .clone()
            .map(ContextHandle)
            .ok_or_else(|| HarvestError::Transient("no active context".into()))
    }

    async fn switch_context(&self, handle: &ContextHandle) -> Result<()> {
        let mut state = self.lock();
        if !state.contexts.contains(&handle.0) {
            return Err(HarvestError::Transient(format!("no such window {handle}")));
        }
        state.active = Some(handle.0.clone());
        Ok(())
    }

    async fn close_context(&self) -> Result<()> {
        let mut state = self.lock();
        let active = state
            .active
            .take()
            .ok_or_else(|| HarvestError::Transient("no active context".into()))?;
        state.contexts.retain(|h| *h != active);
        Ok(())
    }

    async fn list_context_handles(&self) -> Result<Vec<ContextHandle>> {
        let state = self.lock();
        Ok(state.contexts.iter().cloned().map(ContextHandle).collect())
    }

    async fn run_script(&self, _script: &str, args: &[FakeElement]) -> Result<serde_json::Value> {
        let mut state = self.lock();
        for arg in args {
            Self::check(&state, arg)?;
            if arg.kind == Kind::Banner {
                state.banner = false;
                state.counters.banner_removals += 1;
            }
        }
        Ok(serde_json::Value::Null)
    }

    async fn read_attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        Self::check(&state, element)?;
        if element.kind != Kind::LoadMore || name != "href" {
            return Ok(None);
        }
        let href = match self.sub_listing(&state) {
            Some(s) if s.sentinel_on_last && state.page >= s.pages => LAST_PAGE_HREF,
            _ => NEXT_PAGE_HREF,
        };
        Ok(Some(href.to_string()))
    }

    async fn page_source(&self) -> Result<String> {
        let state = self.lock();
        Ok(match self.tab_detail(&state) {
            Some(Some(html)) => html,
            _ => "<html><body></body></html>".to_string(),
        })
    }

    async fn shutdown(&self) -> Result<()> {
        self.lock().counters.shutdown = true;
        Ok(())
    }
}

/// Complete profile markup for item `n`.
pub fn detail_html(n: usize) -> String {
    format!(
        r#"<html><body>
        <div class="text-warning">4.{rating}</div>
        <div class="mb-2 flex flex-row items-center h4 text-title">Professional</div>
        <div class="mb-2 flex flex-row items-center h4 text-title">{students}</div>
        <div class="mb-2 flex flex-row items-center h4 text-title">{lessons}</div>
        <div class="mb-2 flex flex-row items-center h4 text-title">99%</div>
        <div class="flex regular-body flex-wrap space-y-1 md:space-y-0">
          <span class="small-secondary text-gray1">English</span>
          <span class="small-secondary text-gray1">German</span>
        </div>
        <div class="flex flex-col tiny-caption text-gray2"><span>From Ireland</span></div>
        <span class="block mt-3 small-secondary text-gray2 break-words whitespace-pre-wrap">Teacher {n} about</span>
        <span class="block mt-3 small-secondary text-gray2 break-words whitespace-pre-wrap">Teacher {n} as a teacher</span>
        <span class="block mt-3 small-secondary text-gray2 break-words whitespace-pre-wrap">Teacher {n} style</span>
        <div id="lessons">
          <div>Lessons</div>
          <div><div><div><div>
            <div>Trial lesson</div>
            <div><div>USD {n}.50</div></div>
          </div></div></div></div>
        </div>
        </body></html>"#,
        rating = n % 10,
        students = 100 + n,
        lessons = 1000 + n,
    )
}

/// Profile markup where only the rating rendered.
pub fn incomplete_detail_html() -> String {
    r#"<html><body><div class="text-warning">5.0</div></body></html>"#.to_string()
}

/// Production layout with every wait and pause collapsed.
pub fn fast_config() -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.pagination.settle_ms = 0;
    config.pagination.poll_ms = 1;
    config.pagination.load_more_timeout_ms = 0;
    config.tabs.render_timeout_ms = 0;
    config.tabs.prepare_settle_ms = 0;
    config.filters.menu_timeout_ms = 0;
    config.filters.reload_pause_ms = 0;
    config.retry.base_backoff_ms = 0;
    config.retry.max_backoff_ms = 0;
    config
}

pub fn init_test_tracing() {
    let _ = init_logging(LogConfig {
        app_name: "lingua-tests".into(),
        log_dir: Some(std::env::temp_dir().join("lingua-tests")),
        emit_stderr: false,
        ..LogConfig::default()
    });
}
