//! Loader for harvester configuration with YAML + environment overlays.
//!
//! Every section carries serde defaults that reproduce the production
//! target, so an empty document is a valid configuration. Precedence, lowest
//! first: inline YAML / files in the order they are attached, then
//! `LINGUA_`-prefixed environment variables (`__` separates nesting levels,
//! e.g. `LINGUA_PAGINATION__SETTLE_MS=0`). String values may reference
//! `${VAR}` placeholders; they are expanded after merging.
use config::{Config, ConfigError, Environment, File};
use lingua_common::Locator;
use lingua_store::is_identifier;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub version: Option<String>,
    pub target: TargetConfig,
    pub webdriver: WebDriverConfig,
    pub listing: ListingLayout,
    pub detail: DetailLayout,
    pub pagination: PaginationConfig,
    pub tabs: TabConfig,
    pub filters: FilterConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub listing_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.italki.com/en/teachers/english".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub headless: bool,
    /// Default bound for explicit element waits.
    pub wait_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            headless: true,
            wait_timeout_ms: 10_000,
        }
    }
}

impl WebDriverConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Locators for the listing page and its filter menu.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingLayout {
    pub language_button: Locator,
    /// One match per filter category; sub-categories live inside each.
    pub category_menu: Locator,
    /// Resolved relative to a category menu.
    pub sub_category: Locator,
    /// Present whenever the current filter yields at least one result.
    pub results: Locator,
    pub load_more: Locator,
    pub item_list: Locator,
    /// Resolved relative to the item list.
    pub item_link: Locator,
    pub banner: Locator,
}

impl Default for ListingLayout {
    fn default() -> Self {
        Self {
            language_button: Locator::xpath(r#"//*[@id="new-filter-bar"]/div[1]/div[1]"#),
            category_menu: Locator::css(
                "ul.ant-menu.ant-menu-light.ant-menu-root.ant-menu-vertical",
            ),
            sub_category: Locator::css("li"),
            results: Locator::css(".flex-1.flex.flex-col"),
            load_more: Locator::css("a.ant-btn.w-50.ant-btn-white"),
            item_list: Locator::xpath(r#"//*[@id="teacher-search-list"]/div[3]/div[1]"#),
            item_link: Locator::css("a"),
            banner: Locator::css("div.relative.py-4.bg-transparent.rounded-1"),
        }
    }
}

/// Named-field lookup table for the detail page.
///
/// Selectors are CSS, evaluated against the rendered markup. Ordinals pick
/// the n-th match (0-based) of a repeated block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetailLayout {
    pub rating: RatingLayout,
    pub stats: StatsLayout,
    pub languages: LanguagesLayout,
    pub country: CountryLayout,
    pub descriptions: DescriptionsLayout,
    pub price: PriceLayout,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatingLayout {
    pub selector: String,
}

impl Default for RatingLayout {
    fn default() -> Self {
        Self {
            selector: "div.text-warning".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsLayout {
    pub selector: String,
    pub student_count: usize,
    pub lesson_count: usize,
    pub attendance: usize,
}

impl Default for StatsLayout {
    fn default() -> Self {
        Self {
            selector: r#"div[class="mb-2 flex flex-row items-center h4 text-title"]"#.into(),
            student_count: 1,
            lesson_count: 2,
            attendance: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanguagesLayout {
    pub container: String,
    pub tag: String,
}

impl Default for LanguagesLayout {
    fn default() -> Self {
        Self {
            container: r#"div[class="flex regular-body flex-wrap space-y-1 md:space-y-0"]"#.into(),
            tag: r#"span[class="small-secondary text-gray1"]"#.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CountryLayout {
    pub container: String,
    pub prefix: String,
}

impl Default for CountryLayout {
    fn default() -> Self {
        Self {
            container: r#"div[class="flex flex-col tiny-caption text-gray2"]"#.into(),
            prefix: "From".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DescriptionsLayout {
    pub selector: String,
    pub about: usize,
    pub as_teacher: usize,
    pub teaching_style: usize,
}

impl Default for DescriptionsLayout {
    fn default() -> Self {
        Self {
            selector:
                r#"span[class="block mt-3 small-secondary text-gray2 break-words whitespace-pre-wrap"]"#
                    .into(),
            about: 0,
            as_teacher: 1,
            teaching_style: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceLayout {
    pub selector: String,
    pub pattern: String,
}

impl Default for PriceLayout {
    fn default() -> Self {
        Self {
            selector: "#lessons > div:nth-of-type(2) > div:nth-of-type(1) > div:nth-of-type(1) > div > div:nth-of-type(2) > div".into(),
            pattern: r"\d+\.\d+".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Suffix of the load-more link that marks the last page.
    pub last_page_sentinel: String,
    /// Upper bound on waiting for new items after a load-more click.
    pub settle_ms: u64,
    pub poll_ms: u64,
    pub load_more_timeout_ms: u64,
    /// Hard stop for sources that never emit the sentinel.
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            last_page_sentinel: "10".into(),
            settle_ms: 5_000,
            poll_ms: 250,
            load_more_timeout_ms: 20_000,
            max_pages: 500,
        }
    }
}

impl PaginationConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn load_more_timeout(&self) -> Duration {
        Duration::from_millis(self.load_more_timeout_ms)
    }
}

/// Which visible items a batch visits: `[len - trailing_skip - items_per_batch, len - trailing_skip)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    pub trailing_skip: usize,
    /// `None` visits every item before the trailing skip.
    pub items_per_batch: Option<usize>,
    /// Bound on waiting for the detail page to render.
    pub render_timeout_ms: u64,
    pub prepare_settle_ms: u64,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            trailing_skip: 2,
            items_per_batch: Some(2),
            render_timeout_ms: 10_000,
            prepare_settle_ms: 5_000,
        }
    }
}

impl TabConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn prepare_settle(&self) -> Duration {
        Duration::from_millis(self.prepare_settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Leading categories that duplicate later ones (the curated "popular" bucket).
    pub skip_leading_categories: usize,
    pub menu_timeout_ms: u64,
    pub reload_pause_ms: u64,
    /// Re-attempts of one sub-category after stale references.
    pub stale_retries: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_leading_categories: 1,
            menu_timeout_ms: 10_000,
            reload_pause_ms: 5_000,
            stale_retries: 2,
        }
    }
}

impl FilterConfig {
    pub fn menu_timeout(&self) -> Duration {
        Duration::from_millis(self.menu_timeout_ms)
    }

    pub fn reload_pause(&self) -> Duration {
        Duration::from_millis(self.reload_pause_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
    /// Flush the record buffer once it holds this many records.
    pub flush_every: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://lingua.db?mode=rwc".into(),
            database: "Italki".into(),
            collection: "teacher_info".into(),
            flush_every: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: String,
    pub filter: String,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".into(),
            filter: "info".into(),
            stderr: true,
        }
    }
}

impl HarvestConfig {
    /// Reject values the harvester cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Message(msg));
        if self.target.listing_url.trim().is_empty() {
            return invalid("target.listing_url must not be empty".into());
        }
        if self.pagination.last_page_sentinel.is_empty() {
            return invalid("pagination.last_page_sentinel must not be empty".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if self.store.flush_every == 0 {
            return invalid("store.flush_every must be at least 1".into());
        }
        if self.tabs.items_per_batch == Some(0) {
            return invalid("tabs.items_per_batch must be at least 1 or null".into());
        }
        if !is_identifier(&self.store.collection) {
            return invalid(format!(
                "store.collection `{}` must be an identifier ([A-Za-z_][A-Za-z0-9_]*)",
                self.store.collection
            ));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct HarvestConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: &'static str,
}

impl Default for HarvestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestConfigLoader {
    /// Start from the built-in defaults; `LINGUA_` env overrides are applied last.
    ///
    /// ```
    /// use lingua_config::HarvestConfigLoader;
    ///
    /// let config = HarvestConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.pagination.last_page_sentinel, "10");
    /// assert_eq!(config.store.collection, "teacher_info");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "LINGUA",
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely on env alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests to merge inline YAML snippets.
    ///
    /// ```
    /// use lingua_common::Locator;
    /// use lingua_config::HarvestConfigLoader;
    ///
    /// let cfg = HarvestConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// listing:
    ///   load_more: { css: "a.next" }
    /// tabs:
    ///   items_per_batch: null
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.listing.load_more, Locator::css("a.next"));
    /// assert_eq!(cfg.tabs.items_per_batch, None);
    /// assert_eq!(cfg.tabs.trailing_skip, 2);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, deserialize and validate.
    ///
    /// ```
    /// use lingua_config::HarvestConfigLoader;
    ///
    /// unsafe { std::env::set_var("LINGUA_DOC_DB", "sqlite::memory:"); }
    ///
    /// let config = HarvestConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// store:
    ///   url: "${LINGUA_DOC_DB}"
    ///   collection: "teacher_info"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.store.url, "sqlite::memory:");
    ///
    /// unsafe { std::env::remove_var("LINGUA_DOC_DB"); }
    /// ```
    pub fn load(self) -> Result<HarvestConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(self.env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        // Env overrides stay text until the target field asks for a number,
        // so `LINGUA_PAGINATION__LAST_PAGE_SENTINEL=010` keeps its digits.
        let typed: HarvestConfig = Config::try_from(&v)?.try_deserialize()?;
        typed.validate()?;
        Ok(typed)
    }
}
