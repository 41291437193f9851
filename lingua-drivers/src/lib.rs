//! Driver layer for browser automation.
//!
//! The harvester never talks to a browser directly; it goes through the
//! [`PageDriver`] trait so the traversal engine can be exercised against a
//! scripted listing in tests and against a real WebDriver session in
//! production.
//!
//! - [`PageDriver`]: the interaction surface (navigation, lookups, clicks,
//!   browsing contexts, scripts)
//! - [`ContextHandle`]: opaque id of one tab/window in the session
//! - [`browser::session::WebDriverSession`]: `fantoccini` implementation
pub mod browser;

use async_trait::async_trait;
use lingua_common::{Locator, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of one browsing context (tab or window).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextHandle(pub String);

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContextHandle {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Interaction surface over one automated browser session.
///
/// Element handles are only valid for the view they were found in; after
/// any navigation or reload they may fail with
/// [`HarvestError::Stale`](lingua_common::HarvestError::Stale) and must be
/// resolved again.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Clone + fmt::Debug + Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the active context.
    async fn refresh(&self) -> Result<()>;

    /// Wait until `locator` matches, bounded by `timeout`.
    async fn wait_until_present(&self, locator: &Locator, timeout: Duration)
        -> Result<Self::Element>;

    async fn find(&self, locator: &Locator) -> Result<Self::Element>;

    /// All matches in document order; an empty vector is not an error.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>>;

    /// All matches below `parent`, in document order.
    async fn find_all_in(
        &self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Open the element's target in a new browsing context without
    /// moving focus, returning the new context.
    async fn modified_click(&self, element: &Self::Element) -> Result<ContextHandle>;

    async fn current_context(&self) -> Result<ContextHandle>;

    async fn switch_context(&self, handle: &ContextHandle) -> Result<()>;

    /// Close the active context. Focus must be switched explicitly afterwards.
    async fn close_context(&self) -> Result<()>;

    async fn list_context_handles(&self) -> Result<Vec<ContextHandle>>;

    async fn run_script(&self, script: &str, args: &[Self::Element]) -> Result<serde_json::Value>;

    async fn read_attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Rendered markup of the active context.
    async fn page_source(&self) -> Result<String>;

    /// End the session. The driver must not be used afterwards.
    async fn shutdown(&self) -> Result<()>;
}
