use crate::browser::errors::{classify, to_fantoccini};
use crate::{ContextHandle, PageDriver};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder};
use lingua_common::{HarvestError, Locator, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use webdriver::capabilities::Capabilities;

/// Chrome switches applied to every session.
const BASE_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--window-size=1366,900",
];

/// A `fantoccini` WebDriver session implementing [`PageDriver`].
pub struct WebDriverSession {
    client: Client,
    wait_timeout: Duration,
}

impl WebDriverSession {
    /// Connect to a running WebDriver service (Chromedriver by default on
    /// `http://localhost:9515`).
    pub async fn connect(endpoint: &str, headless: bool, wait_timeout: Duration) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();

        let mut args: Vec<Value> = BASE_ARGS.iter().map(|a| json!(a)).collect();
        if headless {
            args.push(json!("--headless"));
            args.push(json!("--disable-gpu"));
        }
        chrome_opts.insert("args".to_string(), json!(args));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(endpoint)
            .await
            .map_err(|e| HarvestError::Fatal(format!("webdriver connect {endpoint}: {e}")))?;

        info!(target: "browser.session", %endpoint, headless, "webdriver session opened");
        Ok(Self {
            client,
            wait_timeout,
        })
    }

    /// The default bound for explicit waits.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    fn window_handle(handle: &ContextHandle) -> Result<WindowHandle> {
        WindowHandle::try_from(handle.0.clone())
            .map_err(|e| HarvestError::NotFound(format!("window handle {handle}: {e}")))
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(target: "browser.session", %url, "navigate");
        self.client
            .goto(url)
            .await
            .map_err(|e| classify(&format!("navigate {url}"), e))
    }

    async fn refresh(&self) -> Result<()> {
        self.client.refresh().await.map_err(|e| classify("refresh", e))
    }

    async fn wait_until_present(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(to_fantoccini(locator))
            .await
            .map_err(|e| classify(&format!("wait {locator}"), e))
    }

    async fn find(&self, locator: &Locator) -> Result<Element> {
        self.client
            .find(to_fantoccini(locator))
            .await
            .map_err(|e| classify(&format!("find {locator}"), e))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        self.client
            .find_all(to_fantoccini(locator))
            .await
            .map_err(|e| classify(&format!("find_all {locator}"), e))
    }

    async fn find_all_in(&self, parent: &Element, locator: &Locator) -> Result<Vec<Element>> {
        parent
            .find_all(to_fantoccini(locator))
            .await
            .map_err(|e| classify(&format!("find_all_in {locator}"), e))
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await.map_err(|e| classify("click", e))
    }

    /// Emulates a ctrl-click: the link target opens in a fresh tab while
    /// focus stays on the current one. A non-fatal load failure still
    /// returns the handle so the tab can be torn down.
    async fn modified_click(&self, element: &Element) -> Result<ContextHandle> {
        let href = element
            .attr("href")
            .await
            .map_err(|e| classify("modified_click href", e))?
            .ok_or_else(|| HarvestError::NotFound("modified_click: element has no href".into()))?;

        let origin = self.client.window().await.map_err(|e| classify("window", e))?;
        let opened = self
            .client
            .new_window(true)
            .await
            .map_err(|e| classify("new_window", e))?;
        let handle = ContextHandle(String::from(opened.handle.clone()));

        self.client
            .switch_to_window(opened.handle)
            .await
            .map_err(|e| classify("switch_to_window", e))?;
        let loaded = self.client.goto(&href).await;
        self.client
            .switch_to_window(origin)
            .await
            .map_err(|e| classify("switch_to_window", e))?;

        // The tab exists even when its page failed to load; the caller closes it.
        if let Err(e) = loaded {
            let err = classify(&format!("navigate {href}"), e);
            if err.is_fatal() {
                return Err(err);
            }
            warn!(target: "browser.session", %handle, error = %err, "tab load failed");
        }
        Ok(handle)
    }

    async fn current_context(&self) -> Result<ContextHandle> {
        let handle = self.client.window().await.map_err(|e| classify("window", e))?;
        Ok(ContextHandle(String::from(handle)))
    }

    async fn switch_context(&self, handle: &ContextHandle) -> Result<()> {
        let window = Self::window_handle(handle)?;
        self.client
            .switch_to_window(window)
            .await
            .map_err(|e| classify(&format!("switch_to_window {handle}"), e))
    }

    async fn close_context(&self) -> Result<()> {
        self.client
            .close_window()
            .await
            .map_err(|e| classify("close_window", e))
    }

    async fn list_context_handles(&self) -> Result<Vec<ContextHandle>> {
        let windows = self.client.windows().await.map_err(|e| classify("windows", e))?;
        Ok(windows
            .into_iter()
            .map(|w| ContextHandle(String::from(w)))
            .collect())
    }

    async fn run_script(&self, script: &str, args: &[Element]) -> Result<Value> {
        let args = args
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| HarvestError::Fatal(format!("script argument encoding: {e}")))?;
        self.client
            .execute(script, args)
            .await
            .map_err(|e| classify("execute", e))
    }

    async fn read_attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attr(name)
            .await
            .map_err(|e| classify(&format!("attr {name}"), e))
    }

    async fn page_source(&self) -> Result<String> {
        self.client.source().await.map_err(|e| classify("source", e))
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| classify("close session", e))?;
        info!(target: "browser.session", "webdriver session closed");
        Ok(())
    }
}
