//! Browser session seam.
//!
//! [`PageDriver`] is the small set of page operations the scenarios need.
//! [`CdpDriver`] implements it over the Chrome DevTools Protocol with
//! chromiumoxide, evaluating every element operation as a script against a
//! [`Locator`] query. [`MockDriver`] is a scripted page for tests.

use crate::locator::Locator;
use crate::result::{VisregError, VisregResult};
use async_trait::async_trait;
use image::{GrayImage, Luma};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default navigation timeout
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default window size
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1366, 900);

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Enable the Chromium sandbox
    pub sandbox: bool,
    /// Path to the Chromium executable
    pub chromium_path: Option<PathBuf>,
    /// Window width and height
    pub window_size: (u32, u32),
    /// Per-request timeout, bounds navigation
    pub navigation_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            window_size: DEFAULT_WINDOW_SIZE,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

impl DriverConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox (containers)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the Chromium executable
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the window size
    #[must_use]
    pub const fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }
}

/// Page operations used by scenarios
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL
    async fn goto(&mut self, url: &str) -> VisregResult<()>;

    /// Whether the locator matches an element
    async fn exists(&self, locator: &Locator) -> VisregResult<bool>;

    /// Whether the element is displayed with a non-empty box
    async fn is_visible(&self, locator: &Locator) -> VisregResult<bool>;

    /// Whether the element is visible and enabled
    async fn is_clickable(&self, locator: &Locator) -> VisregResult<bool>;

    /// Click an element
    async fn click(&mut self, locator: &Locator) -> VisregResult<()>;

    /// Replace the value of an input
    async fn fill(&mut self, locator: &Locator, value: &str) -> VisregResult<()>;

    /// Submit the form owning the element
    async fn submit(&mut self, locator: &Locator) -> VisregResult<()>;

    /// Visible text of an element, `None` when absent
    async fn text(&self, locator: &Locator) -> VisregResult<Option<String>>;

    /// Select a dropdown option by value; `false` when no such option
    async fn select_by_value(&mut self, locator: &Locator, value: &str) -> VisregResult<bool>;

    /// Select a dropdown option by position; `false` when out of range
    async fn select_by_index(&mut self, locator: &Locator, index: usize) -> VisregResult<bool>;

    /// Capture the viewport as PNG
    async fn screenshot(&self) -> VisregResult<Vec<u8>>;

    /// Remove cookies and web storage
    async fn clear_browser_data(&mut self) -> VisregResult<()>;

    /// End the session
    async fn close(&mut self) -> VisregResult<()>;
}

/// Encode a flat grayscale PNG
pub fn placeholder_png(width: u32, height: u32, shade: u8) -> VisregResult<Vec<u8>> {
    let img = GrayImage::from_pixel(width, height, Luma([shade]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| VisregError::Screenshot {
            message: e.to_string(),
        })?;
    Ok(buf.into_inner())
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// Element state in a [`MockDriver`] page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Displayed
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Visible text
    pub text: String,
    /// Input value
    pub value: String,
    /// Option values for dropdowns
    pub options: Vec<String>,
    /// Selected option index
    pub selected: Option<usize>,
}

impl Default for MockElement {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            text: String::new(),
            value: String::new(),
            options: Vec::new(),
            selected: None,
        }
    }
}

impl MockElement {
    /// Visible, enabled element
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set dropdown options
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Mark hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Page change triggered by clicking or submitting an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEffect {
    /// Add or replace an element
    Show(Locator, MockElement),
    /// Remove an element
    Remove(Locator),
    /// Change an element's text
    SetText(Locator, String),
    /// The window goes away
    CloseSession,
}

/// Scripted page driver for tests
#[derive(Debug, Default)]
pub struct MockDriver {
    url: String,
    elements: HashMap<Locator, MockElement>,
    effects: HashMap<Locator, Vec<MockEffect>>,
    navigation_failures: u32,
    screenshot: Option<Vec<u8>>,
    session_closed: bool,
    closed: bool,
    call_history: Vec<String>,
}

impl MockDriver {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element
    #[must_use]
    pub fn with_element(mut self, locator: Locator, element: MockElement) -> Self {
        self.elements.insert(locator, element);
        self
    }

    /// Apply an effect when the element is clicked or submitted
    #[must_use]
    pub fn on_activate(mut self, locator: Locator, effect: MockEffect) -> Self {
        self.effects.entry(locator).or_default().push(effect);
        self
    }

    /// Fail the first `count` navigations
    #[must_use]
    pub const fn with_navigation_failures(mut self, count: u32) -> Self {
        self.navigation_failures = count;
        self
    }

    /// Return these bytes from every screenshot
    #[must_use]
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    /// Recorded calls in order
    #[must_use]
    pub fn call_history(&self) -> &[String] {
        &self.call_history
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Element state
    #[must_use]
    pub fn element(&self, locator: &Locator) -> Option<&MockElement> {
        self.elements.get(locator)
    }

    /// Whether `close` was called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> VisregResult<()> {
        if self.session_closed || self.closed {
            return Err(VisregError::SessionClosed {
                message: "no such window: target window already closed".to_string(),
            });
        }
        Ok(())
    }

    fn element_mut(&mut self, locator: &Locator) -> VisregResult<&mut MockElement> {
        self.elements
            .get_mut(locator)
            .ok_or_else(|| VisregError::Script {
                message: format!("element not found: {locator}"),
            })
    }

    fn activate(&mut self, locator: &Locator) {
        let Some(effects) = self.effects.get(locator).cloned() else {
            return;
        };
        for effect in effects {
            match effect {
                MockEffect::Show(target, element) => {
                    self.elements.insert(target, element);
                }
                MockEffect::Remove(target) => {
                    self.elements.remove(&target);
                }
                MockEffect::SetText(target, text) => {
                    if let Some(el) = self.elements.get_mut(&target) {
                        el.text = text;
                    }
                }
                MockEffect::CloseSession => self.session_closed = true,
            }
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn goto(&mut self, url: &str) -> VisregResult<()> {
        self.ensure_open()?;
        self.call_history.push(format!("goto:{url}"));
        if self.navigation_failures > 0 {
            self.navigation_failures -= 1;
            return Err(VisregError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> VisregResult<bool> {
        self.ensure_open()?;
        Ok(self.elements.contains_key(locator))
    }

    async fn is_visible(&self, locator: &Locator) -> VisregResult<bool> {
        self.ensure_open()?;
        Ok(self.elements.get(locator).is_some_and(|e| e.visible))
    }

    async fn is_clickable(&self, locator: &Locator) -> VisregResult<bool> {
        self.ensure_open()?;
        Ok(self
            .elements
            .get(locator)
            .is_some_and(|e| e.visible && e.enabled))
    }

    async fn click(&mut self, locator: &Locator) -> VisregResult<()> {
        self.ensure_open()?;
        self.element_mut(locator)?;
        self.call_history.push(format!("click:{locator}"));
        self.activate(locator);
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> VisregResult<()> {
        self.ensure_open()?;
        self.element_mut(locator)?.value = value.to_string();
        self.call_history.push(format!("fill:{locator}={value}"));
        Ok(())
    }

    async fn submit(&mut self, locator: &Locator) -> VisregResult<()> {
        self.ensure_open()?;
        self.element_mut(locator)?;
        self.call_history.push(format!("submit:{locator}"));
        self.activate(locator);
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> VisregResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.elements.get(locator).map(|e| e.text.clone()))
    }

    async fn select_by_value(&mut self, locator: &Locator, value: &str) -> VisregResult<bool> {
        self.ensure_open()?;
        let element = self.element_mut(locator)?;
        let Some(index) = element.options.iter().position(|o| o == value) else {
            return Ok(false);
        };
        element.selected = Some(index);
        element.value = value.to_string();
        self.call_history.push(format!("select:{locator}={value}"));
        Ok(true)
    }

    async fn select_by_index(&mut self, locator: &Locator, index: usize) -> VisregResult<bool> {
        self.ensure_open()?;
        let element = self.element_mut(locator)?;
        let Some(value) = element.options.get(index).cloned() else {
            return Ok(false);
        };
        element.selected = Some(index);
        element.value = value;
        self.call_history.push(format!("select:{locator}#{index}"));
        Ok(true)
    }

    async fn screenshot(&self) -> VisregResult<Vec<u8>> {
        self.ensure_open()?;
        match &self.screenshot {
            Some(png) => Ok(png.clone()),
            None => placeholder_png(32, 24, 200),
        }
    }

    async fn clear_browser_data(&mut self) -> VisregResult<()> {
        self.ensure_open()?;
        self.call_history.push("clear_browser_data".to_string());
        Ok(())
    }

    async fn close(&mut self) -> VisregResult<()> {
        self.call_history.push("close".to_string());
        self.closed = true;
        Ok(())
    }
}

// =============================================================================
// CDP DRIVER
// =============================================================================

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

#[cfg(feature = "browser")]
mod cdp {
    use super::{DriverConfig, PageDriver};
    use crate::locator::{js_str, Locator};
    use crate::result::{VisregError, VisregResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::error::CdpError;
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use serde::Deserialize;

    const LAUNCH_ARGS: [&str; 3] = [
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-search-engine-choice-screen",
    ];

    /// Chromium session over CDP
    #[derive(Debug)]
    pub struct CdpDriver {
        browser: Browser,
        page: Page,
        handle: tokio::task::JoinHandle<()>,
        closed: bool,
    }

    #[derive(Debug, Deserialize)]
    struct TextProbe {
        found: bool,
        text: String,
    }

    /// Protocol replies sent once the page target is gone
    const TARGET_GONE: [&str; 3] = [
        "Target closed",
        "No target with given id",
        "Session with given id not found",
    ];

    fn is_closed_message(message: &str) -> bool {
        TARGET_GONE.iter().any(|phrase| message.contains(phrase))
    }

    fn is_session_lost(err: &CdpError) -> bool {
        match err {
            CdpError::Ws(_) | CdpError::NoResponse | CdpError::ChannelSendError(_) => true,
            CdpError::Chrome(e) => is_closed_message(&e.to_string()),
            CdpError::ChromeMessage(message) => is_closed_message(message),
            _ => false,
        }
    }

    fn classify(err: &CdpError, otherwise: impl FnOnce(String) -> VisregError) -> VisregError {
        let message = err.to_string();
        if is_session_lost(err) {
            VisregError::SessionClosed { message }
        } else {
            otherwise(message)
        }
    }

    fn script_error(message: String) -> VisregError {
        VisregError::Script { message }
    }

    /// Wrap a statement body that has `el` bound to the locator's element
    fn with_element(locator: &Locator, body: &str) -> String {
        format!("(() => {{ const el = {}; {body} }})()", locator.to_query())
    }

    impl CdpDriver {
        /// Launch Chromium and open a blank page
        pub async fn launch(config: &DriverConfig) -> VisregResult<Self> {
            let mut builder = BrowserConfig::builder();

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            for arg in LAUNCH_ARGS {
                builder = builder.arg(arg);
            }

            let cdp_config = builder
                .window_size(config.window_size.0, config.window_size.1)
                .request_timeout(config.navigation_timeout)
                .build()
                .map_err(|e| VisregError::BrowserLaunch {
                    message: e.to_string(),
                })?;

            let (browser, mut handler) =
                Browser::launch(cdp_config)
                    .await
                    .map_err(|e| VisregError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| VisregError::BrowserLaunch {
                    message: e.to_string(),
                })?;

            tracing::info!(headless = config.headless, "browser launched");
            Ok(Self {
                browser,
                page,
                handle,
                closed: false,
            })
        }

        async fn eval<T: DeserializeOwned>(&self, script: String) -> VisregResult<T> {
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| classify(&e, script_error))?;
            result.into_value().map_err(|e| VisregError::Script {
                message: e.to_string(),
            })
        }

        async fn run_on(&self, locator: &Locator, body: &str) -> VisregResult<()> {
            let found: bool = self.eval(with_element(locator, body)).await?;
            if found {
                Ok(())
            } else {
                Err(VisregError::Script {
                    message: format!("element not found: {locator}"),
                })
            }
        }
    }

    #[async_trait]
    impl PageDriver for CdpDriver {
        async fn goto(&mut self, url: &str) -> VisregResult<()> {
            self.page.goto(url).await.map_err(|e| {
                classify(&e, |message| VisregError::Navigation {
                    url: url.to_string(),
                    message,
                })
            })?;
            Ok(())
        }

        async fn exists(&self, locator: &Locator) -> VisregResult<bool> {
            let count: u64 = self.eval(format!("({})", locator.to_count_query())).await?;
            Ok(count > 0)
        }

        async fn is_visible(&self, locator: &Locator) -> VisregResult<bool> {
            self.eval(with_element(
                locator,
                "if (!el) return false; \
                 const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';",
            ))
            .await
        }

        async fn is_clickable(&self, locator: &Locator) -> VisregResult<bool> {
            self.eval(with_element(
                locator,
                "if (!el) return false; \
                 const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' \
                     && s.pointerEvents !== 'none' && !el.disabled;",
            ))
            .await
        }

        async fn click(&mut self, locator: &Locator) -> VisregResult<()> {
            self.run_on(
                locator,
                "if (!el) return false; el.scrollIntoView({block: 'center'}); el.click(); return true;",
            )
            .await
        }

        async fn fill(&mut self, locator: &Locator, value: &str) -> VisregResult<()> {
            let body = format!(
                "if (!el) return false; el.focus(); el.value = {}; \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true;",
                js_str(value)
            );
            self.run_on(locator, &body).await
        }

        async fn submit(&mut self, locator: &Locator) -> VisregResult<()> {
            self.run_on(
                locator,
                "if (!el) return false; const form = el.form || el.closest('form'); \
                 if (form && form.requestSubmit) { form.requestSubmit(); } \
                 else if (form) { form.submit(); } else { el.click(); } return true;",
            )
            .await
        }

        async fn text(&self, locator: &Locator) -> VisregResult<Option<String>> {
            let probe: TextProbe = self
                .eval(with_element(
                    locator,
                    "return el ? {found: true, text: el.innerText || el.textContent || ''} \
                     : {found: false, text: ''};",
                ))
                .await?;
            Ok(probe.found.then_some(probe.text))
        }

        async fn select_by_value(&mut self, locator: &Locator, value: &str) -> VisregResult<bool> {
            let body = format!(
                "if (!el || !el.options) return false; \
                 const i = Array.from(el.options).findIndex(o => o.value === {}); \
                 if (i < 0) return false; el.selectedIndex = i; \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true;",
                js_str(value)
            );
            self.eval(with_element(locator, &body)).await
        }

        async fn select_by_index(&mut self, locator: &Locator, index: usize) -> VisregResult<bool> {
            let body = format!(
                "if (!el || !el.options || {index} >= el.options.length) return false; \
                 el.selectedIndex = {index}; \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true;"
            );
            self.eval(with_element(locator, &body)).await
        }

        async fn screenshot(&self) -> VisregResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();

            let screenshot = self.page.execute(params).await.map_err(|e| {
                classify(&e, |message| VisregError::Screenshot { message })
            })?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| VisregError::Screenshot {
                    message: e.to_string(),
                })
        }

        async fn clear_browser_data(&mut self) -> VisregResult<()> {
            self.page
                .execute(ClearBrowserCookiesParams::default())
                .await
                .map_err(|e| classify(&e, script_error))?;
            let _: bool = self
                .eval(
                    "(() => { try { localStorage.clear(); sessionStorage.clear(); } catch (e) {} return true; })()"
                        .to_string(),
                )
                .await?;
            tracing::debug!("cookies and storage cleared");
            Ok(())
        }

        async fn close(&mut self) -> VisregResult<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            let result = self.browser.close().await;
            self.handle.abort();
            match result {
                Ok(_) => {
                    tracing::info!("browser closed");
                    Ok(())
                }
                Err(e) if is_session_lost(&e) => Ok(()),
                Err(e) => Err(VisregError::BrowserLaunch {
                    message: e.to_string(),
                }),
            }
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[test]
        fn test_closed_message_detection() {
            assert!(is_closed_message("Target closed"));
            assert!(is_closed_message("No target with given id found"));
            assert!(!is_closed_message("Evaluation failed: ReferenceError"));
            assert!(!is_closed_message(
                "net::ERR_CONNECTION_CLOSED at https://bank.test/"
            ));
        }

        #[test]
        fn test_lost_session_variants() {
            use chromiumoxide::error::ChannelError;
            use futures::channel::oneshot::Canceled;

            assert!(is_session_lost(&CdpError::NoResponse));
            assert!(is_session_lost(&CdpError::ChannelSendError(
                ChannelError::Canceled(Canceled)
            )));
            assert!(is_session_lost(&CdpError::msg("No target with given id found")));
            assert!(!is_session_lost(&CdpError::Timeout));
        }

        #[test]
        fn test_connection_reset_stays_navigation_error() {
            let err = CdpError::msg("net::ERR_CONNECTION_CLOSED at https://bank.test/");
            let classified = classify(&err, |message| VisregError::Navigation {
                url: "https://bank.test/".to_string(),
                message,
            });
            assert!(!classified.is_session_closed());
            assert!(matches!(classified, VisregError::Navigation { .. }));
        }

        #[test]
        fn test_with_element_wraps_query() {
            let script = with_element(&Locator::id("type"), "return !!el;");
            assert!(script.starts_with("(() => { const el = document.getElementById(\"type\");"));
            assert!(script.ends_with("return !!el; })()"));
        }
    }
}
