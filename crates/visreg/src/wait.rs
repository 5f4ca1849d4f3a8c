//! Bounded waits and recorded interactions over a [`PageDriver`].
//!
//! Polling mirrors an explicit-wait loop: evaluate the condition, sleep the
//! poll interval, give up at the deadline with [`VisregError::ElementTimeout`].
//! A closed session ends any wait at once.

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::result::{VisregError, VisregResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default wait for elements (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Short wait for optional elements (2 seconds)
pub const SHORT_WAIT_TIMEOUT_MS: u64 = 2_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Navigation attempts before giving up
pub const DEFAULT_NAVIGATION_ATTEMPTS: u32 = 3;

/// First navigation backoff, doubled per retry
pub const DEFAULT_NAVIGATION_BACKOFF_MS: u64 = 500;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for waits and navigation retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Default timeout in milliseconds
    pub timeout_ms: u64,
    /// Timeout for optional elements in milliseconds
    pub short_timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Navigation attempts
    pub navigation_attempts: u32,
    /// First navigation backoff in milliseconds
    pub navigation_backoff_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            short_timeout_ms: SHORT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            navigation_attempts: DEFAULT_NAVIGATION_ATTEMPTS,
            navigation_backoff_ms: DEFAULT_NAVIGATION_BACKOFF_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set short timeout in milliseconds
    #[must_use]
    pub const fn with_short_timeout(mut self, timeout_ms: u64) -> Self {
        self.short_timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set navigation retry policy
    #[must_use]
    pub const fn with_navigation_retry(mut self, attempts: u32, backoff_ms: u64) -> Self {
        self.navigation_attempts = attempts;
        self.navigation_backoff_ms = backoff_ms;
        self
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Backoff before the given retry (1-based)
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.navigation_backoff_ms.saturating_mul(factor))
    }
}

// =============================================================================
// CONDITIONS AND OUTCOMES
// =============================================================================

/// What an element wait requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Element exists in the DOM
    Present,
    /// Element is displayed
    Visible,
    /// Element is displayed and enabled
    Clickable,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Visible => write!(f, "visible"),
            Self::Clickable => write!(f, "clickable"),
        }
    }
}

/// Outcome of a dropdown selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The requested value was selected
    Value,
    /// The value was missing; the option at this index was selected instead
    Fallback(usize),
    /// Neither the value nor the fallback index exist
    Unavailable,
}

/// Kind of recorded interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Page navigation
    Navigate,
    /// Element click
    Click,
    /// Text input
    Input,
    /// Form submission
    Submit,
    /// Dropdown selection
    Select,
}

/// One interaction performed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAction {
    /// Interaction kind
    pub kind: ActionKind,
    /// Target element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    /// Typed text, URL or selected option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Milliseconds since the interactor was created
    pub elapsed_ms: u64,
}

// =============================================================================
// INTERACTOR
// =============================================================================

/// Driver wrapper with bounded waits and an action log
#[derive(Debug)]
pub struct Interactor<D: PageDriver> {
    driver: D,
    options: WaitOptions,
    actions: Vec<RecordedAction>,
    started: Instant,
}

impl<D: PageDriver> Interactor<D> {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: D, options: WaitOptions) -> Self {
        Self {
            driver,
            options,
            actions: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Wait options
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Borrow the driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Borrow the driver mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Unwrap into the driver and the action log
    pub fn into_parts(self) -> (D, Vec<RecordedAction>) {
        (self.driver, self.actions)
    }

    /// Interactions so far
    #[must_use]
    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    fn record(&mut self, kind: ActionKind, locator: Option<&Locator>, value: Option<&str>) {
        self.actions.push(RecordedAction {
            kind,
            locator: locator.cloned(),
            value: value.map(str::to_string),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
    }

    /// Navigate, retrying transient failures with exponential backoff
    pub async fn goto(&mut self, url: &str) -> VisregResult<()> {
        let attempts = self.options.navigation_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.driver.goto(url).await {
                Ok(()) => {
                    tracing::debug!(url, attempt, "navigated");
                    self.record(ActionKind::Navigate, None, Some(url));
                    return Ok(());
                }
                Err(e) if e.is_session_closed() || attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.options.backoff(attempt);
                    tracing::warn!(url, attempt, error = %e, "navigation failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn check(&self, locator: &Locator, condition: Condition) -> VisregResult<bool> {
        match condition {
            Condition::Present => self.driver.exists(locator).await,
            Condition::Visible => self.driver.is_visible(locator).await,
            Condition::Clickable => self.driver.is_clickable(locator).await,
        }
    }

    /// Poll until the condition holds or `timeout_ms` elapses
    pub async fn wait_for(
        &self,
        locator: &Locator,
        condition: Condition,
        timeout_ms: u64,
    ) -> VisregResult<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match self.check(locator, condition).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.is_session_closed() => return Err(e),
                // Pages mid-navigation reject scripts; keep polling
                Err(e) => tracing::trace!(%locator, error = %e, "condition check failed"),
            }
            if Instant::now() >= deadline {
                return Err(VisregError::ElementTimeout {
                    what: format!("{locator} to be {condition}"),
                    ms: timeout_ms,
                });
            }
            tokio::time::sleep(self.options.poll_interval()).await;
        }
    }

    /// Like [`Self::wait_for`] but a timeout yields `Ok(false)`
    pub async fn try_wait_for(
        &self,
        locator: &Locator,
        condition: Condition,
        timeout_ms: u64,
    ) -> VisregResult<bool> {
        match self.wait_for(locator, condition, timeout_ms).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_timeout() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Click once the element is clickable (default timeout)
    pub async fn click(&mut self, locator: &Locator) -> VisregResult<()> {
        self.wait_for(locator, Condition::Clickable, self.options.timeout_ms)
            .await?;
        self.driver.click(locator).await?;
        tracing::debug!(%locator, "clicked");
        self.record(ActionKind::Click, Some(locator), None);
        Ok(())
    }

    /// Click if the element becomes clickable within `timeout_ms`
    pub async fn click_within(&mut self, locator: &Locator, timeout_ms: u64) -> VisregResult<bool> {
        if !self
            .try_wait_for(locator, Condition::Clickable, timeout_ms)
            .await?
        {
            return Ok(false);
        }
        self.driver.click(locator).await?;
        tracing::debug!(%locator, "clicked");
        self.record(ActionKind::Click, Some(locator), None);
        Ok(true)
    }

    /// Type into an input once present
    pub async fn fill(&mut self, locator: &Locator, value: &str) -> VisregResult<()> {
        self.wait_for(locator, Condition::Present, self.options.timeout_ms)
            .await?;
        self.driver.fill(locator, value).await?;
        tracing::debug!(%locator, "filled");
        self.record(ActionKind::Input, Some(locator), Some(value));
        Ok(())
    }

    /// Submit the form owning the element
    pub async fn submit(&mut self, locator: &Locator) -> VisregResult<()> {
        self.wait_for(locator, Condition::Present, self.options.timeout_ms)
            .await?;
        self.driver.submit(locator).await?;
        tracing::debug!(%locator, "submitted");
        self.record(ActionKind::Submit, Some(locator), None);
        Ok(())
    }

    /// Visible text once present
    pub async fn text(&self, locator: &Locator) -> VisregResult<String> {
        self.wait_for(locator, Condition::Present, self.options.timeout_ms)
            .await?;
        self.driver
            .text(locator)
            .await?
            .ok_or_else(|| VisregError::Script {
                message: format!("element disappeared: {locator}"),
            })
    }

    /// Select by value, falling back to an index
    pub async fn select(
        &mut self,
        locator: &Locator,
        value: &str,
        fallback_index: usize,
    ) -> VisregResult<Selection> {
        self.wait_for(locator, Condition::Present, self.options.timeout_ms)
            .await?;
        if self.driver.select_by_value(locator, value).await? {
            self.record(ActionKind::Select, Some(locator), Some(value));
            return Ok(Selection::Value);
        }
        tracing::warn!(%locator, value, fallback_index, "option missing, selecting by index");
        if self.driver.select_by_index(locator, fallback_index).await? {
            self.record(
                ActionKind::Select,
                Some(locator),
                Some(&format!("#{fallback_index}")),
            );
            return Ok(Selection::Fallback(fallback_index));
        }
        Ok(Selection::Unavailable)
    }

    /// Select by index; `false` when out of range
    pub async fn select_index(&mut self, locator: &Locator, index: usize) -> VisregResult<bool> {
        self.wait_for(locator, Condition::Present, self.options.timeout_ms)
            .await?;
        let selected = self.driver.select_by_index(locator, index).await?;
        if selected {
            self.record(ActionKind::Select, Some(locator), Some(&format!("#{index}")));
        }
        Ok(selected)
    }

    /// Capture the viewport
    pub async fn screenshot(&self) -> VisregResult<Vec<u8>> {
        self.driver.screenshot().await
    }

    /// Clear cookies and storage
    pub async fn clear_browser_data(&mut self) -> VisregResult<()> {
        self.driver.clear_browser_data().await
    }

    /// Sleep unless the duration is zero
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Close the session
    pub async fn close(&mut self) -> VisregResult<()> {
        self.driver.close().await
    }

    /// Action log as pretty JSON
    pub fn actions_json(&self) -> VisregResult<String> {
        Ok(serde_json::to_string_pretty(&self.actions)?)
    }
}
