//! Scripted flows through the banking demo site.
//!
//! Each [`Scenario`] is one handler on [`ScenarioRun`]. Handlers capture a
//! screenshot at every step into the scenario's directory. Optional page
//! elements that never show up lead to a fallback capture, not an error.

use crate::data::FormData;
use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::report::{Report, ReportRow};
use crate::result::{VisregError, VisregResult};
use crate::store::{ScreenshotRecord, ScreenshotStore};
use crate::wait::{Condition, Interactor, Selection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Register form fields, in fill order
pub const REGISTER_FIELDS: [&str; 11] = [
    "customer.firstName",
    "customer.lastName",
    "customer.address.street",
    "customer.address.city",
    "customer.address.state",
    "customer.address.zipCode",
    "customer.phoneNumber",
    "customer.ssn",
    "customer.username",
    "customer.password",
    "repeatedPassword",
];

/// Login form fields
pub const LOGIN_FIELDS: [&str; 2] = ["username", "password"];

/// Wait before each capture (2 seconds)
pub const DEFAULT_SETTLE_MS: u64 = 2_000;

/// Wait after opening the accounts overview (10 seconds)
pub const DEFAULT_OVERVIEW_DELAY_MS: u64 = 10_000;

/// Wait after toggling in the visual test (1 second)
pub const DEFAULT_TOGGLE_DELAY_MS: u64 = 1_000;

/// Flows the runner knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Sign up a new customer
    Register,
    /// Log in with existing credentials
    Login,
    /// Log in and open a new account
    OpenAccount,
    /// Log in and show the accounts overview
    Overview,
    /// Same flow as overview, kept as its own baseline set
    ViewOverview,
    /// Toggle the demo counter and check it increments
    VisualTest,
}

impl Scenario {
    /// Every scenario, in menu order
    pub const ALL: [Self; 6] = [
        Self::Register,
        Self::Login,
        Self::OpenAccount,
        Self::Overview,
        Self::ViewOverview,
        Self::VisualTest,
    ];

    /// Name used for directories, data keys and the CLI
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::OpenAccount => "open_account",
            Self::Overview => "overview",
            Self::ViewOverview => "view_overview",
            Self::VisualTest => "visual_test",
        }
    }

    /// Fields offered in the custom data form
    #[must_use]
    pub const fn custom_fields(self) -> &'static [&'static str] {
        match self {
            Self::Register => &REGISTER_FIELDS,
            Self::Login | Self::OpenAccount | Self::Overview | Self::ViewOverview => &LOGIN_FIELDS,
            Self::VisualTest => &[],
        }
    }

    /// Key into the test data file
    ///
    /// Flows that log in first read the login entry.
    #[must_use]
    pub const fn data_key(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login | Self::OpenAccount | Self::Overview | Self::ViewOverview => "login",
            Self::VisualTest => "visual_test",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = VisregError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|sc| sc.as_str() == wanted)
            .ok_or_else(|| VisregError::InvalidInput {
                message: format!(
                    "unknown scenario {s:?}; expected one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ),
            })
    }
}

/// Fixed delays inside flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioTimings {
    /// Before each capture
    pub settle: Duration,
    /// After opening the accounts overview
    pub overview_delay: Duration,
    /// After each toggle in the visual test
    pub toggle_delay: Duration,
}

impl Default for ScenarioTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            overview_delay: Duration::from_millis(DEFAULT_OVERVIEW_DELAY_MS),
            toggle_delay: Duration::from_millis(DEFAULT_TOGGLE_DELAY_MS),
        }
    }
}

impl ScenarioTimings {
    /// No delays at all
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            overview_delay: Duration::ZERO,
            toggle_delay: Duration::ZERO,
        }
    }
}

fn link(text: &str) -> Locator {
    Locator::link_text(text)
}

fn demo_heading() -> Locator {
    Locator::xpath("//div[@class='demo']/h1")
}

fn toggle_button(label: &str) -> Locator {
    Locator::xpath(format!("//button[span='{label}']"))
}

/// Second-to-last word of the demo heading, e.g. "clicked 3 times" -> 3
pub fn parse_counter(heading: &str) -> VisregResult<i64> {
    let words: Vec<&str> = heading.split_whitespace().collect();
    words
        .len()
        .checked_sub(2)
        .and_then(|i| words[i].parse().ok())
        .ok_or_else(|| VisregError::Assertion {
            message: format!("no counter in heading {heading:?}"),
        })
}

/// One scenario execution against a live page
#[derive(Debug)]
pub struct ScenarioRun<'a, D: PageDriver> {
    /// Page access
    pub interactor: &'a mut Interactor<D>,
    /// Capture destination
    pub store: &'a mut ScreenshotStore,
    /// Receives check rows
    pub report: &'a mut Report,
    /// Flow to execute
    pub scenario: Scenario,
    /// Site entry point
    pub website: &'a str,
    /// Form values, keyed by field name
    pub data: &'a FormData,
    /// Delays
    pub timings: ScenarioTimings,
}

impl<D: PageDriver> ScenarioRun<'_, D> {
    /// Execute the flow
    pub async fn execute(&mut self) -> VisregResult<()> {
        tracing::info!(scenario = %self.scenario, website = self.website, "scenario started");
        match self.scenario {
            Scenario::Register => self.register().await,
            Scenario::Login => self.login().await,
            Scenario::OpenAccount => self.open_account().await,
            Scenario::Overview => self.overview("overview").await,
            Scenario::ViewOverview => self.overview("view_overview").await,
            Scenario::VisualTest => self.visual_test().await,
        }
    }

    async fn capture(&mut self, description: &str) -> VisregResult<ScreenshotRecord> {
        self.interactor.pause(self.timings.settle).await;
        let png = self.interactor.screenshot().await?;
        self.store.save(self.scenario.as_str(), description, &png)
    }

    fn value(&self, field: &str) -> &str {
        self.data.get(field).map_or("", String::as_str)
    }

    async fn register(&mut self) -> VisregResult<()> {
        self.interactor.goto(self.website).await?;
        self.capture("register_home_page").await?;

        self.interactor.click(&link("Register")).await?;
        self.capture("register_clicked_register").await?;

        for field in REGISTER_FIELDS {
            let value = self.value(field).to_string();
            self.interactor.fill(&Locator::id(field), &value).await?;
        }
        self.capture("register_filled_form").await?;

        self.interactor
            .click(&Locator::css("input.button[value='Register']"))
            .await?;
        self.capture("register_submitted").await?;
        Ok(())
    }

    async fn login(&mut self) -> VisregResult<()> {
        self.interactor.goto(self.website).await?;
        self.capture("login_home_page").await?;

        let username = self.value("username").to_string();
        let password = self.value("password").to_string();
        self.interactor
            .fill(&Locator::name("username"), &username)
            .await?;
        self.interactor
            .fill(&Locator::name("password"), &password)
            .await?;
        self.interactor.submit(&Locator::name("password")).await?;

        let short = self.interactor.options().short_timeout_ms;
        if !self
            .interactor
            .try_wait_for(&link("Log Out"), Condition::Visible, short)
            .await?
        {
            tracing::warn!("no Log Out link after login");
        }
        self.capture("login_logged_in").await?;
        Ok(())
    }

    async fn open_account(&mut self) -> VisregResult<()> {
        self.interactor.goto(self.website).await?;
        self.capture("open_account_home_page").await?;
        self.login().await?;

        let timeout = self.interactor.options().timeout_ms;
        let short = self.interactor.options().short_timeout_ms;

        if !self
            .interactor
            .click_within(&link("Open New Account"), timeout)
            .await?
        {
            self.capture("open_account_link_timeout").await?;
            return Ok(());
        }
        self.capture("open_account_new_account_page").await?;

        let account_type = Locator::id("type");
        if !self
            .interactor
            .try_wait_for(&account_type, Condition::Present, timeout)
            .await?
        {
            self.capture("open_account_link_timeout").await?;
            return Ok(());
        }
        match self.interactor.select(&account_type, "0", 0).await? {
            Selection::Value => self.capture("open_account_selected_type").await?,
            Selection::Fallback(_) => self.capture("open_account_selected_type_default").await?,
            Selection::Unavailable => {
                return Err(VisregError::Assertion {
                    message: "account type dropdown has no options".to_string(),
                })
            }
        };

        let from_account = Locator::id("fromAccountId");
        if !self
            .interactor
            .try_wait_for(&from_account, Condition::Present, timeout)
            .await?
        {
            self.capture("open_account_link_timeout").await?;
            return Ok(());
        }
        if self.interactor.select_index(&from_account, 1).await? {
            self.capture("open_account_selected_account").await?;
        } else {
            self.capture("open_account_no_account_option").await?;
        }

        if !self
            .interactor
            .click_within(&Locator::css("input[value='Open New Account']"), short)
            .await?
        {
            self.capture("open_account_button_timeout").await?;
            return Ok(());
        }
        self.capture("open_account_opened_success").await?;

        if self
            .interactor
            .try_wait_for(
                &Locator::xpath("//div[@id='success-message']"),
                Condition::Visible,
                short,
            )
            .await?
        {
            self.capture("open_account_success_message").await?;
        } else {
            self.capture("open_account_button_timeout").await?;
        }
        Ok(())
    }

    async fn overview(&mut self, prefix: &str) -> VisregResult<()> {
        self.interactor.goto(self.website).await?;
        self.capture(&format!("{prefix}_home_page")).await?;
        self.login().await?;

        self.interactor.click(&link("Accounts Overview")).await?;
        self.interactor.pause(self.timings.overview_delay).await;
        self.capture(&format!("{prefix}_displayed")).await?;
        Ok(())
    }

    async fn read_counter(&self) -> VisregResult<i64> {
        let heading = self.interactor.text(&demo_heading()).await?;
        parse_counter(&heading)
    }

    async fn visual_test(&mut self) -> VisregResult<()> {
        self.interactor.goto(self.website).await?;
        self.capture("visual_test_initial").await?;
        let initial = self.read_counter().await?;

        self.interactor.click(&toggle_button("Enable")).await?;
        self.interactor.pause(self.timings.toggle_delay).await;
        self.capture("visual_test_after_enable").await?;
        let updated = self.read_counter().await?;

        let passed = updated == initial + 1;
        let row = if passed {
            ReportRow::check(
                true,
                "Visual Test passed: Count incremented correctly after clicking 'Enable'.",
            )
        } else {
            ReportRow::check(
                false,
                format!(
                    "Visual Test failed: Count did not increment correctly after clicking 'Enable' ({initial} -> {updated})."
                ),
            )
        };
        tracing::info!(initial, updated, passed, "visual counter check");
        self.report.record(row);

        self.interactor.click(&toggle_button("Disable")).await?;
        self.interactor.pause(self.timings.toggle_delay).await;
        self.capture("visual_test_after_disable").await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use crate::data::default_form_data;
    use crate::driver::{MockDriver, MockEffect, MockElement};
    use crate::report::Status;
    use crate::wait::WaitOptions;
    use tempfile::TempDir;

    pub(crate) fn fast_waits() -> WaitOptions {
        WaitOptions::new()
            .with_timeout(30)
            .with_short_timeout(10)
            .with_poll_interval(5)
            .with_navigation_retry(2, 1)
    }

    /// Demo page whose counter goes from 3 to `after_enable`
    pub(crate) fn visual_page(after_enable: i64) -> MockDriver {
        MockDriver::new()
            .with_element(demo_heading(), MockElement::new().with_text("Clicked 3 times"))
            .with_element(toggle_button("Enable"), MockElement::new())
            .with_element(toggle_button("Disable"), MockElement::new())
            .on_activate(
                toggle_button("Enable"),
                MockEffect::SetText(demo_heading(), format!("Clicked {after_enable} times")),
            )
    }

    /// Bank pages with a working login form
    pub(crate) fn bank_page() -> MockDriver {
        MockDriver::new()
            .with_element(Locator::name("username"), MockElement::new())
            .with_element(Locator::name("password"), MockElement::new())
            .on_activate(
                Locator::name("password"),
                MockEffect::Show(link("Log Out"), MockElement::new()),
            )
    }

    struct Fixture {
        _dir: TempDir,
        store: ScreenshotStore,
        report: Report,
        data: FormData,
    }

    impl Fixture {
        fn new(scenario: Scenario) -> Self {
            let dir = TempDir::new().unwrap();
            let store = ScreenshotStore::new(dir.path().join("screenshots"));
            Self {
                _dir: dir,
                store,
                report: Report::new(),
                data: default_form_data(scenario),
            }
        }

        async fn run(
            &mut self,
            driver: MockDriver,
            scenario: Scenario,
        ) -> (VisregResult<()>, Interactor<MockDriver>) {
            let mut interactor = Interactor::new(driver, fast_waits());
            let result = ScenarioRun {
                interactor: &mut interactor,
                store: &mut self.store,
                report: &mut self.report,
                scenario,
                website: "https://bank.test/",
                data: &self.data,
                timings: ScenarioTimings::immediate(),
            }
            .execute()
            .await;
            (result, interactor)
        }

        fn captured(&self) -> Vec<String> {
            self.store
                .current_all()
                .iter()
                .map(|r| r.description.clone())
                .collect()
        }
    }

    mod naming_tests {
        use super::*;

        #[test]
        fn test_round_trip_names() {
            for scenario in Scenario::ALL {
                assert_eq!(scenario.as_str().parse::<Scenario>().unwrap(), scenario);
            }
            assert_eq!("Open Account".parse::<Scenario>().unwrap(), Scenario::OpenAccount);
            assert!("checkout".parse::<Scenario>().is_err());
        }

        #[test]
        fn test_custom_fields() {
            assert_eq!(Scenario::Register.custom_fields().len(), 11);
            assert_eq!(Scenario::Login.custom_fields(), &["username", "password"]);
            assert!(Scenario::VisualTest.custom_fields().is_empty());
        }

        #[test]
        fn test_parse_counter() {
            assert_eq!(parse_counter("Clicked 3 times").unwrap(), 3);
            assert_eq!(parse_counter("Enabled 12 times").unwrap(), 12);
            assert!(parse_counter("nothing").is_err());
            assert!(parse_counter("Clicked many times").is_err());
        }
    }

    mod visual_tests {
        use super::*;

        #[tokio::test]
        async fn test_increment_passes() {
            let mut fx = Fixture::new(Scenario::VisualTest);
            let (result, _) = fx.run(visual_page(4), Scenario::VisualTest).await;
            result.unwrap();

            assert_eq!(
                fx.captured(),
                vec![
                    "visual_test_initial",
                    "visual_test_after_enable",
                    "visual_test_after_disable"
                ]
            );
            assert_eq!(fx.report.rows().len(), 1);
            assert_eq!(fx.report.rows()[0].status, Status::Success);
        }

        #[tokio::test]
        async fn test_missing_increment_fails_check() {
            let mut fx = Fixture::new(Scenario::VisualTest);
            let (result, _) = fx.run(visual_page(3), Scenario::VisualTest).await;
            result.unwrap();

            let row = &fx.report.rows()[0];
            assert_eq!(row.status, Status::Failure);
            assert!(row.description.contains("3 -> 3"));
            assert_eq!(fx.captured().len(), 3);
        }

        #[tokio::test]
        async fn test_missing_heading_is_error() {
            let mut fx = Fixture::new(Scenario::VisualTest);
            let (result, _) = fx.run(MockDriver::new(), Scenario::VisualTest).await;
            assert!(result.unwrap_err().is_timeout());
            assert_eq!(fx.captured(), vec!["visual_test_initial"]);
        }
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_login_flow() {
            let mut fx = Fixture::new(Scenario::Login);
            fx.data.insert("username".into(), "alice".into());
            let (result, interactor) = fx.run(bank_page(), Scenario::Login).await;
            result.unwrap();

            assert_eq!(fx.captured(), vec!["login_home_page", "login_logged_in"]);
            let driver = interactor.driver();
            assert_eq!(driver.element(&Locator::name("username")).unwrap().value, "alice");
            assert!(driver
                .call_history()
                .contains(&"submit:name=password".to_string()));
        }

        #[tokio::test]
        async fn test_register_flow_fills_every_field() {
            let mut page = MockDriver::new()
                .with_element(link("Register"), MockElement::new())
                .with_element(
                    Locator::css("input.button[value='Register']"),
                    MockElement::new(),
                );
            for field in REGISTER_FIELDS {
                page = page.with_element(Locator::id(field), MockElement::new());
            }

            let mut fx = Fixture::new(Scenario::Register);
            let (result, interactor) = fx.run(page, Scenario::Register).await;
            result.unwrap();

            assert_eq!(fx.captured().len(), 4);
            for field in REGISTER_FIELDS {
                let value = &interactor.driver().element(&Locator::id(field)).unwrap().value;
                assert!(!value.is_empty(), "{field} left empty");
            }
        }

        #[tokio::test]
        async fn test_overview_flow_names() {
            let page = bank_page().with_element(link("Accounts Overview"), MockElement::new());
            let mut fx = Fixture::new(Scenario::ViewOverview);
            let (result, _) = fx.run(page, Scenario::ViewOverview).await;
            result.unwrap();

            assert_eq!(
                fx.captured(),
                vec![
                    "view_overview_home_page",
                    "login_home_page",
                    "login_logged_in",
                    "view_overview_displayed"
                ]
            );
        }
    }

    mod open_account_tests {
        use super::*;

        fn account_page(type_options: &[&str], from_options: &[&str]) -> MockDriver {
            bank_page()
                .with_element(link("Open New Account"), MockElement::new())
                .with_element(
                    Locator::id("type"),
                    MockElement::new().with_options(type_options.iter().copied()),
                )
                .with_element(
                    Locator::id("fromAccountId"),
                    MockElement::new().with_options(from_options.iter().copied()),
                )
                .with_element(
                    Locator::css("input[value='Open New Account']"),
                    MockElement::new(),
                )
                .on_activate(
                    Locator::css("input[value='Open New Account']"),
                    MockEffect::Show(
                        Locator::xpath("//div[@id='success-message']"),
                        MockElement::new(),
                    ),
                )
        }

        #[tokio::test]
        async fn test_happy_path() {
            let mut fx = Fixture::new(Scenario::OpenAccount);
            let (result, _) = fx
                .run(account_page(&["0", "1"], &["13344", "13455"]), Scenario::OpenAccount)
                .await;
            result.unwrap();

            let captured = fx.captured();
            assert_eq!(captured[0], "open_account_home_page");
            assert!(captured.contains(&"open_account_selected_type".to_string()));
            assert!(captured.contains(&"open_account_selected_account".to_string()));
            assert_eq!(captured.last().unwrap(), "open_account_success_message");
        }

        #[tokio::test]
        async fn test_fallbacks_capture_instead_of_failing() {
            let mut fx = Fixture::new(Scenario::OpenAccount);
            let (result, _) = fx
                .run(account_page(&["CHECKING"], &["13344"]), Scenario::OpenAccount)
                .await;
            result.unwrap();

            let captured = fx.captured();
            assert!(captured.contains(&"open_account_selected_type_default".to_string()));
            assert!(captured.contains(&"open_account_no_account_option".to_string()));
        }

        #[tokio::test]
        async fn test_missing_link_times_out_gracefully() {
            let mut fx = Fixture::new(Scenario::OpenAccount);
            let (result, _) = fx.run(bank_page(), Scenario::OpenAccount).await;
            result.unwrap();
            assert_eq!(fx.captured().last().unwrap(), "open_account_link_timeout");
        }

        #[tokio::test]
        async fn test_missing_success_message() {
            let page = bank_page()
                .with_element(link("Open New Account"), MockElement::new())
                .with_element(Locator::id("type"), MockElement::new().with_options(["0"]))
                .with_element(Locator::id("fromAccountId"), MockElement::new().with_options(["1", "2"]))
                .with_element(Locator::css("input[value='Open New Account']"), MockElement::new());
            let mut fx = Fixture::new(Scenario::OpenAccount);
            let (result, _) = fx.run(page, Scenario::OpenAccount).await;
            result.unwrap();

            let captured = fx.captured();
            assert!(captured.contains(&"open_account_opened_success".to_string()));
            assert_eq!(captured.last().unwrap(), "open_account_button_timeout");
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_window_closed_mid_flow() {
            let page = MockDriver::new()
                .with_element(link("Register"), MockElement::new())
                .on_activate(link("Register"), MockEffect::CloseSession);
            let mut fx = Fixture::new(Scenario::Register);
            let (result, _) = fx.run(page, Scenario::Register).await;
            assert!(result.unwrap_err().is_session_closed());
            assert_eq!(fx.captured(), vec!["register_home_page"]);
        }
    }
}
