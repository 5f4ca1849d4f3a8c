//! Application and run configuration.
//!
//! [`AppConfig`] holds everything that stays fixed across runs (paths, SMTP,
//! browser, waits). [`RunConfiguration`] is what the user fills in for one run.
//! Both are plain values handed to the pipeline.

use crate::comparator::ComparisonThresholds;
use crate::data::{FormData, DEFAULT_TEST_DATA_PATH};
use crate::driver::DriverConfig;
use crate::notifier::SmtpConfig;
use crate::report::DEFAULT_REPORT_PATH;
use crate::result::{VisregError, VisregResult};
use crate::scenario::{Scenario, ScenarioTimings};
use crate::store::{DEFAULT_KEEP, DEFAULT_SCREENSHOT_DIR};
use crate::wait::WaitOptions;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Credentials file name, looked up on the desktop
pub const CREDENTIALS_FILE_NAME: &str = "config.ini";

/// `~/Desktop/config.ini`, or `config.ini` when no home directory is known
#[must_use]
pub fn default_credentials_path() -> PathBuf {
    UserDirs::new()
        .map(|dirs| {
            dirs.desktop_dir()
                .map_or_else(|| dirs.home_dir().join("Desktop"), std::path::Path::to_path_buf)
        })
        .map_or_else(
            || PathBuf::from(CREDENTIALS_FILE_NAME),
            |desktop| desktop.join(CREDENTIALS_FILE_NAME),
        )
}

/// Settings shared by every run
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Screenshot root
    pub screenshot_dir: PathBuf,
    /// Spreadsheet output
    pub report_path: PathBuf,
    /// Directory for the diff map and highlight artifact
    pub artifact_dir: PathBuf,
    /// Test data file
    pub test_data_path: PathBuf,
    /// INI credentials file
    pub credentials_path: PathBuf,
    /// SMTP relay
    pub smtp: SmtpConfig,
    /// Screenshots kept per scenario
    pub keep: usize,
    /// Browser launch settings
    pub driver: DriverConfig,
    /// Element waits
    pub wait: WaitOptions,
    /// Delays inside flows
    pub timings: ScenarioTimings,
    /// Verdict thresholds
    pub thresholds: ComparisonThresholds,
    /// Email the report after the run
    pub send_email: bool,
    /// Probe the site before launching the browser
    pub health_check: bool,
    /// Write the action log here as JSON
    pub actions_path: Option<PathBuf>,
    /// Keep capture bytes in the run summary for display
    pub collect_previews: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            artifact_dir: PathBuf::from("."),
            test_data_path: PathBuf::from(DEFAULT_TEST_DATA_PATH),
            credentials_path: default_credentials_path(),
            smtp: SmtpConfig::default(),
            keep: DEFAULT_KEEP,
            driver: DriverConfig::default(),
            wait: WaitOptions::default(),
            timings: ScenarioTimings::default(),
            thresholds: ComparisonThresholds::default(),
            send_email: true,
            health_check: true,
            actions_path: None,
            collect_previews: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> VisregResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| VisregError::InvalidInput {
        message: format!("{name}={raw:?}: {e}"),
    })
}

fn parse_flag(name: &str, raw: &str) -> VisregResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VisregError::InvalidInput {
            message: format!("{name}={raw:?}: expected true or false"),
        }),
    }
}

impl AppConfig {
    /// Defaults overridden by `VISREG_*` environment variables
    pub fn from_env() -> VisregResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> VisregResult<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup("VISREG_SCREENSHOT_DIR") {
            config.screenshot_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISREG_REPORT_PATH") {
            config.report_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISREG_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISREG_TEST_DATA") {
            config.test_data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISREG_CREDENTIALS") {
            config.credentials_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISREG_SMTP_HOST") {
            config.smtp.host = v;
        }
        if let Some(v) = lookup("VISREG_SMTP_PORT") {
            config.smtp.port = parse_var("VISREG_SMTP_PORT", &v)?;
        }
        if let Some(v) = lookup("VISREG_KEEP") {
            config.keep = parse_var("VISREG_KEEP", &v)?;
        }
        if let Some(v) = lookup("VISREG_HEADLESS") {
            config.driver.headless = parse_flag("VISREG_HEADLESS", &v)?;
        }
        if let Some(v) = lookup("VISREG_CHROMIUM") {
            config.driver.chromium_path = Some(PathBuf::from(v));
        }
        Ok(config)
    }

    /// Set screenshot root
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Set spreadsheet path
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    /// Set artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set test data path
    #[must_use]
    pub fn with_test_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_data_path = path.into();
        self
    }

    /// Set credentials path
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Set screenshots kept per scenario
    #[must_use]
    pub const fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    /// Set browser settings
    #[must_use]
    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Set wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set flow delays
    #[must_use]
    pub const fn with_timings(mut self, timings: ScenarioTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Enable or disable email delivery
    #[must_use]
    pub const fn with_email(mut self, enabled: bool) -> Self {
        self.send_email = enabled;
        self
    }

    /// Enable or disable the health probe
    #[must_use]
    pub const fn with_health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    /// Write the action log to a file
    #[must_use]
    pub fn with_actions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.actions_path = Some(path.into());
        self
    }

    /// Keep capture bytes in the run summary
    #[must_use]
    pub const fn with_previews(mut self, enabled: bool) -> Self {
        self.collect_previews = enabled;
        self
    }
}

/// What the user chose for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Flow to execute
    pub scenario: Scenario,
    /// Site entry point
    pub website_url: String,
    /// Report recipient
    pub recipient_email: String,
    /// Use `form_data` instead of the test data file
    pub use_custom_data: bool,
    /// Custom form values
    pub form_data: FormData,
}

impl RunConfiguration {
    /// Run with test data from file
    #[must_use]
    pub fn new(
        scenario: Scenario,
        website_url: impl Into<String>,
        recipient_email: impl Into<String>,
    ) -> Self {
        Self {
            scenario,
            website_url: website_url.into(),
            recipient_email: recipient_email.into(),
            use_custom_data: false,
            form_data: FormData::new(),
        }
    }

    /// Use custom form values
    #[must_use]
    pub fn with_custom_data(mut self, form_data: FormData) -> Self {
        self.use_custom_data = true;
        self.form_data = form_data;
        self
    }
}
