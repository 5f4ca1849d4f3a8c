//! Visreg: browser-driven visual regression runs
//!
//! A run drives one scripted scenario through a website in Chromium, captures
//! a screenshot at each step, compares every capture with the closest earlier
//! capture of the same step, writes the verdicts to a spreadsheet and emails
//! it with the images.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    VISREG Run Pipeline                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Screenshot │    │ Image      │            │
//! │   │ (browser)  │───►│ Store      │───►│ Comparator │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │          │                                   │                  │
//! │          ▼                                   ▼                  │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Interactor │    │ Notifier   │◄───│ Report     │            │
//! │   │ (waits)    │    │ (SMTP)     │    │ (.xlsx)    │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use visreg::{AppConfig, Pipeline, RunConfiguration, Scenario};
//!
//! let mut pipeline = Pipeline::new(AppConfig::default().with_email(false));
//! let run = RunConfiguration::new(Scenario::Login, "https://parabank.parasoft.com/", "");
//! let summary = pipeline.run(&run);
//! println!("{} rows, passed: {}", summary.report.rows().len(), summary.passed());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod comparator;
pub mod config;
pub mod data;
pub mod driver;
#[cfg(feature = "health")]
pub mod health;
pub mod locator;
pub mod notifier;
pub mod pipeline;
pub mod report;
mod result;
pub mod scenario;
pub mod store;
pub mod wait;

pub use comparator::{
    ComparatorConfig, ComparisonResult, ComparisonThresholds, ImageComparator, Region, Verdict,
};
pub use config::{AppConfig, RunConfiguration};
pub use data::{FormData, TestData};
#[cfg(feature = "browser")]
pub use driver::CdpDriver;
pub use driver::{DriverConfig, MockDriver, MockEffect, MockElement, PageDriver};
pub use locator::Locator;
pub use notifier::{select_attachments, Notifier, SmtpConfig, SmtpCredentials};
pub use pipeline::{CapturePreview, Pipeline, RunSummary};
pub use report::{read_rows, Report, ReportRow, SheetRow, Status};
pub use result::{VisregError, VisregResult};
pub use scenario::{Scenario, ScenarioTimings};
pub use store::{ScreenshotRecord, ScreenshotStore, StoredScreenshot};
pub use wait::{Interactor, RecordedAction, Selection, WaitOptions};
