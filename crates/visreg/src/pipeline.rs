//! One run, end to end.
//!
//! Validate input, drive the scenario in a browser session, compare every
//! capture with its baseline, then export, email and prune. Only a missing
//! website aborts the run; every later failure becomes a report row or a log
//! line.

use crate::comparator::{ComparatorConfig, ImageComparator};
use crate::config::{AppConfig, RunConfiguration};
use crate::data::{resolve_form_data, FormData, TestData};
#[cfg(feature = "browser")]
use crate::driver::CdpDriver;
use crate::driver::PageDriver;
use crate::notifier::{report_body, select_attachments, Notifier, SmtpCredentials, REPORT_SUBJECT};
use crate::report::{Report, ReportRow};
use crate::result::{VisregError, VisregResult};
use crate::scenario::ScenarioRun;
use crate::store::{ScreenshotRecord, ScreenshotStore};
use crate::wait::{Interactor, RecordedAction};
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};
use uuid::Uuid;

/// Row recorded when no website is given
pub const MISSING_WEBSITE_MESSAGE: &str = "Website Error: Please provide a website URL.";

/// Row recorded when the browser window disappears
pub const WINDOW_CLOSED_MESSAGE: &str = "Error: Browser window was closed unexpectedly.";

/// A capture with its PNG bytes, read before pruning
#[derive(Debug, Clone)]
pub struct CapturePreview {
    /// Capture record
    pub record: ScreenshotRecord,
    /// PNG bytes
    pub png: Vec<u8>,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Run identifier (also the tracing span field)
    pub run_id: Uuid,
    /// Report rows
    pub report: Report,
    /// Screenshots written by this run
    pub captures: Vec<ScreenshotRecord>,
    /// Capture bytes, when previews were requested
    pub previews: Vec<CapturePreview>,
    /// Browser interactions
    pub actions: Vec<RecordedAction>,
    /// Spreadsheet written
    pub exported: bool,
    /// Email outcome; `None` when no email was attempted
    pub notified: Option<bool>,
    /// Files removed by pruning
    pub pruned: Vec<PathBuf>,
    /// Wall time
    pub elapsed: Duration,
}

impl RunSummary {
    /// Check if every row succeeded
    #[must_use]
    pub fn passed(&self) -> bool {
        self.report.all_passed()
    }
}

/// Run orchestrator
#[derive(Debug)]
pub struct Pipeline {
    config: AppConfig,
    store: ScreenshotStore,
    report: Report,
}

impl Pipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let store = ScreenshotStore::new(&config.screenshot_dir);
        Self {
            config,
            store,
            report: Report::new(),
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run against a real Chromium
    pub fn run(&mut self, run: &RunConfiguration) -> RunSummary {
        #[cfg(feature = "browser")]
        {
            let driver_config = self.config.driver.clone();
            self.run_with_launcher(run, move || async move {
                CdpDriver::launch(&driver_config).await
            })
            .0
        }
        #[cfg(not(feature = "browser"))]
        {
            self.run_with_launcher(run, || async {
                Err::<crate::driver::MockDriver, _>(VisregError::BrowserLaunch {
                    message: "built without the browser feature".to_string(),
                })
            })
            .0
        }
    }

    /// Run with a given driver; the driver is handed back closed
    pub fn run_with_driver<D: PageDriver>(
        &mut self,
        run: &RunConfiguration,
        driver: D,
    ) -> (RunSummary, Option<D>) {
        self.run_with_launcher(run, move || async move { Ok(driver) })
    }

    fn run_with_launcher<D, F, Fut>(
        &mut self,
        run: &RunConfiguration,
        launch: F,
    ) -> (RunSummary, Option<D>)
    where
        D: PageDriver,
        F: FnOnce() -> Fut,
        Fut: Future<Output = VisregResult<D>>,
    {
        let started = Instant::now();
        let started_at = SystemTime::now();
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, scenario = %run.scenario);
        let _guard = span.enter();

        self.report.clear();
        self.store.begin_run();

        if run.website_url.trim().is_empty() {
            tracing::warn!("no website given, run aborted");
            self.report.record(ReportRow::error(MISSING_WEBSITE_MESSAGE));
            return (self.summary(run_id, started, Vec::new(), false), None);
        }

        tracing::info!(website = %run.website_url, "run started");
        let form = self.form_data(run);

        let (actions, driver) = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.browser_phase(run, &form, launch)),
            Err(e) => {
                self.record_failure(&VisregError::from(e));
                (Vec::new(), None)
            }
        };

        self.compare_captures();
        let previews = self.collect_previews();
        self.write_actions(&actions);

        let exported = self.report.export_logged(&self.config.report_path);
        let notified = self.notify(run, started_at);
        let pruned = self.prune();

        let mut summary = self.summary(run_id, started, actions, exported);
        summary.previews = previews;
        summary.notified = notified;
        summary.pruned = pruned;
        tracing::info!(
            rows = summary.report.rows().len(),
            failures = summary.report.failure_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run finished"
        );
        (summary, driver)
    }

    fn summary(
        &self,
        run_id: Uuid,
        started: Instant,
        actions: Vec<RecordedAction>,
        exported: bool,
    ) -> RunSummary {
        RunSummary {
            run_id,
            report: self.report.clone(),
            captures: self.store.current_all().to_vec(),
            previews: Vec::new(),
            actions,
            exported,
            notified: None,
            pruned: Vec::new(),
            elapsed: started.elapsed(),
        }
    }

    fn form_data(&self, run: &RunConfiguration) -> FormData {
        let supplied = if run.use_custom_data {
            run.form_data.clone()
        } else {
            TestData::load(&self.config.test_data_path).for_scenario(run.scenario)
        };
        resolve_form_data(run.scenario, &supplied)
    }

    fn record_failure(&mut self, error: &VisregError) {
        tracing::error!(error = %error, "scenario failed");
        let message = if error.is_session_closed() {
            WINDOW_CLOSED_MESSAGE.to_string()
        } else {
            format!("Error: {error}")
        };
        self.report.record(ReportRow::error(message));
    }

    async fn browser_phase<D, F, Fut>(
        &mut self,
        run: &RunConfiguration,
        form: &FormData,
        launch: F,
    ) -> (Vec<RecordedAction>, Option<D>)
    where
        D: PageDriver,
        F: FnOnce() -> Fut,
        Fut: Future<Output = VisregResult<D>>,
    {
        #[cfg(feature = "health")]
        if self.config.health_check {
            crate::health::probe_logged(&run.website_url).await;
        }

        let driver = match launch().await {
            Ok(driver) => driver,
            Err(e) => {
                self.record_failure(&e);
                return (Vec::new(), None);
            }
        };

        let mut interactor = Interactor::new(driver, self.config.wait);
        if let Err(e) = interactor.clear_browser_data().await {
            tracing::warn!(error = %e, "could not clear browser data");
        }

        let result = ScenarioRun {
            interactor: &mut interactor,
            store: &mut self.store,
            report: &mut self.report,
            scenario: run.scenario,
            website: &run.website_url,
            data: form,
            timings: self.config.timings,
        }
        .execute()
        .await;

        if let Err(e) = result {
            self.record_failure(&e);
        }

        if let Err(e) = interactor.close().await {
            tracing::warn!(error = %e, "browser did not close cleanly");
        }
        let (driver, actions) = interactor.into_parts();
        (actions, Some(driver))
    }

    fn compare_captures(&mut self) {
        let comparator = ImageComparator::new(
            ComparatorConfig::default().with_artifact_dir(&self.config.artifact_dir),
        );
        let captures = self.store.current_all().to_vec();
        for record in &captures {
            let row = match self.store.find_baseline(record) {
                Ok(Some(baseline)) => match comparator.compare(&baseline, &record.file_path) {
                    Ok(result) => {
                        let verdict = self.config.thresholds.classify(&result);
                        ReportRow::comparison(
                            &record.scenario,
                            &baseline,
                            &record.file_path,
                            &result,
                            verdict,
                        )
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "comparison failed for {}", record.file_path.display());
                        ReportRow::error(format!("Error comparing {}: {e}", record.description))
                    }
                },
                Ok(None) => {
                    tracing::info!(description = %record.description, "no baseline");
                    ReportRow::no_baseline(&record.scenario, &record.file_path)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "baseline lookup failed");
                    ReportRow::error(format!("Error finding baseline for {}: {e}", record.description))
                }
            };
            self.report.record(row);
        }
    }

    fn collect_previews(&self) -> Vec<CapturePreview> {
        if !self.config.collect_previews {
            return Vec::new();
        }
        self.store
            .current_all()
            .iter()
            .filter_map(|record| match std::fs::read(&record.file_path) {
                Ok(png) => Some(CapturePreview {
                    record: record.clone(),
                    png,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read {}", record.file_path.display());
                    None
                }
            })
            .collect()
    }

    fn write_actions(&self, actions: &[RecordedAction]) {
        let Some(path) = &self.config.actions_path else {
            return;
        };
        let written = serde_json::to_string_pretty(actions)
            .map_err(VisregError::from)
            .and_then(|json| std::fs::write(path, json).map_err(VisregError::from));
        match written {
            Ok(()) => tracing::info!(actions = actions.len(), "actions written to {}", path.display()),
            Err(e) => tracing::warn!(error = %e, "could not write actions to {}", path.display()),
        }
    }

    fn notify(&self, run: &RunConfiguration, started_at: SystemTime) -> Option<bool> {
        if !self.config.send_email {
            return None;
        }
        if run.recipient_email.trim().is_empty() {
            tracing::warn!("no recipient, email skipped");
            return None;
        }
        let credentials = match SmtpCredentials::load(&self.config.credentials_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "email skipped");
                return Some(false);
            }
        };

        let screenshots: Vec<PathBuf> = self
            .store
            .current_all()
            .iter()
            .map(|r| r.file_path.clone())
            .collect();
        let highlight = ComparatorConfig::default()
            .with_artifact_dir(&self.config.artifact_dir)
            .highlight_image_path();
        let attachments =
            select_attachments(&self.config.report_path, &screenshots, &highlight, started_at);

        let notifier = Notifier::new(self.config.smtp.clone(), credentials);
        Some(notifier.send_logged(
            REPORT_SUBJECT,
            &report_body(&self.report),
            run.recipient_email.trim(),
            &attachments,
        ))
    }

    fn prune(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for scenario in self.store.touched_scenarios() {
            match self.store.prune(&scenario, self.config.keep) {
                Ok(mut files) => removed.append(&mut files),
                Err(e) => tracing::warn!(scenario, error = %e, "pruning failed"),
            }
        }
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::comparator::HIGHLIGHT_IMAGE_NAME;
    use crate::driver::{placeholder_png, MockDriver, MockEffect};
    use crate::locator::Locator;
    use crate::report::{read_rows, Status};
    use crate::scenario::tests::{bank_page, fast_waits, visual_page};
    use crate::scenario::{Scenario, ScenarioTimings};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig::default()
            .with_screenshot_dir(dir.path().join("screenshots"))
            .with_report_path(dir.path().join("test_report.xlsx"))
            .with_artifact_dir(dir.path())
            .with_test_data_path(dir.path().join("test_data.json"))
            .with_credentials_path(dir.path().join("config.ini"))
            .with_wait(fast_waits())
            .with_timings(ScenarioTimings::immediate())
            .with_email(false)
            .with_health_check(false)
    }

    fn visual_run() -> RunConfiguration {
        RunConfiguration::new(Scenario::VisualTest, "https://demo.test/", "qa@example.com")
    }

    fn set_age(path: &std::path::Path, secs: u64) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_empty_website_aborts() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let run = RunConfiguration::new(Scenario::Login, "  ", "qa@example.com");
            let (summary, driver) = pipeline.run_with_driver(&run, MockDriver::new());

            assert!(driver.is_none());
            assert_eq!(summary.report.rows().len(), 1);
            assert_eq!(summary.report.rows()[0].description, MISSING_WEBSITE_MESSAGE);
            assert!(!summary.passed());
            assert!(!summary.exported);
            assert!(summary.captures.is_empty());
        }
    }

    mod run_tests {
        use super::*;

        #[test]
        fn test_first_run_has_no_baselines() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let (summary, driver) = pipeline.run_with_driver(&visual_run(), visual_page(4));

            let driver = driver.unwrap();
            assert!(driver.is_closed());
            assert_eq!(driver.call_history()[0], "clear_browser_data");
            assert!(summary.passed());
            assert_eq!(summary.captures.len(), 3);
            assert_eq!(summary.report.rows().len(), 4);
            assert!(summary.report.rows()[1..]
                .iter()
                .all(|r| r.description.contains("No baseline")));
            assert!(summary.exported);
            assert_eq!(read_rows(&dir.path().join("test_report.xlsx")).unwrap().len(), 4);
            assert!(summary.notified.is_none());
        }

        #[test]
        fn test_second_run_compares_and_prunes() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let (first, _) = pipeline.run_with_driver(&visual_run(), visual_page(4));
            for capture in &first.captures {
                set_age(&capture.file_path, 120);
            }

            let (second, _) = pipeline.run_with_driver(&visual_run(), visual_page(4));
            assert!(second.passed());
            let compared: Vec<_> = second
                .report
                .rows()
                .iter()
                .filter(|r| r.description.starts_with("No significant differences"))
                .collect();
            assert_eq!(compared.len(), 3);
            assert!(compared.iter().all(|r| r.difference_percentage == "0.00%"));
            assert_eq!(second.pruned.len(), 2);
            assert!(second.pruned.iter().all(|p| !p.exists()));
        }

        #[test]
        fn test_changed_page_is_reported() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let baseline_dir = dir.path().join("screenshots").join("visual_test");
            std::fs::create_dir_all(&baseline_dir).unwrap();
            let baseline = baseline_dir.join("visual_test_initial_20200101-000000.png");
            std::fs::write(&baseline, placeholder_png(32, 24, 50).unwrap()).unwrap();
            set_age(&baseline, 600);

            let (summary, _) = pipeline.run_with_driver(&visual_run(), visual_page(4));
            let row = summary
                .report
                .rows()
                .iter()
                .find(|r| r.description.starts_with("Differences detected in visual_test"))
                .unwrap();
            assert_eq!(row.status, Status::Failure);
            assert_eq!(row.difference_percentage, "100.00%");
            assert_eq!(row.screenshot_1, "visual_test_initial_20200101-000000.png");
            assert!(dir.path().join(HIGHLIGHT_IMAGE_NAME).exists());
            assert!(!summary.passed());
        }

        #[test]
        fn test_failed_check_fails_run() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let (summary, _) = pipeline.run_with_driver(&visual_run(), visual_page(7));
            assert!(!summary.passed());
            assert_eq!(summary.report.failure_count(), 1);
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_closed_window_row_and_cleanup() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let page = bank_page().on_activate(Locator::name("password"), MockEffect::CloseSession);
            let run = RunConfiguration::new(Scenario::Login, "https://bank.test/", "qa@example.com");
            let (summary, driver) = pipeline.run_with_driver(&run, page);

            assert!(driver.unwrap().is_closed());
            let errors: Vec<_> = summary
                .report
                .rows()
                .iter()
                .filter(|r| r.description == WINDOW_CLOSED_MESSAGE)
                .collect();
            assert_eq!(errors.len(), 1);
            // the capture taken before the window closed is still compared
            assert_eq!(summary.captures.len(), 1);
            assert!(summary.exported);
        }

        #[test]
        fn test_other_errors_are_prefixed() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let (summary, _) = pipeline.run_with_driver(&visual_run(), MockDriver::new());
            let first = &summary.report.rows()[0];
            assert!(first.description.starts_with("Error: Timed out"));
        }

        #[test]
        fn test_missing_credentials_do_not_abort() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir).with_email(true));
            let (summary, _) = pipeline.run_with_driver(&visual_run(), visual_page(4));
            assert_eq!(summary.notified, Some(false));
            assert!(summary.exported);
        }
    }

    mod data_tests {
        use super::*;

        #[test]
        fn test_custom_data_reaches_form() {
            let dir = TempDir::new().unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let mut data = FormData::new();
            data.insert("username".into(), "custom_user".into());
            let run = RunConfiguration::new(Scenario::Login, "https://bank.test/", "")
                .with_custom_data(data);
            let (_, driver) = pipeline.run_with_driver(&run, bank_page());
            let driver = driver.unwrap();
            assert_eq!(
                driver.element(&Locator::name("username")).unwrap().value,
                "custom_user"
            );
        }

        #[test]
        fn test_test_data_file_is_used() {
            let dir = TempDir::new().unwrap();
            std::fs::write(
                dir.path().join("test_data.json"),
                r#"{"login": {"username": "from_file", "password": "pw"}}"#,
            )
            .unwrap();
            let mut pipeline = Pipeline::new(config(&dir));
            let run = RunConfiguration::new(Scenario::Login, "https://bank.test/", "");
            let (_, driver) = pipeline.run_with_driver(&run, bank_page());
            let driver = driver.unwrap();
            assert_eq!(driver.element(&Locator::name("password")).unwrap().value, "pw");
        }

        #[test]
        fn test_actions_and_previews() {
            let dir = TempDir::new().unwrap();
            let actions = dir.path().join("actions.json");
            let mut pipeline = Pipeline::new(
                config(&dir)
                    .with_actions_path(&actions)
                    .with_previews(true)
                    .with_keep(0),
            );
            let (summary, _) = pipeline.run_with_driver(&visual_run(), visual_page(4));

            let json = std::fs::read_to_string(&actions).unwrap();
            let parsed: Vec<RecordedAction> = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.len(), summary.actions.len());
            assert!(!parsed.is_empty());
            // previews survive pruning of every file
            assert_eq!(summary.previews.len(), 3);
            assert_eq!(summary.pruned.len(), 3);
        }
    }
}
