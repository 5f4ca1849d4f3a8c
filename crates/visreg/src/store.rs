//! Screenshot store: one directory per scenario.
//!
//! Files are named `<description>_<YYYYmmdd-HHMMSS>.png`. The store remembers
//! what the current run wrote so that comparison never pairs a capture with
//! itself, and prunes each scenario directory down to the newest files.

use crate::result::{VisregError, VisregResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default root directory for screenshots
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Files kept per scenario after pruning
pub const DEFAULT_KEEP: usize = 4;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A screenshot written during the current run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    /// Scenario directory the file lives in
    pub scenario: String,
    /// Step description used in the file name
    pub description: String,
    /// Capture time
    pub timestamp: DateTime<Local>,
    /// Absolute or root-relative file path
    pub file_path: PathBuf,
}

/// A screenshot file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredScreenshot {
    /// File path
    pub path: PathBuf,
    /// Description component of the file name
    pub description: String,
    /// Creation time (modification time of a write-once file)
    pub created: SystemTime,
}

/// Extract the description component from a screenshot file name
#[must_use]
pub fn description_of(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((description, _)) => description.to_string(),
        None => stem,
    }
}

fn created_at(path: &Path) -> VisregResult<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

/// Screenshot store rooted at a directory
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
    current: Vec<ScreenshotRecord>,
}

impl Default for ScreenshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_SCREENSHOT_DIR)
    }
}

impl ScreenshotStore {
    /// Create a store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: Vec::new(),
        }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one scenario
    #[must_use]
    pub fn scenario_dir(&self, scenario: &str) -> PathBuf {
        self.root.join(scenario)
    }

    /// Forget the records of the previous run
    pub fn begin_run(&mut self) {
        self.current.clear();
    }

    /// Write a screenshot and record it as part of the current run
    pub fn save(
        &mut self,
        scenario: &str,
        description: &str,
        png: &[u8],
    ) -> VisregResult<ScreenshotRecord> {
        if scenario.is_empty() || description.is_empty() {
            return Err(VisregError::InvalidInput {
                message: "scenario and description must be non-empty".to_string(),
            });
        }

        let dir = self.scenario_dir(scenario);
        std::fs::create_dir_all(&dir)?;

        let timestamp = Local::now();
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let mut path = dir.join(format!("{description}_{stamp}.png"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{description}_{stamp}-{n}.png"));
            n += 1;
        }

        std::fs::write(&path, png)?;
        tracing::debug!(scenario, description, "screenshot saved to {}", path.display());

        let record = ScreenshotRecord {
            scenario: scenario.to_string(),
            description: description.to_string(),
            timestamp,
            file_path: path,
        };
        self.current.push(record.clone());
        Ok(record)
    }

    /// This run's records for a scenario, in capture order
    #[must_use]
    pub fn current(&self, scenario: &str) -> Vec<&ScreenshotRecord> {
        self.current
            .iter()
            .filter(|r| r.scenario == scenario)
            .collect()
    }

    /// All of this run's records, in capture order
    #[must_use]
    pub fn current_all(&self) -> &[ScreenshotRecord] {
        &self.current
    }

    /// Scenarios written to during this run, in first-write order
    #[must_use]
    pub fn touched_scenarios(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in &self.current {
            if !out.contains(&record.scenario) {
                out.push(record.scenario.clone());
            }
        }
        out
    }

    fn is_current(&self, path: &Path) -> bool {
        self.current.iter().any(|r| r.file_path == path)
    }

    /// Every `.png` in the scenario directory, oldest first
    pub fn list_all(&self, scenario: &str) -> VisregResult<Vec<StoredScreenshot>> {
        let dir = self.scenario_dir(scenario);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if !is_png || !path.is_file() {
                continue;
            }
            files.push(StoredScreenshot {
                description: description_of(&path),
                created: created_at(&path)?,
                path,
            });
        }
        files.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    /// On-disk screenshots from earlier runs, oldest first
    pub fn list_previous(&self, scenario: &str) -> VisregResult<Vec<StoredScreenshot>> {
        Ok(self
            .list_all(scenario)?
            .into_iter()
            .filter(|f| !self.is_current(&f.path))
            .collect())
    }

    /// Most recent earlier screenshot whose description contains the record's
    pub fn find_baseline(&self, record: &ScreenshotRecord) -> VisregResult<Option<PathBuf>> {
        let current_created = created_at(&record.file_path)?;
        let baseline = self
            .list_previous(&record.scenario)?
            .into_iter()
            .filter(|f| f.description.contains(&record.description))
            .filter(|f| f.created < current_created)
            .max_by(|a, b| a.created.cmp(&b.created))
            .map(|f| f.path);
        Ok(baseline)
    }

    /// Delete all but the newest `keep` screenshots of a scenario
    pub fn prune(&self, scenario: &str, keep: usize) -> VisregResult<Vec<PathBuf>> {
        let files = self.list_all(scenario)?;
        let excess = files.len().saturating_sub(keep);
        let mut removed = Vec::with_capacity(excess);
        for file in files.into_iter().take(excess) {
            std::fs::remove_file(&file.path)?;
            removed.push(file.path);
        }
        if !removed.is_empty() {
            tracing::info!(scenario, removed = removed.len(), "pruned old screenshots");
        }
        Ok(removed)
    }
}
