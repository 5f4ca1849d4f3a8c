//! Run report: rows, text table, spreadsheet export.
//!
//! One row per comparison, baseline-less capture, scenario check or error.
//! The same seven columns are used for the console table, the email body and
//! the `.xlsx` export.

use crate::comparator::{ComparisonResult, Verdict};
use crate::result::{VisregError, VisregResult};
use calamine::{open_workbook, Reader, Xlsx};
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Default spreadsheet path
pub const DEFAULT_REPORT_PATH: &str = "test_report.xlsx";

/// Column headers, in order
pub const COLUMNS: [&str; 7] = [
    "Description",
    "Status",
    "Date",
    "Commit Hash",
    "Difference Percentage",
    "Screenshot 1",
    "Screenshot 2",
];

/// Spreadsheet column widths, A through G
pub const COLUMN_WIDTHS: [f64; 7] = [50.0, 15.0, 20.0, 15.0, 20.0, 30.0, 30.0];

/// Reference tag for comparison rows
pub const REFERENCE_TAG: &str = "Master";

/// Placeholder for fields that do not apply
pub const NOT_APPLICABLE: &str = "N/A";

const SHEET_NAME: &str = "Sheet1";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Step or comparison passed
    Success,
    /// Step failed or a difference was detected
    Failure,
}

impl Status {
    /// Display text
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// What happened
    pub description: String,
    /// Outcome
    pub status: Status,
    /// Local time, `YYYY-mm-dd HH:MM:SS`
    pub timestamp: String,
    /// Reference the comparison was made against
    pub reference_tag: String,
    /// Pixel difference, `NN.NN%`
    pub difference_percentage: String,
    /// Baseline file name
    pub screenshot_1: String,
    /// Current file name
    pub screenshot_2: String,
}

fn now() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ReportRow {
    /// Row for a current capture compared with its baseline
    #[must_use]
    pub fn comparison(
        scenario: &str,
        baseline: &Path,
        current: &Path,
        result: &ComparisonResult,
        verdict: Verdict,
    ) -> Self {
        let (before, after) = (file_name(baseline), file_name(current));
        let (description, status) = match verdict {
            Verdict::Different => (
                format!("Differences detected in {scenario}: {before} vs {after}"),
                Status::Failure,
            ),
            Verdict::Match => (
                format!("No significant differences detected between {before} and {after}."),
                Status::Success,
            ),
        };
        Self {
            description,
            status,
            timestamp: now(),
            reference_tag: REFERENCE_TAG.to_string(),
            difference_percentage: result.difference_label(),
            screenshot_1: before,
            screenshot_2: after,
        }
    }

    /// Row for a capture that has nothing earlier to compare with
    #[must_use]
    pub fn no_baseline(scenario: &str, current: &Path) -> Self {
        let after = file_name(current);
        Self {
            description: format!("No baseline for {after} in {scenario}; stored as reference."),
            status: Status::Success,
            timestamp: now(),
            reference_tag: REFERENCE_TAG.to_string(),
            difference_percentage: NOT_APPLICABLE.to_string(),
            screenshot_1: NOT_APPLICABLE.to_string(),
            screenshot_2: after,
        }
    }

    /// Row for a pass/fail check made during a scenario
    #[must_use]
    pub fn check(passed: bool, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: if passed { Status::Success } else { Status::Failure },
            timestamp: now(),
            reference_tag: NOT_APPLICABLE.to_string(),
            difference_percentage: NOT_APPLICABLE.to_string(),
            screenshot_1: NOT_APPLICABLE.to_string(),
            screenshot_2: NOT_APPLICABLE.to_string(),
        }
    }

    /// Failure row for an error
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self::check(false, description)
    }

    /// Cells in column order
    #[must_use]
    pub fn cells(&self) -> [&str; 7] {
        [
            &self.description,
            self.status.as_str(),
            &self.timestamp,
            &self.reference_tag,
            &self.difference_percentage,
            &self.screenshot_1,
            &self.screenshot_2,
        ]
    }
}

/// Rows re-read from an exported spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Cell text in column order
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell by column index, empty when missing
    #[must_use]
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map_or("", String::as_str)
    }
}

/// Accumulated rows of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    rows: Vec<ReportRow>,
}

impl Report {
    /// Create an empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row
    pub fn record(&mut self, row: ReportRow) {
        tracing::debug!(status = %row.status, "{}", row.description);
        self.rows.push(row);
    }

    /// Remove all rows
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Rows in insertion order
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Check if there are no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of failure rows
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == Status::Failure)
            .count()
    }

    /// Number of success rows
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.rows.len() - self.failure_count()
    }

    /// Check if every row succeeded
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failure_count() == 0
    }

    /// Fixed-column text table
    #[must_use]
    pub fn render(&self) -> String {
        let mut widths = COLUMNS.map(str::len);
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row.cells()) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, &COLUMNS, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", rule.join("-+-"));
        for row in &self.rows {
            push_line(&mut out, &row.cells(), &widths);
        }
        out
    }

    /// Write the spreadsheet, replacing `path` atomically
    pub fn export(&self, path: &Path) -> VisregResult<()> {
        let tmp = temp_sibling(path);
        let result = self
            .write_workbook(&tmp)
            .and_then(|()| std::fs::rename(&tmp, path).map_err(VisregError::from));
        if tmp.exists() {
            if let Err(e) = std::fs::remove_file(&tmp) {
                tracing::warn!(error = %e, "could not remove {}", tmp.display());
            }
        }
        result?;
        tracing::info!(rows = self.rows.len(), "report exported to {}", path.display());
        Ok(())
    }

    /// Export, logging instead of returning failures
    pub fn export_logged(&self, path: &Path) -> bool {
        match self.export(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "report export failed for {}", path.display());
                false
            }
        }
    }

    fn write_workbook(&self, path: &Path) -> VisregResult<()> {
        let export_err = |e: rust_xlsxwriter::XlsxError| VisregError::Export {
            message: e.to_string(),
        };

        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME).map_err(export_err)?;

        for (col, (title, width)) in COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
            let col = col as u16;
            sheet
                .write_string_with_format(0, col, *title, &header)
                .map_err(export_err)?;
            sheet.set_column_width(col, width).map_err(export_err)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let r = i as u32 + 1;
            for (col, cell) in row.cells().iter().enumerate() {
                sheet
                    .write_string(r, col as u16, *cell)
                    .map_err(export_err)?;
            }
        }

        workbook.save(path).map_err(export_err)
    }
}

fn push_line(out: &mut String, cells: &[&str], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string());
    let tmp = format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple());
    path.with_file_name(tmp)
}

/// Read the data rows (header excluded) of an exported report
pub fn read_rows(path: &Path) -> VisregResult<Vec<SheetRow>> {
    let read_err = |e: calamine::XlsxError| VisregError::Export {
        message: format!("Failed to read {}: {e}", path.display()),
    };
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(read_err)?;
    let range = workbook.worksheet_range(SHEET_NAME).map_err(read_err)?;
    Ok(range
        .rows()
        .skip(1)
        .map(|cells| SheetRow {
            cells: cells.iter().map(ToString::to_string).collect(),
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metrics(diff: f64) -> ComparisonResult {
        ComparisonResult {
            structural_similarity: 0.9,
            histogram_correlation: 0.9,
            pixel_diff_percent: diff,
            diff_image_path: None,
            changed_regions: Vec::new(),
        }
    }

    fn sample() -> Report {
        let mut report = Report::new();
        report.record(ReportRow::comparison(
            "login",
            Path::new("screenshots/login/login_home_page_20240101-100000.png"),
            Path::new("screenshots/login/login_home_page_20240102-100000.png"),
            &metrics(12.345),
            Verdict::Different,
        ));
        report.record(ReportRow::comparison(
            "login",
            Path::new("a_1.png"),
            Path::new("a_2.png"),
            &metrics(0.5),
            Verdict::Match,
        ));
        report.record(ReportRow::error("Error: Browser window was closed unexpectedly."));
        report
    }

    mod row_tests {
        use super::*;

        #[test]
        fn test_comparison_row_failure() {
            let report = sample();
            let row = &report.rows()[0];
            assert_eq!(row.status, Status::Failure);
            assert_eq!(
                row.description,
                "Differences detected in login: login_home_page_20240101-100000.png vs login_home_page_20240102-100000.png"
            );
            assert_eq!(row.difference_percentage, "12.35%");
            assert_eq!(row.reference_tag, "Master");
            assert_eq!(row.screenshot_1, "login_home_page_20240101-100000.png");
        }

        #[test]
        fn test_comparison_row_success() {
            let report = sample();
            let row = &report.rows()[1];
            assert_eq!(row.status, Status::Success);
            assert!(row.description.starts_with("No significant differences detected between a_1.png"));
        }

        #[test]
        fn test_error_row_defaults() {
            let row = ReportRow::error("Error: boom");
            assert_eq!(row.status, Status::Failure);
            assert_eq!(row.difference_percentage, "N/A");
            assert_eq!(row.reference_tag, "N/A");
            assert_eq!(row.timestamp.len(), 19);
        }

        #[test]
        fn test_no_baseline_row() {
            let row = ReportRow::no_baseline("login", Path::new("x/home_1.png"));
            assert_eq!(row.status, Status::Success);
            assert_eq!(row.screenshot_2, "home_1.png");
            assert!(row.description.contains("No baseline"));
        }
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_counts_and_clear() {
            let mut report = sample();
            assert_eq!(report.failure_count(), 2);
            assert_eq!(report.success_count(), 1);
            assert!(!report.all_passed());
            report.clear();
            assert!(report.is_empty());
            assert!(report.all_passed());
        }

        #[test]
        fn test_render_has_header_and_rows() {
            let text = sample().render();
            let lines: Vec<_> = text.lines().collect();
            assert_eq!(lines.len(), 2 + 3);
            assert!(lines[0].starts_with("Description"));
            assert!(lines[0].contains("Commit Hash"));
            assert!(lines[1].starts_with("---"));
            assert!(lines[4].contains("Browser window was closed"));
        }

        #[test]
        fn test_render_empty() {
            let text = Report::new().render();
            assert_eq!(text.lines().count(), 2);
        }
    }

    mod export_tests {
        use super::*;

        #[test]
        fn test_export_round_trip() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("test_report.xlsx");
            let report = sample();
            report.export(&path).unwrap();

            let rows = read_rows(&path).unwrap();
            assert_eq!(rows.len(), 3);
            for (sheet, row) in rows.iter().zip(report.rows()) {
                assert_eq!(sheet.cell(0), row.description);
                assert_eq!(sheet.cell(1), row.status.as_str());
                assert_eq!(sheet.cell(4), row.difference_percentage);
            }
            assert_eq!(rows[0].cell(4), "12.35%");
        }

        #[test]
        fn test_export_leaves_no_temp_files() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("test_report.xlsx");
            sample().export(&path).unwrap();
            sample().export(&path).unwrap();

            let names: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, vec!["test_report.xlsx"]);
        }

        #[test]
        fn test_export_failure_is_logged_not_raised() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("missing_dir").join("report.xlsx");
            assert!(!sample().export_logged(&path));
            assert!(sample().export(&path).is_err());
        }

        #[test]
        fn test_failed_replace_removes_temp_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("test_report.xlsx");
            std::fs::create_dir(&path).unwrap();
            std::fs::write(path.join("keep.txt"), b"x").unwrap();

            assert!(!sample().export_logged(&path));
            assert!(path.is_dir());
            let leftovers: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".tmp"))
                .collect();
            assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
        }
    }
}
