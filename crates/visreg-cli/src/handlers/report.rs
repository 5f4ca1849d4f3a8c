//! Report command handler

use crate::commands::ReportArgs;
use crate::error::CliResult;
use visreg::report::COLUMNS;
use visreg::{read_rows, SheetRow, Status};

/// Tab-separated lines, header first
#[must_use]
pub fn render_rows(rows: &[SheetRow]) -> Vec<String> {
    std::iter::once(COLUMNS.join("\t"))
        .chain(rows.iter().map(|row| row.cells.join("\t")))
        .collect()
}

/// Check if every row has the success status
#[must_use]
pub fn all_succeeded(rows: &[SheetRow]) -> bool {
    rows.iter().all(|row| row.cell(1) == Status::Success.as_str())
}

/// Execute the report command; `Ok(false)` when any row failed
pub fn execute_report(args: &ReportArgs) -> CliResult<bool> {
    let rows = read_rows(&args.path)?;
    for line in render_rows(&rows) {
        println!("{line}");
    }
    Ok(all_succeeded(&rows))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use visreg::{Report, ReportRow};

    #[test]
    fn test_round_trip_through_sheet() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test_report.xlsx");
        let mut report = Report::new();
        report.record(ReportRow::check(true, "counter ok"));
        report.record(ReportRow::error("Error: boom"));
        report.export(&path).unwrap();

        let rows = read_rows(&path).unwrap();
        let lines = render_rows(&rows);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(COLUMNS[0]));
        assert!(lines[2].contains("Error: boom"));
        assert!(!all_succeeded(&rows));
        assert!(all_succeeded(&rows[..1]));
    }

    #[test]
    fn test_missing_file() {
        let args = ReportArgs {
            path: std::path::PathBuf::from("/nonexistent/report.xlsx"),
        };
        assert!(execute_report(&args).is_err());
    }
}
