//! Compare command handler

use crate::commands::CompareArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use visreg::{ComparatorConfig, ComparisonResult, ComparisonThresholds, ImageComparator, Verdict};

/// Metric lines for a comparison
#[must_use]
pub fn render_comparison(result: &ComparisonResult, verdict: Verdict) -> Vec<String> {
    let mut lines = vec![
        format!("SSIM:                  {:.4}", result.structural_similarity),
        format!("Histogram correlation: {:.4}", result.histogram_correlation),
        format!("Pixel difference:      {}", result.difference_label()),
        format!("Changed regions:       {}", result.changed_regions.len()),
    ];
    if let Some(path) = &result.diff_image_path {
        lines.push(format!("Diff image:            {}", path.display()));
    }
    lines.push(format!(
        "Verdict:               {}",
        if verdict.is_match() { "match" } else { "different" }
    ));
    lines
}

/// Execute the compare command; `Ok(false)` when the images differ
pub fn execute_compare(config: &CliConfig, args: &CompareArgs) -> CliResult<bool> {
    let comparator =
        ImageComparator::new(ComparatorConfig::default().with_artifact_dir(&args.output));
    let result = comparator.compare(&args.baseline, &args.current)?;
    let verdict = ComparisonThresholds::default().classify(&result);

    for line in render_comparison(&result, verdict) {
        println!("{line}");
    }

    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if verdict.is_match() {
        reporter.success("No significant differences");
    } else {
        reporter.failure(&format!(
            "Differences detected between {} and {}",
            args.baseline.display(),
            args.current.display()
        ));
    }
    Ok(verdict.is_match())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use visreg::Region;

    #[test]
    fn test_render_lines() {
        let result = ComparisonResult {
            structural_similarity: 0.5,
            histogram_correlation: 0.25,
            pixel_diff_percent: 42.0,
            diff_image_path: Some(PathBuf::from("out/diff_image.png")),
            changed_regions: vec![Region::new(0, 0, 4, 4)],
        };
        let lines = render_comparison(&result, Verdict::Different);
        assert_eq!(lines.len(), 6);
        assert!(lines[0].ends_with("0.5000"));
        assert!(lines[2].ends_with("42.00%"));
        assert!(lines[4].contains("diff_image.png"));
        assert!(lines[5].ends_with("different"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = CompareArgs {
            baseline: dir.path().join("a.png"),
            current: dir.path().join("b.png"),
            output: dir.path().to_path_buf(),
        };
        assert!(execute_compare(&CliConfig::new(), &args).is_err());
    }
}
