//! Run command handler

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use visreg::data::parse_field;
use visreg::{AppConfig, FormData, Pipeline, RunConfiguration, RunSummary, Scenario};

/// Apply the run arguments to a base configuration
pub fn build_run(args: &RunArgs, base: AppConfig) -> CliResult<(AppConfig, RunConfiguration)> {
    let scenario: Scenario = args.scenario.parse()?;

    let mut config = base.with_email(!args.no_email);
    if let Some(path) = &args.data {
        config = config.with_test_data_path(path);
    }
    if let Some(path) = &args.actions {
        config = config.with_actions_path(path);
    }
    if args.headed {
        config.driver = config.driver.with_headless(false);
    }

    let mut run = RunConfiguration::new(scenario, args.website.as_str(), args.email.as_str());
    if !args.fields.is_empty() {
        let mut form = FormData::new();
        for pair in &args.fields {
            let (key, value) =
                parse_field(pair).map_err(|e| CliError::invalid_argument(e.to_string()))?;
            form.insert(key, value);
        }
        run = run.with_custom_data(form);
    }
    Ok((config, run))
}

/// Print a finished run
pub fn print_summary(reporter: &ProgressReporter, summary: &RunSummary) {
    reporter.header("Report");
    for row in summary.report.rows() {
        reporter.row(row);
    }
    if summary.exported {
        reporter.info(&format!("{} screenshots captured", summary.captures.len()));
    } else if !summary.captures.is_empty() {
        reporter.warning("Report spreadsheet was not written");
    }
    match summary.notified {
        Some(true) => reporter.info("Report emailed"),
        Some(false) => reporter.warning("Report email was not sent"),
        None => {}
    }
    if !summary.pruned.is_empty() {
        reporter.info(&format!("Pruned {} old screenshots", summary.pruned.len()));
    }
    reporter.summary(
        summary.report.success_count(),
        summary.report.failure_count(),
        summary.elapsed,
    );
}

/// Execute the run command; `Ok(false)` when any row failed
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<bool> {
    let base = AppConfig::from_env().map_err(|e| CliError::config(e.to_string()))?;
    let (app_config, run) = build_run(args, base)?;

    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.start_spinner(&format!("Running {}", run.scenario));
    let summary = Pipeline::new(app_config).run(&run);
    reporter.finish();

    print_summary(&reporter, &summary);
    Ok(summary.passed())
}
