//! Prune command handler

use crate::commands::PruneArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use std::path::PathBuf;
use visreg::{Scenario, ScreenshotStore};

/// Delete all but the newest screenshots of one scenario
pub fn prune_scenario(args: &PruneArgs) -> CliResult<Vec<PathBuf>> {
    let scenario: Scenario = args.scenario.parse()?;
    let store = ScreenshotStore::new(&args.dir);
    Ok(store.prune(scenario.as_str(), args.keep)?)
}

/// Execute the prune command
pub fn execute_prune(config: &CliConfig, args: &PruneArgs) -> CliResult<()> {
    let removed = prune_scenario(args)?;
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if config.verbosity.is_verbose() {
        for path in &removed {
            reporter.info(&format!("removed {}", path.display()));
        }
    }
    println!("Removed {} screenshots, kept at most {}", removed.len(), args.keep);
    Ok(())
}
