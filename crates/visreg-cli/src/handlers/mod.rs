//! Command handlers - extracted from main.rs for testability

pub mod compare;
pub mod prune;
pub mod report;
pub mod run;
pub mod scenarios;

pub use compare::{execute_compare, render_comparison};
pub use prune::{execute_prune, prune_scenario};
pub use report::{all_succeeded, execute_report, render_rows};
pub use run::{build_run, execute_run, print_summary};
pub use scenarios::{execute_scenarios, render_scenarios};
