//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Visreg: run scripted browser scenarios and flag visual regressions
#[derive(Parser, Debug)]
#[command(name = "visreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario, compare captures and report
    Run(RunArgs),

    /// Compare two screenshots
    Compare(CompareArgs),

    /// Delete old screenshots of a scenario
    Prune(PruneArgs),

    /// List scenarios and their custom data fields
    Scenarios,

    /// Print the rows of an exported report
    Report(ReportArgs),

    /// Open the desktop window
    Gui,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario to run
    #[arg(short, long)]
    pub scenario: String,

    /// Website entry point (required; an empty value records an error row and aborts the run)
    #[arg(short, long, default_value = "")]
    pub website: String,

    /// Report recipient (required for email; an empty value skips sending)
    #[arg(short, long, default_value = "")]
    pub email: String,

    /// Test data file (JSON keyed by scenario)
    #[arg(long, env = "VISREG_TEST_DATA")]
    pub data: Option<PathBuf>,

    /// Custom form value; switches the run to custom data
    #[arg(short, long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    /// Skip email delivery
    #[arg(long)]
    pub no_email: bool,

    /// Write the recorded browser actions to this JSON file
    #[arg(long)]
    pub actions: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Baseline image
    pub baseline: PathBuf,

    /// Current image
    pub current: PathBuf,

    /// Directory for the diff map and highlight image
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// Arguments for the prune command
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Scenario directory to prune
    #[arg(short, long)]
    pub scenario: String,

    /// Screenshots to keep
    #[arg(short, long, default_value_t = visreg::store::DEFAULT_KEEP)]
    pub keep: usize,

    /// Screenshot root
    #[arg(long, env = "VISREG_SCREENSHOT_DIR", default_value = visreg::store::DEFAULT_SCREENSHOT_DIR)]
    pub dir: PathBuf,
}

/// Arguments for the report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Spreadsheet to read
    #[arg(default_value = visreg::report::DEFAULT_REPORT_PATH)]
    pub path: PathBuf,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
