//! Visreg CLI Library
//!
//! Command-line interface and desktop window for the visreg run pipeline.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod form;
#[cfg(feature = "gui")]
pub mod gui;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{Cli, ColorArg, Commands, CompareArgs, PruneArgs, ReportArgs, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use form::{DataSource, RunForm};
pub use output::ProgressReporter;
