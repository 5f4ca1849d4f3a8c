//! Visreg CLI: screenshot regression runs from the terminal

use clap::Parser;
use std::process::ExitCode;
use visreg_cli::handlers::{
    execute_compare, execute_prune, execute_report, execute_run, execute_scenarios,
};
use visreg_cli::{Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, Verbosity};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    visreg_cli::logging::init(&config);

    match cli.command {
        Commands::Run(args) => execute_run(&config, &args),
        Commands::Compare(args) => execute_compare(&config, &args),
        Commands::Prune(args) => execute_prune(&config, &args).map(|()| true),
        Commands::Scenarios => {
            execute_scenarios();
            Ok(true)
        }
        Commands::Report(args) => execute_report(&args),
        Commands::Gui => run_gui().map(|()| true),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_json(cli.log_json)
}

#[cfg(feature = "gui")]
fn run_gui() -> CliResult<()> {
    let config = visreg::AppConfig::from_env().map_err(|e| CliError::config(e.to_string()))?;
    visreg_cli::gui::launch(config)
}

#[cfg(not(feature = "gui"))]
fn run_gui() -> CliResult<()> {
    Err(CliError::gui(
        "GUI not enabled. Rebuild with --features gui",
    ))
}
