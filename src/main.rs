//! bloomcast - spring phytoplankton bloom forecast service.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "bloomcast",
    version,
    about = "Operational prediction of the strait's spring phytoplankton bloom"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single bloom forecast
    Run {
        /// Path and name of the configuration file
        config_file: PathBuf,
        /// Forcing data date for development and debugging; overridden if
        /// wind forcing data is collected and processed
        #[arg(long, value_parser = parse_data_date)]
        data_date: Option<NaiveDate>,
    },
    /// Run an ensemble forecast across historical forcing years
    Ensemble {
        /// Path and name of the configuration file
        config_file: PathBuf,
        /// Forcing data date for development and debugging; overridden if
        /// wind forcing data is collected and processed
        #[arg(long, value_parser = parse_data_date)]
        data_date: Option<NaiveDate>,
    },
}

fn parse_data_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD for data date, got: {}", raw))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config_file, data_date } => {
            bloomcast_service::driver::run(&config_file, data_date)
        }
        Command::Ensemble { config_file, data_date } => {
            bloomcast_service::ensemble::run(&config_file, data_date)
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bloomcast: {}", e);
            ExitCode::FAILURE
        }
    }
}
