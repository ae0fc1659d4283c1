/// Single-run forecast driver and shared run plumbing.
///
/// A run: load configuration, collect and process forcing data, run the
/// simulation, detect the bloom date, and append the prediction to the
/// evolution log. When the wind data date is unchanged since the previous
/// run there is nothing new to predict from and the run ends early,
/// successfully.

use chrono::{Local, NaiveDate};
use std::path::Path;
use std::time::Duration;

use crate::bloom;
use crate::config::{CloudFractionMapping, Config, LoggingConfig};
use crate::forcing::{self, FetchOutcome};
use crate::logging::{
    ConsoleSink, EvolutionLog, Logger, LogLevel, LogSink, NotificationSink, RotatingFileSink,
};
use crate::sim;

/// Sender and subject of the operator notification email.
const NOTIFY_SUBJECT: &str = "Warning Message from bloomcast";

/// Timeout for climate / river gauge requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Everything a run needs, built once per invocation.
pub struct RunContext {
    pub config: Config,
    pub mapping: CloudFractionMapping,
    pub logger: Logger,
    pub evolution: EvolutionLog,
    pub client: reqwest::blocking::Client,
    pub today: NaiveDate,
}

/// Build the logging sinks the configuration asks for: console, rotating
/// debug file on disk, and (when recipients are configured) the operator
/// notification channel.
pub fn build_logger(config: &LoggingConfig) -> Logger {
    let console_level = if config.debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut sinks: Vec<Box<dyn LogSink>> = vec![
        Box::new(ConsoleSink::new(console_level)),
        Box::new(RotatingFileSink::new(
            config.log_file.clone(),
            config.log_max_bytes,
        )),
    ];
    if !config.notify_addresses.is_empty() {
        sinks.push(Box::new(NotificationSink::new(
            config.notify_addresses.clone(),
            config.notify_from_address.clone(),
            NOTIFY_SUBJECT.to_string(),
        )));
    }
    Logger::new(sinks)
}

/// Load configuration and build the run context.
pub fn setup(config_file: &Path) -> Result<RunContext, Box<dyn std::error::Error>> {
    let config = Config::load(config_file)?;
    let mapping = CloudFractionMapping::load(&config.climate.meteo.cloud_fraction_mapping)?;
    let logger = build_logger(&config.logging);
    let evolution = EvolutionLog::new(&config.logging.bloom_date_log_file);
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()?;
    Ok(RunContext {
        config,
        mapping,
        logger,
        evolution,
        client,
        today: Local::now().date_naive(),
    })
}

// ---------------------------------------------------------------------------
// Single-run forecast
// ---------------------------------------------------------------------------

/// Execute one forecast run and report its results.
pub fn run(
    config_file: &Path,
    data_date_override: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = setup(config_file)?;
    let result = run_with_context(&context, data_date_override);
    context.logger.shutdown();
    result
}

fn run_with_context(
    context: &RunContext,
    data_date_override: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let RunContext {
        config,
        mapping,
        logger,
        evolution,
        client,
        today,
    } = context;
    logger.debug(
        "bloomcast",
        &format!("run start date is {}", config.run_start_date.format("%Y-%m-%d")),
    );

    let outcome = forcing::get_forcing_data(
        config,
        mapping,
        client,
        logger,
        data_date_override,
        *today,
    )?;
    let data_date = match outcome {
        FetchOutcome::SkippedNoNewData { data_date } => {
            logger.info(
                "bloomcast",
                &format!(
                    "Wind data date {} is unchanged since last run",
                    data_date.format("%Y-%m-%d")
                ),
            );
            return Ok(());
        }
        FetchOutcome::Proceeded { data_date } => data_date,
    };

    if config.run_simulation {
        sim::run_simulation(
            &config.simulation.executable,
            &config.simulation.infile,
            None,
            logger,
        )?;
    } else {
        logger.info("bloomcast", "Skipped running simulation");
    }

    let (bloom_date, bloom_biomass) = bloom::predict_bloom_date(
        &config.simulation.std_bio_ts_outfile,
        config.run_start_date,
        config.simulation.timestep_seconds,
        "avg forcing",
        logger,
    )?;

    // Replay runs that neither fetched data nor simulated do not extend
    // the prediction record.
    if config.get_forcing_data || config.run_simulation {
        evolution.append(&format!(
            "  {}      {}  {:.4}",
            data_date.format("%Y-%m-%d"),
            bloom_date.format("%Y-%m-%d"),
            bloom_biomass
        ))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn logging_config(debug: bool, notify: Vec<String>) -> LoggingConfig {
        let dir = std::env::temp_dir().join("bloomcast_driver_test");
        std::fs::create_dir_all(&dir).unwrap();
        LoggingConfig {
            debug,
            log_file: dir.join("bloomcast.log"),
            log_max_bytes: 1024 * 1024,
            notify_addresses: notify,
            notify_from_address: "bloomcast@example.org".to_string(),
            bloom_date_log_file: dir.join("bloom_date_evolution.log"),
        }
    }

    #[test]
    fn test_build_logger_without_recipients_has_no_notification_sink() {
        // Constructing the logger must not require a mail transport when
        // nobody is configured to be notified.
        let logger = build_logger(&logging_config(false, Vec::new()));
        logger.shutdown(); // no notification flush attempted
    }

    #[test]
    fn test_build_logger_debug_flag_accepted() {
        let logger = build_logger(&logging_config(true, Vec::new()));
        logger.debug("bloomcast", "debug detail visible on console in debug mode");
        logger.shutdown();
    }
}
