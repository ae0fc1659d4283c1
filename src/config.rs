/// Run configuration for the bloom forecasting service.
///
/// One statically-typed struct per subsystem, deserialized from a single
/// TOML file. Unknown keys are rejected and required keys must be present —
/// the numeric pipeline downstream assumes a fully-populated configuration,
/// so nothing here is best-effort.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::stations::{self, StationKind};

// ---------------------------------------------------------------------------
// Configuration structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Start date of the simulation run (the autumn before the bloom year).
    pub run_start_date: NaiveDate,
    /// Collect and process forcing data? Off for replaying existing files.
    pub get_forcing_data: bool,
    /// Run the external simulation? Off for re-analyzing existing results.
    pub run_simulation: bool,
    /// State file recording the forcing data date of the previous run.
    pub wind_data_date_file: PathBuf,
    pub climate: ClimateConfig,
    pub rivers: RiversConfig,
    pub simulation: SimulationConfig,
    pub ensemble: EnsembleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClimateConfig {
    /// Base URL of the climate data web service bulk download endpoint.
    pub url: String,
    pub meteo: MeteoConfig,
    pub wind: WindConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeteoConfig {
    pub station_id: String,
    /// Meteorological quantities to process; each needs an output file.
    pub quantities: Vec<String>,
    /// TOML file mapping weather descriptions to cloud fraction values.
    pub cloud_fraction_mapping: PathBuf,
    pub output_files: HashMap<String, PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindConfig {
    pub station_id: String,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiversConfig {
    /// Base URL of the river gauge web service.
    pub data_url: String,
    /// Cookie acknowledging the service's data disclaimer.
    pub disclaimer_cookie: String,
    pub major: RiverGaugeConfig,
    pub minor: RiverGaugeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiverGaugeConfig {
    pub station_id: String,
    /// Multiplier applied to each raw reading before daily averaging.
    /// Used to substitute a correlated gauge for a discontinued one.
    pub scale_factor: Option<f64>,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub executable: PathBuf,
    /// Base input deck for the simulation.
    pub infile: PathBuf,
    /// Simulation timestep in seconds; must divide one day exactly.
    pub timestep_seconds: u32,
    /// Biology time series output file declared in the input deck.
    pub std_bio_ts_outfile: PathBuf,
    /// Physics time series output file declared in the input deck.
    pub std_phys_ts_outfile: PathBuf,
    /// Depth profile snapshots output file declared in the input deck.
    pub hoffmueller_outfile: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsembleConfig {
    /// First historical forcing year used as an ensemble member.
    pub start_year: i32,
    /// Last historical forcing year used as an ensemble member, inclusive.
    pub end_year: i32,
    pub max_concurrent_jobs: usize,
    /// Interval between completion checks of running members, in seconds.
    pub poll_interval_seconds: u64,
    /// Input deck that each member's edit file is applied on top of.
    pub base_infile: PathBuf,
    pub forcing_file_roots: ForcingFileRoots,
}

/// Path roots for per-member historical forcing files; each member year's
/// two-digit suffix is appended to these.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForcingFileRoots {
    pub wind: PathBuf,
    pub air_temperature: PathBuf,
    pub cloud_fraction: PathBuf,
    pub relative_humidity: PathBuf,
    pub major_river: PathBuf,
    pub minor_river: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Show debug detail on the console as well as in the disk log.
    pub debug: bool,
    pub log_file: PathBuf,
    /// Disk log size at which the file is rotated.
    #[serde(default = "default_log_max_bytes")]
    pub log_max_bytes: u64,
    /// Operator addresses for warning/error notification email; empty
    /// disables the notification channel.
    pub notify_addresses: Vec<String>,
    pub notify_from_address: String,
    pub bloom_date_log_file: PathBuf,
}

fn default_log_max_bytes() -> u64 {
    1024 * 1024
}

/// Cloud fraction lookup table: weather description to either a single
/// year-round average or 12 per-calendar-month averages.
#[derive(Debug, Clone)]
pub struct CloudFractionMapping {
    pub table: HashMap<String, Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, detail: String },
    Parse { path: String, detail: String },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, detail } => {
                write!(f, "cannot read config file {}: {}", path, detail)
            }
            ConfigError::Parse { path, detail } => {
                write!(f, "cannot parse config file {}: {}", path, detail)
            }
            ConfigError::Invalid(detail) => write!(f, "invalid configuration: {}", detail),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if 86_400 % self.simulation.timestep_seconds != 0 {
            return Err(ConfigError::Invalid(format!(
                "simulation timestep {} s does not divide one day exactly",
                self.simulation.timestep_seconds
            )));
        }
        if self.ensemble.start_year > self.ensemble.end_year {
            return Err(ConfigError::Invalid(format!(
                "ensemble start year {} is after end year {}",
                self.ensemble.start_year, self.ensemble.end_year
            )));
        }
        if self.ensemble.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "ensemble max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.climate.meteo.quantities.is_empty() {
            return Err(ConfigError::Invalid(
                "no meteorological quantities configured".to_string(),
            ));
        }
        const KNOWN_QUANTITIES: [&str; 3] =
            ["air_temperature", "relative_humidity", "cloud_fraction"];
        for qty in &self.climate.meteo.quantities {
            if !KNOWN_QUANTITIES.contains(&qty.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unknown meteo quantity {:?}",
                    qty
                )));
            }
            if !self.climate.meteo.output_files.contains_key(qty) {
                return Err(ConfigError::Invalid(format!(
                    "no output file configured for meteo quantity {:?}",
                    qty
                )));
            }
        }
        for station_id in [&self.climate.meteo.station_id, &self.climate.wind.station_id] {
            if !stations::is_registered(station_id, StationKind::Climate) {
                return Err(ConfigError::Invalid(format!(
                    "unknown climate station id {:?}",
                    station_id
                )));
            }
        }
        for gauge in [&self.rivers.major, &self.rivers.minor] {
            if !stations::is_registered(&gauge.station_id, StationKind::RiverGauge) {
                return Err(ConfigError::Invalid(format!(
                    "unknown river gauge station id {:?}",
                    gauge.station_id
                )));
            }
        }
        Ok(())
    }
}

impl CloudFractionMapping {
    /// Load the cloud fraction mapping file named by the meteo config.
    ///
    /// Every entry must hold either 1 value (year-round average) or 12
    /// values (per-calendar-month averages).
    pub fn load(path: &Path) -> Result<CloudFractionMapping, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let table: HashMap<String, Vec<f64>> =
            toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        for (description, values) in &table {
            if values.len() != 1 && values.len() != 12 {
                return Err(ConfigError::Invalid(format!(
                    "cloud fraction mapping for {:?} has {} values; expected 1 or 12",
                    description,
                    values.len()
                )));
            }
        }
        Ok(CloudFractionMapping { table })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
