/// Core data types for the spring bloom forecasting service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no external dependencies beyond chrono — only types,
/// domain constants, and the error taxonomy.

use chrono::{NaiveDate, NaiveDateTime};

// ---------------------------------------------------------------------------
// Domain constants
// ---------------------------------------------------------------------------

/// Nitrate half-saturation concentration, in µM N. Daily nitrate at or below
/// this value marks nutrient-depleted conditions.
pub const NITRATE_HALF_SATURATION_CONCENTRATION: f64 = 0.5;

/// Half-width, in days, of the window around the first low-nitrate days in
/// which the diatom biomass peak is sought.
pub const PHYTOPLANKTON_PEAK_WINDOW_HALF_WIDTH: i64 = 4;

/// Bearing of the strait's major axis, in degrees true. Wind velocities are
/// resolved into components along and across this axis.
pub const STRAIT_HEADING_DEGREES: f64 = 305.0;

/// Cloud fraction assigned to weather descriptions missing from the mapping
/// table. 10 is the overcast (maximum) code.
pub const UNKNOWN_WEATHER_CLOUD_FRACTION: f64 = 10.0;

/// Gaps longer than this many samples are patched but also reported via the
/// operator notification channel, because they are considered too large to be
/// confidently synthetic.
pub const LARGE_GAP_WARNING_THRESHOLD: usize = 11;

// ---------------------------------------------------------------------------
// Observation record types
// ---------------------------------------------------------------------------

/// One hourly record from the climate data web service.
///
/// Quantity fields hold the raw field text; `None` marks a field the provider
/// reported as `null` or empty. Parsing and unit conversion are the job of
/// the per-quantity readers in `forcing::readers`, which also decide how to
/// treat unparseable text.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateRecord {
    pub station_id: String,
    pub timestamp: NaiveDateTime,
    /// Air temperature, degrees Celsius.
    pub temperature: Option<String>,
    /// Relative humidity, percent.
    pub humidity: Option<String>,
    /// Categorical weather description, e.g. "Mostly Cloudy".
    pub weather: Option<String>,
    /// Wind speed, km/h.
    pub wind_speed: Option<String>,
    /// Wind direction, tenths of degrees.
    pub wind_direction: Option<String>,
}

/// One sub-daily reading from the river gauge web service.
///
/// Flow text may carry thousands separators and a trailing `*` marking
/// provisional values; `forcing::readers::parse_flow` handles both.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverReading {
    pub date: NaiveDate,
    pub flow: String,
}

/// Wind velocity resolved into cross-strait and along-strait components,
/// in m/s, oceanographic convention (positive = wind blowing towards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindComponents {
    pub cross: f64,
    pub along: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while building forcing data series.
#[derive(Debug, Clone, PartialEq)]
pub enum ForcingError {
    /// Trimming consumed the entire series; there is no fully-observed
    /// period to work with. A data-availability fault, not a crash.
    EmptySeries { quantity: String },
    /// A run of missing values touches a series boundary, so it has no
    /// known value on one side and cannot be interpolated.
    UnboundedGap { quantity: String, gap_start: String },
    /// A missing value survived trimming and patching.
    ResidualMissing { quantity: String, timestamp: String },
    /// A provider field could not be read as a number.
    InvalidValue { quantity: String, value: String },
}

impl std::fmt::Display for ForcingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForcingError::EmptySeries { quantity } => {
                write!(f, "no complete periods of {} data available", quantity)
            }
            ForcingError::UnboundedGap { quantity, gap_start } => write!(
                f,
                "{} data gap starting at {} has no known value on both sides \
                 and cannot be interpolated",
                quantity, gap_start
            ),
            ForcingError::ResidualMissing { quantity, timestamp } => write!(
                f,
                "{} data still missing at {} after trimming and patching",
                quantity, timestamp
            ),
            ForcingError::InvalidValue { quantity, value } => {
                write!(f, "unreadable {} value: {:?}", quantity, value)
            }
        }
    }
}

impl std::error::Error for ForcingError {}

/// Errors that can arise while locating the bloom in simulation results.
#[derive(Debug, Clone, PartialEq)]
pub enum BloomError {
    /// No two consecutive days with nitrate at or below the threshold were
    /// found; the simulated year never reached nutrient depletion.
    NoLowNitrateWindow { threshold: f64, days_scanned: usize },
}

impl std::fmt::Display for BloomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BloomError::NoLowNitrateWindow { threshold, days_scanned } => write!(
                f,
                "no 2 consecutive days with nitrate <= {} uM in {} days of results",
                threshold, days_scanned
            ),
        }
    }
}

impl std::error::Error for BloomError {}

/// Errors that can arise while aggregating an ensemble of bloom predictions.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// The outward member search found no member within 10 days of the
    /// target ordinal day.
    NoMemberNearOrdinal { ordinal: i64 },
    /// River flow data are only retrievable inside a rolling window; the
    /// requested run start date falls outside it.
    RiverDataUnavailable { run_start: NaiveDate, limit: NaiveDate },
    /// Every ensemble member failed to produce a bloom date.
    NoUsableMembers,
}

impl std::fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnsembleError::NoMemberNearOrdinal { ordinal } => write!(
                f,
                "no ensemble member has a bloom date within 10 days of ordinal day {}",
                ordinal
            ),
            EnsembleError::RiverDataUnavailable { run_start, limit } => write!(
                f,
                "a run starting {} cannot be done today because no river flow \
                 data are available prior to {}",
                run_start, limit
            ),
            EnsembleError::NoUsableMembers => {
                write!(f, "no ensemble member produced a usable bloom date")
            }
        }
    }
}

impl std::error::Error for EnsembleError {}

/// Errors that can arise while reading simulation result files.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsError {
    /// The header section ended without the expected marker lines.
    MalformedHeader { path: String, detail: String },
    /// The requested field is not declared in `*FieldNames:`.
    MissingField { path: String, field: String },
    /// A data row could not be read as numbers.
    MalformedRow { path: String, line: usize },
    /// The profile file holds fewer blocks than the requested profile number.
    MissingProfile { path: String, profile_number: usize, available: usize },
    Io { path: String, detail: String },
}

impl std::fmt::Display for ResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsError::MalformedHeader { path, detail } => {
                write!(f, "malformed header in {}: {}", path, detail)
            }
            ResultsError::MissingField { path, field } => {
                write!(f, "field {:?} not declared in {}", field, path)
            }
            ResultsError::MalformedRow { path, line } => {
                write!(f, "unreadable data row at {}:{}", path, line)
            }
            ResultsError::MissingProfile { path, profile_number, available } => write!(
                f,
                "profile {} requested but {} holds only {} profiles",
                profile_number, path, available
            ),
            ResultsError::Io { path, detail } => write!(f, "cannot read {}: {}", path, detail),
        }
    }
}

impl std::error::Error for ResultsError {}

/// Errors that can arise while driving the external simulation program.
#[derive(Debug)]
pub enum SimError {
    /// The simulation executable could not be started.
    LaunchFailed { executable: String, detail: String },
    /// The simulation exited with a non-zero status; its stdout/stderr
    /// capture file holds the post-mortem detail.
    NonZeroExit { infile: String, status: i32 },
    /// The stdout/stderr capture file could not be created.
    CaptureFailed { path: String, detail: String },
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::LaunchFailed { executable, detail } => {
                write!(f, "failed to launch {}: {}", executable, detail)
            }
            SimError::NonZeroExit { infile, status } => write!(
                f,
                "simulation run with {} exited with status {}",
                infile, status
            ),
            SimError::CaptureFailed { path, detail } => {
                write!(f, "cannot create capture file {}: {}", path, detail)
            }
        }
    }
}

impl std::error::Error for SimError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_error_names_quantity() {
        let err = ForcingError::EmptySeries { quantity: "wind".to_string() };
        assert!(err.to_string().contains("wind"));
    }

    #[test]
    fn test_no_low_nitrate_window_reports_threshold_and_scan_length() {
        let err = BloomError::NoLowNitrateWindow { threshold: 0.5, days_scanned: 120 };
        let msg = err.to_string();
        assert!(msg.contains("0.5"), "message should cite the threshold: {}", msg);
        assert!(msg.contains("120"), "message should cite days scanned: {}", msg);
    }

    #[test]
    fn test_wind_components_are_copyable() {
        let w = WindComponents { cross: 1.5, along: -2.5 };
        let w2 = w;
        assert_eq!(w.cross, w2.cross);
        assert_eq!(w.along, w2.along);
    }
}
