/// Per-quantity value extraction and unit conversion.
///
/// Each forcing quantity has its own rule for turning a raw provider field
/// into a physical value. Readers return `None` for absent or unparseable
/// fields; those samples are filled later by gap patching.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::config::CloudFractionMapping;
use crate::logging::Logger;
use crate::model::{
    ForcingError, WindComponents, STRAIT_HEADING_DEGREES, UNKNOWN_WEATHER_CLOUD_FRACTION,
};

// ---------------------------------------------------------------------------
// Meteorological quantities
// ---------------------------------------------------------------------------

/// Air temperature in tenths of degrees Celsius.
///
/// The simulation expects 10ths of degrees due to legacy formatting of the
/// climate service's archive files.
pub fn read_temperature(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok()).map(|t| t * 10.0)
}

/// Relative humidity in percent, used as-is.
pub fn read_humidity(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok())
}

/// Cloud fraction from a categorical weather description via the heuristic
/// mapping table.
///
/// A table entry holds either a single year-round average or 12 monthly
/// averages selected by the record's calendar month. An unrecognized
/// description gets the overcast fallback value and a warning; a missing or
/// "NA" description is missing data and propagates as `None` for patching.
pub fn read_cloud_fraction(
    raw: Option<&str>,
    timestamp: NaiveDateTime,
    mapping: &CloudFractionMapping,
    logger: &Logger,
) -> Option<f64> {
    let description = match raw {
        None | Some("NA") => return None,
        Some(description) => description,
    };
    match mapping.table.get(description) {
        Some(values) if values.len() == 1 => Some(values[0]),
        Some(values) => Some(values[(timestamp.month() - 1) as usize]),
        None => {
            logger.warning(
                "meteo",
                &format!(
                    "Unrecognized weather description: {} at {}; \
                     cloud fraction set to 10",
                    description,
                    timestamp.format("%Y-%m-%d %H:%M:%S")
                ),
            );
            Some(UNKNOWN_WEATHER_CLOUD_FRACTION)
        }
    }
}

// ---------------------------------------------------------------------------
// Wind
// ---------------------------------------------------------------------------

/// Wind velocity resolved into cross- and along-strait components.
///
/// The provider reports speed in km/h and direction in tenths of degrees.
/// Speed and direction are converted to m/s and degrees, rotated into the
/// strait's axis frame, and sign-flipped from the meteorological
/// (blowing from) to the oceanographic (blowing towards) convention.
/// A missing speed or direction yields a missing sample. The station
/// occasionally emits a calm reading with a trailing flag character; an
/// unparseable zero is treated as a valid zero rather than missing data.
pub fn read_wind_velocity(
    speed_raw: Option<&str>,
    direction_raw: Option<&str>,
) -> Option<WindComponents> {
    let (speed_text, direction_text) = match (speed_raw, direction_raw) {
        (Some(s), Some(d)) => (s, d),
        _ => return None,
    };
    let speed_kmh = match speed_text.parse::<f64>() {
        Ok(speed) => speed,
        Err(_) => {
            let digits: String = speed_text
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            match digits.parse::<f64>() {
                Ok(speed) if speed == 0.0 => {
                    return Some(WindComponents { cross: 0.0, along: 0.0 });
                }
                _ => return None,
            }
        }
    };
    let direction_tenths = match direction_text.parse::<f64>() {
        Ok(direction) => direction,
        Err(_) => return None,
    };

    // km/h to m/s; tenths of degrees to degrees
    let speed = speed_kmh * 1000.0 / 3600.0;
    let direction = (direction_tenths * 10.0).to_radians();

    // Speed and direction to u and v components
    let u_wind = speed * direction.sin();
    let v_wind = speed * direction.cos();

    // Rotate components to align with the strait's axis
    let heading = STRAIT_HEADING_DEGREES.to_radians();
    let cross_wind = u_wind * heading.cos() - v_wind * heading.sin();
    let along_wind = u_wind * heading.sin() + v_wind * heading.cos();

    // Resolve the atmosphere/ocean direction difference in favour of
    // oceanography
    Some(WindComponents {
        cross: -cross_wind,
        along: -along_wind,
    })
}

// ---------------------------------------------------------------------------
// River flow
// ---------------------------------------------------------------------------

/// Convert a flow reading from gauge service text to a number.
///
/// Handles thousands separators and provisional values, which are marked
/// with a trailing `*`.
pub fn parse_flow(raw: &str) -> Result<f64, ForcingError> {
    let cleaned = raw.replace(',', "");
    cleaned
        .parse::<f64>()
        .or_else(|_| cleaned[..cleaned.len().saturating_sub(1)].parse::<f64>())
        .map_err(|_| ForcingError::InvalidValue {
            quantity: "river flow".to_string(),
            value: raw.to_string(),
        })
}

/// Reduce dated sub-daily flow values to one arithmetic-mean value per
/// calendar day. Readings for the same day are assumed contiguous in the
/// input, which arrives in timestamp order from the gauge service.
pub fn average_daily_flows(readings: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    let mut daily = Vec::new();
    let mut readings = readings.iter();
    let Some(&(first_day, first_flow)) = readings.next() else {
        return daily;
    };
    let mut current_day = first_day;
    let mut flow_sum = first_flow;
    let mut count = 1usize;
    for &(day, flow) in readings {
        if day == current_day {
            flow_sum += flow;
            count += 1;
        } else {
            daily.push((current_day, flow_sum / count as f64));
            current_day = day;
            flow_sum = flow;
            count = 1;
        }
    }
    daily.push((current_day, flow_sum / count as f64));
    daily
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
