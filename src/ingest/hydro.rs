/// River gauge web service client.
///
/// Retrieves sub-daily discharge readings as JSON. Readings arrive several
/// per day; daily averaging and flow-string cleanup are the job of the
/// river reader in `forcing::readers`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::model::RiverReading;

// ============================================================================
// Gauge service response structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GaugeResponse {
    pub station_id: String,
    pub readings: Vec<GaugeReading>,
}

#[derive(Debug, Deserialize)]
pub struct GaugeReading {
    /// Reading time, "YYYY-MM-DD HH:MM:SS".
    pub timestamp: String,
    /// Discharge as reported; may carry thousands separators and a
    /// trailing `*` marking provisional values.
    pub flow: String,
}

// ============================================================================
// API client functions
// ============================================================================

/// Fetch all discharge readings for a gauge over a date range, inclusive.
///
/// The disclaimer cookie acknowledges the service's data disclaimer;
/// requests without it are redirected to the disclaimer page.
pub fn fetch_flows(
    client: &reqwest::blocking::Client,
    data_url: &str,
    station_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    disclaimer_cookie: &str,
) -> Result<Vec<RiverReading>, Box<dyn std::error::Error>> {
    let start = start_date.format("%Y-%m-%d").to_string();
    let end = end_date.format("%Y-%m-%d").to_string();
    let response = client
        .get(data_url)
        .query(&[
            ("stn", station_id),
            ("startDate", start.as_str()),
            ("endDate", end.as_str()),
        ])
        .header("Cookie", disclaimer_cookie)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(format!("river gauge service error: {}", response.status()).into());
    }

    let gauge_response: GaugeResponse = response.json()?;
    parse_readings(gauge_response)
}

/// Reduce a gauge response to dated raw readings.
pub fn parse_readings(
    response: GaugeResponse,
) -> Result<Vec<RiverReading>, Box<dyn std::error::Error>> {
    let mut readings = Vec::new();
    for reading in response.readings {
        let timestamp = NaiveDateTime::parse_from_str(&reading.timestamp, "%Y-%m-%d %H:%M:%S")
            .map_err(|_| format!("failed to parse reading timestamp {:?}", reading.timestamp))?;
        readings.push(RiverReading {
            date: timestamp.date(),
            flow: reading.flow,
        });
    }
    Ok(readings)
}

// ============================================================================
// Tests
// ============================================================================
