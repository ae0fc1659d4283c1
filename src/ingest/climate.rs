/// Climate data web service client.
///
/// Retrieves hourly meteorological and wind observations as monthly bulk
/// CSV downloads. Both the meteorological and wind processors read from
/// this record stream with their own per-quantity readers.
///
/// CSV columns, one row per hour:
///   station_id, timestamp (YYYY-MM-DD HH:MM), temp_c, rel_hum,
///   weather, wind_spd_kmh, wind_dir_tenths_deg
/// A literal `null` or an empty field marks a missing value.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::model::ClimateRecord;

// ============================================================================
// Request construction
// ============================================================================

/// Build the bulk download URL for one month of hourly records.
pub fn build_monthly_url(base_url: &str, station_id: &str, month: NaiveDate) -> String {
    format!(
        "{}?StationID={}&Year={}&Month={}&Day=1&timeframe=1&format=csv",
        base_url,
        station_id,
        month.year(),
        month.month()
    )
}

/// Months to request: January of the run start year through the current
/// month, inclusive. The run spans a year boundary, so the walk may cross
/// into a second calendar year.
pub fn data_months(run_start_date: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut year = run_start_date.year();
    let mut month = 1;
    loop {
        // The 1st of every month is a valid date.
        let m = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
        if m > today {
            break;
        }
        months.push(m);
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    months
}

// ============================================================================
// Fetching and parsing
// ============================================================================

/// Fetch one month of hourly records for a station.
pub fn fetch_month(
    client: &reqwest::blocking::Client,
    base_url: &str,
    station_id: &str,
    month: NaiveDate,
) -> Result<Vec<ClimateRecord>, Box<dyn std::error::Error>> {
    let url = build_monthly_url(base_url, station_id, month);
    let response = client.get(&url).send()?;
    if !response.status().is_success() {
        return Err(format!("climate service error: {}", response.status()).into());
    }
    let text = response.text()?;
    parse_climate_csv(&text)
}

/// Parse a bulk CSV download into hourly records.
///
/// Quantity fields are kept as raw text; the per-quantity readers own
/// parsing and unit conversion. Rows with too few fields are skipped.
pub fn parse_climate_csv(csv: &str) -> Result<Vec<ClimateRecord>, Box<dyn std::error::Error>> {
    let mut records = Vec::new();

    for (i, line) in csv.lines().enumerate() {
        if i == 0 || line.trim().is_empty() {
            continue; // Skip header or empty lines
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 7 {
            continue; // Skip incomplete rows
        }

        // Fields that might be "null" or empty
        let raw_field = |s: &str| -> Option<String> {
            let trimmed = s.trim();
            if trimmed == "null" || trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };

        let timestamp_str = fields[1].trim();
        let timestamp = NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M")
            .map_err(|_| format!("failed to parse timestamp {:?}", timestamp_str))?;

        records.push(ClimateRecord {
            station_id: fields[0].trim().to_string(),
            timestamp,
            temperature: raw_field(fields[2]),
            humidity: raw_field(fields[3]),
            weather: raw_field(fields[4]),
            wind_speed: raw_field(fields[5]),
            wind_direction: raw_field(fields[6]),
        });
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
