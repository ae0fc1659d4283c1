/// Forcing data pipelines.
///
/// One pipeline per forcing source — wind, meteorology, river flows — each
/// running the same stages: fetch raw records, extract per-quantity values,
/// trim incomplete trailing periods, patch gaps, and render the forcing
/// file the simulation reads. The wind pipeline additionally determines the
/// forcing data date for the whole run; when that date is unchanged since
/// the previous run there is nothing new to predict from and the run is
/// skipped via an explicit status value, not an error.
///
/// Submodules:
/// - `series` — gap-free series construction (trim / patch / interpolate).
/// - `readers` — per-quantity value extraction and unit conversion.
/// - `format` — fixed-column forcing file line rendering.

pub mod format;
pub mod readers;
pub mod series;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::{CloudFractionMapping, Config};
use crate::ingest::{climate, hydro};
use crate::logging::Logger;
use crate::model::{ClimateRecord, LARGE_GAP_WARNING_THRESHOLD};
use series::{Interpolate, Series};

/// Samples per day for hourly quantities; the trim period.
const HOURS_PER_DAY: usize = 24;

// ---------------------------------------------------------------------------
// Fetch outcome
// ---------------------------------------------------------------------------

/// Result of the forcing data collection stage, matched explicitly by the
/// drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh forcing data through `data_date` were written.
    Proceeded { data_date: NaiveDate },
    /// The wind data date is unchanged since the previous run; the
    /// pipeline has nothing new to work with. A routine outcome, not an
    /// error.
    SkippedNoNewData { data_date: NaiveDate },
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Walk raw records in order, extracting one value per record, stopping at
/// (and excluding) the first record dated past `end_date`. Records are
/// assumed pre-sorted at the source's nominal interval.
fn build_hourly_series<V: Interpolate>(
    records: &[ClimateRecord],
    quantity: &str,
    end_date: NaiveDate,
    mut reader: impl FnMut(&ClimateRecord) -> Option<V>,
) -> Series<NaiveDateTime, V> {
    let mut series = Series::new(quantity);
    for record in records {
        if record.timestamp.date() > end_date {
            break;
        }
        series.push(record.timestamp, reader(record));
    }
    series
}

/// Fetch all hourly records for a station from January of the run start
/// year through the current month.
fn fetch_climate_records(
    config: &Config,
    station_id: &str,
    module: &str,
    client: &reqwest::blocking::Client,
    logger: &Logger,
    today: NaiveDate,
) -> Result<Vec<ClimateRecord>, Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    for month in climate::data_months(config.run_start_date, today) {
        let month_records =
            climate::fetch_month(client, &config.climate.url, station_id, month)?;
        logger.debug(
            module,
            &format!("got {} data for {}", module, month.format("%Y-%m")),
        );
        records.extend(month_records);
    }
    Ok(records)
}

fn write_lines(
    path: &Path,
    lines: impl Iterator<Item = String>,
) -> Result<(), std::io::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

// ---------------------------------------------------------------------------
// Wind pipeline
// ---------------------------------------------------------------------------

/// Build the wind forcing file and return the forcing data date — the date
/// of the last fully-observed wind day.
pub fn make_wind_forcing_file(
    config: &Config,
    client: &reqwest::blocking::Client,
    logger: &Logger,
    today: NaiveDate,
) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let records = fetch_climate_records(
        config,
        &config.climate.wind.station_id,
        "wind",
        client,
        logger,
        today,
    )?;
    let mut series = build_hourly_series(&records, "wind", today, |record| {
        readers::read_wind_velocity(record.wind_speed.as_deref(), record.wind_direction.as_deref())
    });
    series.trim(HOURS_PER_DAY)?;
    series.patch(logger, "wind", Some(LARGE_GAP_WARNING_THRESHOLD))?;
    let samples = series.finalized()?;
    let (last_timestamp, last_wind) = samples
        .last()
        .copied()
        .ok_or("wind series is empty after processing")?;
    logger.debug(
        "wind",
        &format!(
            "latest wind ({}, ({:.6}, {:.6}))",
            last_timestamp.format("%Y-%m-%d %H:%M:%S"),
            last_wind.cross,
            last_wind.along
        ),
    );
    write_lines(&config.climate.wind.output_file, format::wind_lines(&samples))?;
    Ok(last_timestamp.date())
}

// ---------------------------------------------------------------------------
// Meteorology pipeline
// ---------------------------------------------------------------------------

/// Build one forcing file per configured meteorological quantity, bounded
/// by the wind-derived forcing data date.
pub fn make_meteo_forcing_files(
    config: &Config,
    mapping: &CloudFractionMapping,
    client: &reqwest::blocking::Client,
    logger: &Logger,
    data_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let meteo = &config.climate.meteo;
    let records =
        fetch_climate_records(config, &meteo.station_id, "meteo", client, logger, today)?;
    for quantity in &meteo.quantities {
        let mut series = match quantity.as_str() {
            "air_temperature" => build_hourly_series(&records, quantity, data_date, |record| {
                readers::read_temperature(record.temperature.as_deref())
            }),
            "relative_humidity" => build_hourly_series(&records, quantity, data_date, |record| {
                readers::read_humidity(record.humidity.as_deref())
            }),
            "cloud_fraction" => build_hourly_series(&records, quantity, data_date, |record| {
                readers::read_cloud_fraction(
                    record.weather.as_deref(),
                    record.timestamp,
                    mapping,
                    logger,
                )
            }),
            other => return Err(format!("no reader for meteo quantity {:?}", other).into()),
        };
        if quantity.as_str() == "cloud_fraction" {
            fill_trailing_cloud_fraction(&mut series, logger);
        }
        series.trim(HOURS_PER_DAY)?;
        series.patch(logger, "meteo", Some(LARGE_GAP_WARNING_THRESHOLD))?;
        let samples = series.finalized()?;
        if let Some((last_timestamp, last_value)) = samples.last() {
            logger.debug(
                "meteo",
                &format!(
                    "latest {} ({}, {:.2})",
                    quantity,
                    last_timestamp.format("%Y-%m-%d %H:%M:%S"),
                    last_value
                ),
            );
        }
        let output_file = meteo
            .output_files
            .get(quantity)
            .ok_or_else(|| format!("no output file configured for {:?}", quantity))?;
        write_lines(output_file, format::meteo_lines(&meteo.station_id, &samples))?;
    }
    Ok(())
}

/// The provider omits the 23:00 weather description when no precipitation
/// is occurring, so a cloud fraction series can end with a short run of
/// missing samples that would otherwise cost the whole final day at trim
/// time. Persist the last valid value into such a run, and log each fill —
/// these are synthesized observations.
fn fill_trailing_cloud_fraction(series: &mut Series<NaiveDateTime, f64>, logger: &Logger) {
    let samples = series.samples_mut();
    let trailing_missing = samples
        .iter()
        .rev()
        .take_while(|(_, value)| value.is_none())
        .count();
    if trailing_missing == 0 || trailing_missing >= HOURS_PER_DAY {
        // A whole empty day is a provider outage; leave it to trimming.
        return;
    }
    let first_missing = samples.len() - trailing_missing;
    let Some(last_valid) = samples[..first_missing]
        .iter()
        .rev()
        .find_map(|(_, value)| *value)
    else {
        return;
    };
    for (timestamp, value) in &mut samples[first_missing..] {
        *value = Some(last_valid);
        logger.warning(
            "meteo",
            &format!(
                "missing cloud fraction value at {} filled with {:.2}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                last_valid
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Rivers pipeline
// ---------------------------------------------------------------------------

/// Build the major and minor river forcing files, bounded by the forcing
/// data date.
pub fn make_river_forcing_files(
    config: &Config,
    client: &reqwest::blocking::Client,
    logger: &Logger,
    data_date: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let start_date = NaiveDate::from_ymd_opt(config.run_start_date.year(), 1, 1)
        .expect("Jan 1 is always a valid date");
    for (name, gauge) in [("major", &config.rivers.major), ("minor", &config.rivers.minor)] {
        let readings = hydro::fetch_flows(
            client,
            &config.rivers.data_url,
            &gauge.station_id,
            start_date,
            data_date + chrono::Duration::days(1),
            &config.rivers.disclaimer_cookie,
        )?;
        logger.debug(
            "rivers",
            &format!(
                "got {} river data for {} to {}",
                name,
                start_date.format("%Y-%m-%d"),
                data_date.format("%Y-%m-%d")
            ),
        );
        let scale_factor = gauge.scale_factor.unwrap_or(1.0);
        let mut scaled = Vec::with_capacity(readings.len());
        for reading in &readings {
            if reading.date > data_date {
                break;
            }
            scaled.push((reading.date, readers::parse_flow(&reading.flow)? * scale_factor));
        }
        let quantity = format!("{} river", name);
        let mut series = Series::new(&quantity);
        for (date, flow) in readers::average_daily_flows(&scaled) {
            series.push(date, Some(flow));
        }
        series.insert_missing_days();
        series.patch(logger, "rivers", Some(LARGE_GAP_WARNING_THRESHOLD))?;
        let samples = series.finalized()?;
        if let Some((last_date, last_flow)) = samples.last() {
            logger.debug(
                "rivers",
                &format!(
                    "latest {} river flow ({}, {:.1})",
                    name,
                    last_date.format("%Y-%m-%d"),
                    last_flow
                ),
            );
        }
        write_lines(&gauge.output_file, format::river_lines(&samples))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Collection driver
// ---------------------------------------------------------------------------

/// Collect and process all forcing data.
///
/// The wind pipeline runs first and fixes the forcing data date; if that
/// date matches the one recorded by the previous run, collection stops and
/// the caller receives `SkippedNoNewData`. Otherwise the state file is
/// rewritten and the meteorology and river pipelines run against the new
/// date.
pub fn get_forcing_data(
    config: &Config,
    mapping: &CloudFractionMapping,
    client: &reqwest::blocking::Client,
    logger: &Logger,
    data_date_override: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<FetchOutcome, Box<dyn std::error::Error>> {
    if !config.get_forcing_data {
        logger.info("forcing", "Skipped collection and processing of forcing data");
        let data_date = data_date_override.ok_or(
            "a --data-date is required when forcing data collection is turned off",
        )?;
        return Ok(FetchOutcome::Proceeded { data_date });
    }

    let data_date = make_wind_forcing_file(config, client, logger, today)?;
    logger.info(
        "forcing",
        &format!(
            "based on wind data forcing data date is {}",
            data_date.format("%Y-%m-%d")
        ),
    );

    let last_data_date = match std::fs::read_to_string(&config.wind_data_date_file) {
        Ok(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map_err(|e| format!("corrupt wind data date file: {}", e))?,
        // No state yet; fake a previous date to get things rolling.
        Err(_) => config.run_start_date,
    };
    if data_date == last_data_date {
        return Ok(FetchOutcome::SkippedNoNewData { data_date });
    }
    std::fs::write(
        &config.wind_data_date_file,
        format!("{}\n", data_date.format("%Y-%m-%d")),
    )?;

    make_meteo_forcing_files(config, mapping, client, logger, data_date, today)?;
    make_river_forcing_files(config, client, logger, data_date)?;
    Ok(FetchOutcome::Proceeded { data_date })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
