/// Ensemble bloom forecast.
///
/// Next season's forcing is unknown, so the simulation is run once per
/// historical forcing-data realization (one member per year in the
/// configured range), each member reading that year's historical forcing
/// files and writing its own result files. The per-member bloom dates form
/// an empirical distribution that is reduced to percentile-based
/// predictions: median, early/late bounds (5th/95th percentiles), and the
/// min/max extremes.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bloom;
use crate::config::Config;
use crate::driver;
use crate::forcing::{self, FetchOutcome};
use crate::logging::Logger;
use crate::model::EnsembleError;
use crate::sim::{self, Job};

// ---------------------------------------------------------------------------
// Member bookkeeping
// ---------------------------------------------------------------------------

/// One ensemble member: a historical forcing year and the files that
/// keep its simulation run disjoint from the others.
#[derive(Debug, Clone)]
pub struct Member {
    pub year: i32,
    pub suffix: String,
    pub edits_file: PathBuf,
    pub bio_ts_outfile: PathBuf,
}

/// Suffix string of the form `_XXYY` where XX and YY are the last two
/// digits of `year - 1` and `year`; e.g. 1981 produces `_8081`. Forcing
/// seasons span a year boundary, so a member is named by both years.
pub fn two_year_suffix(year: i32) -> String {
    format!("_{:02}{:02}", (year - 1).rem_euclid(100), year.rem_euclid(100))
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Edits file name: the base infile name with the member suffix inserted
/// before the extension, e.g. `infile.yaml` -> `infile_8081.yaml`.
fn edits_file_name(base_infile: &Path, suffix: &str) -> PathBuf {
    let stem = base_infile.file_stem().unwrap_or_default().to_string_lossy();
    let name = match base_infile.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    base_infile.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Infile edit files
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InfileEdits {
    forcing_data: ForcingDataEdits,
    timeseries_results: TimeseriesResultEdits,
    profiles_results: ProfileResultEdits,
}

#[derive(Serialize)]
struct ForcingDataEdits {
    /// "histfill": use historical data, then fall back to averages.
    use_average_forcing_data: String,
    avg_historical_wind_file: String,
    avg_historical_air_temperature_file: String,
    avg_historical_cloud_file: String,
    avg_historical_humidity_file: String,
    avg_historical_major_river_file: String,
    avg_historical_minor_river_file: String,
}

#[derive(Serialize)]
struct TimeseriesResultEdits {
    std_biology: String,
    std_physics: String,
}

#[derive(Serialize)]
struct ProfileResultEdits {
    hoffmueller_file: String,
}

/// Write one infile edit file per member year, pointing that member's run
/// at its historical forcing files and at member-suffixed output files so
/// concurrent runs write disjoint paths.
pub fn write_member_edit_files(
    config: &Config,
    logger: &Logger,
) -> Result<Vec<Member>, Box<dyn std::error::Error>> {
    let ensemble = &config.ensemble;
    let roots = &ensemble.forcing_file_roots;
    let mut members = Vec::new();
    for year in ensemble.start_year..=ensemble.end_year {
        let suffix = two_year_suffix(year);
        let path_with_suffix =
            |root: &Path| suffixed(root, &suffix).display().to_string();
        let edits = InfileEdits {
            forcing_data: ForcingDataEdits {
                use_average_forcing_data: "histfill".to_string(),
                avg_historical_wind_file: path_with_suffix(&roots.wind),
                avg_historical_air_temperature_file: path_with_suffix(&roots.air_temperature),
                avg_historical_cloud_file: path_with_suffix(&roots.cloud_fraction),
                avg_historical_humidity_file: path_with_suffix(&roots.relative_humidity),
                avg_historical_major_river_file: path_with_suffix(&roots.major_river),
                avg_historical_minor_river_file: path_with_suffix(&roots.minor_river),
            },
            timeseries_results: TimeseriesResultEdits {
                std_biology: path_with_suffix(&config.simulation.std_bio_ts_outfile),
                std_physics: path_with_suffix(&config.simulation.std_phys_ts_outfile),
            },
            profiles_results: ProfileResultEdits {
                hoffmueller_file: path_with_suffix(&config.simulation.hoffmueller_outfile),
            },
        };
        let edits_file = edits_file_name(&ensemble.base_infile, &suffix);
        std::fs::write(&edits_file, toml::to_string(&edits)?)?;
        logger.debug(
            "ensemble",
            &format!("wrote infile edit file {}", edits_file.display()),
        );
        members.push(Member {
            year,
            suffix: suffix.clone(),
            edits_file,
            bio_ts_outfile: suffixed(&config.simulation.std_bio_ts_outfile, &suffix),
        });
    }
    Ok(members)
}

// ---------------------------------------------------------------------------
// Percentiles and member matching
// ---------------------------------------------------------------------------

/// Percentile by linear interpolation between closest ranks.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("ordinal days are finite"));
    let last = sorted.len() - 1;
    let rank = p / 100.0 * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn ordinal(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64
}

/// Find the ensemble member whose bloom date is `ord_day`.
///
/// If more than one member matches, choose the one with the most recent
/// year's forcing. If none matches exactly, search adjacent days outward
/// (±1, ±2, … ±10), later day first, taking the first non-empty match
/// set. Exhausting the search is an error.
pub fn find_member(
    bloom_dates: &BTreeMap<i32, NaiveDate>,
    ord_day: i64,
) -> Result<i32, EnsembleError> {
    let find_matches = |day: i64| -> Vec<i32> {
        bloom_dates
            .iter()
            .filter(|(_, date)| ordinal(**date) == day)
            .map(|(year, _)| *year)
            .collect()
    };
    let mut matches = find_matches(ord_day);
    if matches.is_empty() {
        for offset in 1..=10 {
            matches.extend(find_matches(ord_day + offset));
            matches.extend(find_matches(ord_day - offset));
            if !matches.is_empty() {
                break;
            }
        }
    }
    matches
        .into_iter()
        .max()
        .ok_or(EnsembleError::NoMemberNearOrdinal { ordinal: ord_day })
}

/// Percentile-based summary of the per-member bloom dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub early: i32,
    pub median: i32,
    pub late: i32,
    pub min: i32,
    pub max: i32,
}

/// Reduce the bloom date distribution to member-identified predictions.
pub fn calc_prediction(
    bloom_dates: &BTreeMap<i32, NaiveDate>,
) -> Result<Prediction, EnsembleError> {
    if bloom_dates.is_empty() {
        return Err(EnsembleError::NoUsableMembers);
    }
    let ord_days: Vec<f64> = bloom_dates.values().map(|d| ordinal(*d) as f64).collect();
    let median = percentile(&ord_days, 50.0).round();
    let early_bound = percentile(&ord_days, 5.0);
    let late_bound = percentile(&ord_days, 95.0);
    let min_bound = percentile(&ord_days, 0.0);
    let max_bound = percentile(&ord_days, 100.0);
    Ok(Prediction {
        early: find_member(bloom_dates, early_bound.trunc() as i64)?,
        median: find_member(bloom_dates, median as i64)?,
        late: find_member(bloom_dates, late_bound.ceil() as i64)?,
        min: find_member(bloom_dates, min_bound.trunc() as i64)?,
        max: find_member(bloom_dates, max_bound.ceil() as i64)?,
    })
}

// ---------------------------------------------------------------------------
// Ensemble driver
// ---------------------------------------------------------------------------

/// River flow data are only served inside a rolling window this long.
const RIVER_DATA_WINDOW_MONTHS: u32 = 18;

fn check_river_data_available(
    config: &Config,
    today: NaiveDate,
) -> Result<(), EnsembleError> {
    let run_start_yr_jan1 = NaiveDate::from_ymd_opt(config.run_start_date.year(), 1, 1)
        .expect("Jan 1 is always a valid date");
    let limit = today
        .checked_sub_months(chrono::Months::new(RIVER_DATA_WINDOW_MONTHS))
        .expect("18 months before today is representable");
    if run_start_yr_jan1 < limit {
        return Err(EnsembleError::RiverDataUnavailable {
            run_start: config.run_start_date,
            limit,
        });
    }
    Ok(())
}

/// Run the ensemble forecast: collect forcing data, run one simulation per
/// member, detect each member's bloom date, and log the percentile
/// predictions and the evolution line.
pub fn run(
    config_file: &Path,
    data_date_override: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = driver::setup(config_file)?;
    let result = run_with_context(&context, data_date_override);
    context.logger.shutdown();
    result
}

fn run_with_context(
    context: &driver::RunContext,
    data_date_override: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let driver::RunContext {
        config,
        mapping,
        logger,
        evolution,
        client,
        today,
    } = context;
    logger.debug(
        "ensemble",
        &format!("run start date is {}", config.run_start_date.format("%Y-%m-%d")),
    );
    check_river_data_available(config, *today)?;

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
                "ensemble",
                &format!(
                    "Wind data date {} is unchanged since last run",
                    data_date.format("%Y-%m-%d")
                ),
            );
            return Ok(());
        }
        FetchOutcome::Proceeded { data_date } => data_date,
    };

    let members = write_member_edit_files(config, logger)?;
    let records = if config.run_simulation {
        let jobs: Vec<Job> = members
            .iter()
            .map(|member| Job {
                name: format!("bloomcast{}", member.suffix),
                infile: config.ensemble.base_infile.clone(),
                edits: Some(member.edits_file.clone()),
            })
            .collect();
        let records = sim::run_batch(
            jobs,
            &config.simulation.executable,
            config.ensemble.max_concurrent_jobs,
            Duration::from_secs(config.ensemble.poll_interval_seconds),
            logger,
        )?;
        logger.info("ensemble", "ensemble batch simulation runs completed");
        Some(records)
    } else {
        logger.info("ensemble", "Skipped running simulation");
        None
    };

    let mut bloom_dates: BTreeMap<i32, NaiveDate> = BTreeMap::new();
    for (i, member) in members.iter().enumerate() {
        if let Some(records) = &records {
            if !records[i].succeeded() {
                logger.error(
                    "ensemble",
                    &format!(
                        "member {} simulation failed; excluded from the ensemble \
                         (see {}.stdout)",
                        member.year,
                        member.edits_file.display()
                    ),
                );
                continue;
            }
        }
        let label = format!("{}/{} forcing", member.year - 1, member.year);
        match bloom::predict_bloom_date(
            &member.bio_ts_outfile,
            config.run_start_date,
            config.simulation.timestep_seconds,
            &label,
            logger,
        ) {
            Ok((bloom_date, _biomass)) => {
                bloom_dates.insert(member.year, bloom_date);
            }
            Err(e) => {
                logger.error(
                    "ensemble",
                    &format!(
                        "member {} produced no bloom date: {}; excluded from the ensemble",
                        member.year, e
                    ),
                );
            }
        }
    }

    let prediction = calc_prediction(&bloom_dates)?;
    log_prediction(logger, &prediction, &bloom_dates);
    evolution.append(&evolution_line(data_date, &prediction, &bloom_dates))?;
    Ok(())
}

fn log_prediction(
    logger: &Logger,
    prediction: &Prediction,
    bloom_dates: &BTreeMap<i32, NaiveDate>,
) {
    let date_of = |member: i32| bloom_dates[&member].format("%Y-%m-%d").to_string();
    logger.debug(
        "ensemble",
        &format!("Predicted earliest bloom date is {}", date_of(prediction.min)),
    );
    for (name, member) in [
        ("early bound", prediction.early),
        ("median", prediction.median),
        ("late bound", prediction.late),
    ] {
        logger.info(
            "ensemble",
            &format!("Predicted {} bloom date is {}", name, date_of(member)),
        );
        logger.debug(
            "ensemble",
            &format!(
                "{} bloom date is based on forcing from {}/{}",
                name,
                member - 1,
                member
            ),
        );
    }
    logger.debug(
        "ensemble",
        &format!("Predicted latest bloom date is {}", date_of(prediction.max)),
    );
}

/// One evolution log line: the forcing data date, then a
/// (bloom date, forcing year) pair per summary label — median, early,
/// late, then the min/max extremes.
fn evolution_line(
    data_date: NaiveDate,
    prediction: &Prediction,
    bloom_dates: &BTreeMap<i32, NaiveDate>,
) -> String {
    let mut line = format!("  {}", data_date.format("%Y-%m-%d"));
    for member in [
        prediction.median,
        prediction.early,
        prediction.late,
        prediction.min,
        prediction.max,
    ] {
        line.push_str(&format!(
            "      {}  {}",
            bloom_dates[&member].format("%Y-%m-%d"),
            member
        ));
    }
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
