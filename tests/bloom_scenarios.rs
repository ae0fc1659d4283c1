//! End-to-end bloom detection and ensemble aggregation scenarios against
//! synthetic simulation result files.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use bloomcast_service::bloom;
use bloomcast_service::ensemble;
use bloomcast_service::logging::{LogLevel, Logger};

/// Hours from the run start (autumn) to January 1 of the bloom year.
const RUN_START: (i32, u32, u32) = (2025, 9, 19);
const HOURS_TO_JAN1: f64 = 104.0 * 24.0;

fn run_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(RUN_START.0, RUN_START.1, RUN_START.2).unwrap()
}

/// Write a synthetic biology time series file in the simulation's output
/// format: 4 samples per day (21600 s timestep) from the run start through
/// `days_after_jan1` whole days of the bloom year. `nitrate_of` and
/// `diatoms_of` give each day-after-Jan-1 its daily values; autumn days
/// hold nutrient-replete values.
fn write_bio_file(
    name: &str,
    days_after_jan1: usize,
    nitrate_of: impl Fn(usize) -> f64,
    diatoms_of: impl Fn(usize) -> (f64, f64, f64, f64),
) -> PathBuf {
    let dir = std::env::temp_dir().join("bloomcast_bloom_scenarios");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "! Synthetic biology time series").unwrap();
    writeln!(
        file,
        "*FieldNames: time, 3 m avg nitrate concentration, 3 m avg micro phytoplankton biomass"
    )
    .unwrap();
    writeln!(file, "*FieldUnits: hr since start, uM N, uM N").unwrap();
    writeln!(file, "*EndOfHeader").unwrap();
    let samples_per_day = 4;
    let total_hours = HOURS_TO_JAN1 as usize + days_after_jan1 * 24;
    for i in 0..(total_hours / 24 * samples_per_day) {
        let time = i as f64 * 6.0;
        let (nitrate, diatoms) = if time < HOURS_TO_JAN1 {
            (24.0, 0.1)
        } else {
            let sample = i - (HOURS_TO_JAN1 / 6.0) as usize;
            let day = sample / samples_per_day;
            let quarters = diatoms_of(day);
            let diatoms = [quarters.0, quarters.1, quarters.2, quarters.3][sample % 4];
            (nitrate_of(day), diatoms)
        };
        writeln!(file, "{:.2} {:.4} {:.4}", time, nitrate, diatoms).unwrap();
    }
    path
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

// ---------------------------------------------------------------------------
// Single-run detection
// ---------------------------------------------------------------------------

#[test]
fn synthetic_20_day_window_detects_peak_on_day_13() {
    // Nitrate above the 0.5 uM threshold for the first 10 days of January,
    // at/below it from day 11 on; diatoms peak within one sample on Jan 13.
    let path = write_bio_file(
        "bio_single",
        20,
        |day| if day < 10 { 2.0 } else { 0.4 },
        |day| {
            if day == 12 {
                (0.2, 7.5, 0.3, 0.2)
            } else {
                (0.2, 0.2, 0.2, 0.2)
            }
        },
    );
    let logger = Logger::to_console(LogLevel::Error);
    let (bloom_date, biomass) =
        bloom::predict_bloom_date(&path, run_start(), 21_600, "avg forcing", &logger)
            .expect("synthetic series has a clear bloom");
    assert_eq!(bloom_date, jan(13));
    assert_eq!(biomass, 7.5);
}

#[test]
fn nitrate_that_never_depletes_is_a_named_failure() {
    let path = write_bio_file("bio_no_bloom", 20, |_| 2.0, |_| (0.2, 0.2, 0.2, 0.2));
    let logger = Logger::to_console(LogLevel::Error);
    let err = bloom::predict_bloom_date(&path, run_start(), 21_600, "avg forcing", &logger)
        .expect_err("no 2-day low-nitrate window exists");
    assert!(err.to_string().contains("no 2 consecutive days"));
}

#[test]
fn peak_is_sought_only_within_4_days_of_the_window() {
    // Low-nitrate window opens on Jan 11/12; a towering peak on Jan 17
    // (window end + 5) must lose to the in-window peak on Jan 16.
    let path = write_bio_file(
        "bio_peak_window",
        25,
        |day| if day < 10 { 2.0 } else { 0.4 },
        |day| match day {
            15 => (0.2, 3.0, 0.2, 0.2), // Jan 16, inside [Jan 7, Jan 16]
            16 => (0.2, 9.0, 0.2, 0.2), // Jan 17, outside
            _ => (0.2, 0.2, 0.2, 0.2),
        },
    );
    let logger = Logger::to_console(LogLevel::Error);
    let (bloom_date, biomass) =
        bloom::predict_bloom_date(&path, run_start(), 21_600, "avg forcing", &logger).unwrap();
    assert_eq!(bloom_date, jan(16));
    assert_eq!(biomass, 3.0);
}

// ---------------------------------------------------------------------------
// Ensemble aggregation
// ---------------------------------------------------------------------------

#[test]
fn ensemble_tie_break_prefers_most_recent_forcing_year() {
    let mut bloom_dates = BTreeMap::new();
    bloom_dates.insert(1991, NaiveDate::from_yo_opt(2026, 80).unwrap());
    bloom_dates.insert(1995, NaiveDate::from_yo_opt(2026, 86).unwrap());
    bloom_dates.insert(2005, NaiveDate::from_yo_opt(2026, 86).unwrap());
    use chrono::Datelike;
    let target = NaiveDate::from_yo_opt(2026, 86).unwrap().num_days_from_ce() as i64;
    assert_eq!(
        ensemble::find_member(&bloom_dates, target).unwrap(),
        2005,
        "among exact ties the most recent forcing year wins"
    );
}

#[test]
fn ensemble_prediction_from_member_result_files() {
    // Three members with bloom peaks on Jan 13, Jan 18, and Jan 23.
    let mut bloom_dates = BTreeMap::new();
    let logger = Logger::to_console(LogLevel::Error);
    for (year, peak_day) in [(1981, 12usize), (1982, 17), (1983, 22)] {
        let path = write_bio_file(
            &format!("bio_member_{}", year),
            30,
            |day| if day < 10 { 2.0 } else { 0.4 },
            move |day| {
                if day == peak_day {
                    (0.2, 6.0, 0.3, 0.2)
                } else {
                    (0.2, 0.2, 0.2, 0.2)
                }
            },
        );
        let (bloom_date, _) = bloom::predict_bloom_date(
            &path,
            run_start(),
            21_600,
            &format!("{}/{} forcing", year - 1, year),
            &logger,
        )
        .unwrap();
        bloom_dates.insert(year, bloom_date);
    }
    assert_eq!(bloom_dates[&1981], jan(13));
    assert_eq!(bloom_dates[&1982], jan(18));
    assert_eq!(bloom_dates[&1983], jan(23));

    let prediction = ensemble::calc_prediction(&bloom_dates).unwrap();
    assert_eq!(prediction.median, 1982);
    assert_eq!(prediction.min, 1981);
    assert_eq!(prediction.max, 1983);
    assert_eq!(prediction.early, 1981);
    assert_eq!(prediction.late, 1983);
}
