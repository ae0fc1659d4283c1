//! Integration coverage of the forcing data pipeline stages working
//! together: per-quantity reading, trimming, gap patching, and fixed-column
//! file rendering, over realistic multi-day series.

use chrono::{NaiveDate, NaiveDateTime};

use bloomcast_service::forcing::format;
use bloomcast_service::forcing::readers;
use bloomcast_service::forcing::series::Series;
use bloomcast_service::logging::{LogLevel, LogRecord, LogSink, Logger};
use bloomcast_service::model::WindComponents;

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Log capture helper
// ---------------------------------------------------------------------------

struct CapturingSink {
    records: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl LogSink for CapturingSink {
    fn write(&mut self, record: &LogRecord<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((record.level, record.message.to_string()));
    }
}

fn capturing_logger() -> (Logger, Arc<Mutex<Vec<(LogLevel, String)>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = CapturingSink {
        records: Arc::clone(&records),
    };
    (Logger::new(vec![Box::new(sink)]), records)
}

fn hour_of(day: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, day)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Hourly meteorological pipeline
// ---------------------------------------------------------------------------

#[test]
fn temperature_series_trims_patches_and_formats_whole_days() {
    let (logger, records) = capturing_logger();

    // Day 1: complete, with a 2-hour interior gap.
    // Day 2: complete.
    // Day 3: entirely missing (provider outage) — must be trimmed away.
    let mut series = Series::new("air_temperature");
    for h in 0..24 {
        let value = match h {
            10 | 11 => None,
            _ => readers::read_temperature(Some("21.5")),
        };
        series.push(hour_of(1, h), value);
    }
    for h in 0..24 {
        series.push(hour_of(2, h), readers::read_temperature(Some("20.0")));
    }
    for h in 0..24 {
        series.push(hour_of(3, h), None);
    }

    series.trim(24).expect("two complete days remain");
    let patched = series.patch(&logger, "meteo", Some(11)).expect("interior gap is bounded");
    assert_eq!(patched, 2);

    let samples = series.finalized().expect("no missing values remain");
    assert_eq!(samples.len(), 48);
    // Flat 215.0 on both sides, so interpolation fills 215.0.
    assert!(samples.iter().all(|(_, v)| (*v - 215.0).abs() < 1e-9 || (*v - 200.0).abs() < 1e-9));

    let lines: Vec<String> = format::meteo_lines("889", &samples).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("889 2026 02 01 42{}", " 215.00".repeat(24)));
    assert_eq!(lines[1], format!("889 2026 02 02 42{}", " 200.00".repeat(24)));

    // Gap-count invariant: one debug entry per missing sample, plus the
    // summary entry.
    let records = records.lock().unwrap();
    let patch_entries = records
        .iter()
        .filter(|(level, msg)| *level == LogLevel::Debug && msg.contains("data patched for"))
        .count();
    assert_eq!(patch_entries, 2);
    assert!(records
        .iter()
        .any(|(_, msg)| msg == "2 air_temperature data values patched; see debug log on disk for details"));
}

#[test]
fn wind_series_from_raw_records_to_forcing_lines() {
    let (logger, records) = capturing_logger();

    // Hour 0: calm; hours 1-12 missing (a 12-hour gap, above the warning
    // threshold); hour 13 onward: steady 36 km/h from due east of the
    // strait axis. Remaining hours complete the day.
    let mut series = Series::new("wind");
    series.push(hour_of(1, 0), readers::read_wind_velocity(Some("0"), Some("31")));
    for h in 1..=12 {
        series.push(hour_of(1, h), readers::read_wind_velocity(None, None));
    }
    for h in 13..24 {
        series.push(hour_of(1, h), readers::read_wind_velocity(Some("36"), Some("30.5")));
    }

    series.trim(24).expect("day ends with data");
    series.patch(&logger, "wind", Some(11)).expect("gap is interior");

    let records = records.lock().unwrap();
    let warnings: Vec<&String> = records
        .iter()
        .filter(|(level, _)| *level == LogLevel::Warning)
        .map(|(_, msg)| msg)
        .collect();
    assert_eq!(warnings.len(), 1, "a 12-hour gap warrants exactly one warning");
    assert!(warnings[0].contains("> 11 hr starting at 2026-02-01 01:00"));

    let samples = series.finalized().unwrap();
    let lines: Vec<String> = format::wind_lines(&samples).collect();
    assert_eq!(lines.len(), 24);
    assert_eq!(lines[0], "01 02 2026 0.0 0.000000 0.000000");
    // Steady wind from the strait heading: pure along-strait, -10 m/s.
    assert_eq!(lines[13], "01 02 2026 13.0 -0.000000 -10.000000");
    // Interpolated hour 7: halfway between calm and -10 m/s along.
    let fields: Vec<&str> = lines[7].split_whitespace().collect();
    let along: f64 = fields[5].parse().unwrap();
    assert!((along - 10.0 * -7.0 / 13.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Daily river pipeline
// ---------------------------------------------------------------------------

#[test]
fn river_flow_from_raw_readings_to_forcing_lines() {
    let (logger, _) = capturing_logger();
    let day = |d: u32| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();

    // Two readings on the 1st, one on the 2nd, none on the 3rd and 4th,
    // two on the 5th; one value is provisional with a thousands separator.
    let raw = [
        (day(1), "4200.0"),
        (day(1), "4400.0"),
        (day(2), "4,100.0*"),
        (day(5), "3,900.0"),
        (day(5), "4100.0"),
    ];
    let mut scaled = Vec::new();
    for (date, flow) in raw {
        scaled.push((date, readers::parse_flow(flow).expect("gauge text parses")));
    }

    let mut series = Series::new("major river");
    for (date, flow) in readers::average_daily_flows(&scaled) {
        series.push(date, Some(flow));
    }
    series.insert_missing_days();
    series.patch(&logger, "rivers", Some(11)).expect("hole is interior");
    let samples = series.finalized().unwrap();

    let lines: Vec<String> = format::river_lines(&samples).collect();
    assert_eq!(
        lines,
        vec![
            "2026 02 01 4.300000e+03",
            "2026 02 02 4.100000e+03",
            "2026 02 03 4.066667e+03", // interpolated
            "2026 02 04 4.033333e+03", // interpolated
            "2026 02 05 4.000000e+03",
        ]
    );
}

#[test]
fn river_scale_factor_applies_before_averaging() {
    let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let scale = 35.1;
    let scaled: Vec<(NaiveDate, f64)> = [("100.0", day), ("200.0", day)]
        .iter()
        .map(|(flow, d)| (*d, readers::parse_flow(flow).unwrap() * scale))
        .collect();
    let daily = readers::average_daily_flows(&scaled);
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].0, day);
    assert!((daily[0].1 - 150.0 * scale).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Wind interpolation example from the established record
// ---------------------------------------------------------------------------

#[test]
fn wind_gap_interpolates_each_component() {
    let (logger, _) = capturing_logger();
    let mut series = Series::new("wind");
    series.push(hour_of(1, 9), Some(WindComponents { cross: 1.0, along: -2.0 }));
    series.push(hour_of(1, 10), None);
    series.push(hour_of(1, 11), Some(WindComponents { cross: 2.0, along: -1.0 }));
    series.patch(&logger, "wind", Some(11)).unwrap();
    assert_eq!(
        series.samples()[1].1,
        Some(WindComponents { cross: 1.5, along: -1.5 })
    );
}
