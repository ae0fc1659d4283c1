/// Spring diatom bloom date detection.
///
/// The bloom definition delineates nutrient-replete spring conditions from
/// nutrient-stressed summer conditions: the bloom date is the date of peak
/// diatom biomass within 4 days of the 3 m average nitrate concentration
/// going to or below 0.5 µM (the half-saturation concentration) for two
/// consecutive days.
///
/// Pipeline over the simulation's biology time series output:
///   1. clip both series to January 1 of the bloom year;
///   2. reduce to daily resolution — nitrate daily minimum, diatom daily
///      maximum;
///   3. find the first two-consecutive-day low-nitrate window;
///   4. find the diatom biomass peak within the window ± 4 days.

use chrono::{Datelike, NaiveDate};
use std::path::Path;

use crate::logging::Logger;
use crate::model::{
    BloomError, NITRATE_HALF_SATURATION_CONCENTRATION, PHYTOPLANKTON_PEAK_WINDOW_HALF_WIDTH,
};
use crate::results::{self, Timeseries};

/// Field names of the biology time series of interest, as declared by the
/// simulation's output header.
pub const NITRATE_FIELD: &str = "3 m avg nitrate concentration";
pub const DIATOMS_FIELD: &str = "3 m avg micro phytoplankton biomass";
const TIME_FIELD: &str = "time";

// ---------------------------------------------------------------------------
// Daily biology series
// ---------------------------------------------------------------------------

/// Nitrate and diatom results reduced to daily resolution on a consecutive
/// calendar-date axis starting January 1 of the bloom year.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBiology {
    pub dates: Vec<NaiveDate>,
    /// Daily minimum nitrate concentration, µM N.
    pub nitrate: Vec<f64>,
    /// Daily maximum diatom biomass, µM N.
    pub diatoms: Vec<f64>,
}

/// Discard all samples before January 1 of the year after the run start.
/// A bloom is only meaningful in the calendar year after the autumn the
/// run starts in. Both series are clipped with the same predicate so they
/// stay index-aligned.
pub fn clip_to_jan1(nitrate: &mut Timeseries, diatoms: &mut Timeseries, run_start_date: NaiveDate) {
    let jan1 = jan1_after(run_start_date);
    let discard_hours = (jan1 - run_start_date).num_days() as f64 * 24.0;
    let keep: Vec<bool> = nitrate
        .indep_data
        .iter()
        .map(|&hours| hours >= discard_hours)
        .collect();
    retain_by_mask(nitrate, &keep);
    retain_by_mask(diatoms, &keep);
}

fn retain_by_mask(series: &mut Timeseries, keep: &[bool]) {
    let mut index = 0;
    series.indep_data.retain(|_| {
        let k = keep.get(index).copied().unwrap_or(false);
        index += 1;
        k
    });
    let mut index = 0;
    series.dep_data.retain(|_| {
        let k = keep.get(index).copied().unwrap_or(false);
        index += 1;
        k
    });
}

fn jan1_after(run_start_date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(run_start_date.year() + 1, 1, 1).expect("Jan 1 is always a valid date")
}

/// Reduce clipped results to daily values: nitrate daily minimum, diatom
/// daily maximum, over whole-day blocks of `86400 / timestep_seconds`
/// samples. A trailing partial block is dropped.
pub fn reduce_to_daily(
    nitrate: &Timeseries,
    diatoms: &Timeseries,
    run_start_date: NaiveDate,
    timestep_seconds: u32,
) -> DailyBiology {
    let day_slice = (86_400 / timestep_seconds) as usize;
    let jan1 = jan1_after(run_start_date);
    let nitrate_daily: Vec<f64> = nitrate
        .dep_data
        .chunks_exact(day_slice)
        .map(|day| day.iter().copied().fold(f64::INFINITY, f64::min))
        .collect();
    let diatoms_daily: Vec<f64> = diatoms
        .dep_data
        .chunks_exact(day_slice)
        .map(|day| day.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();
    let days = nitrate_daily.len().min(diatoms_daily.len());
    DailyBiology {
        dates: (0..days)
            .map(|i| jan1 + chrono::Duration::days(i as i64))
            .collect(),
        nitrate: nitrate_daily[..days].to_vec(),
        diatoms: diatoms_daily[..days].to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Window and peak search
// ---------------------------------------------------------------------------

/// Find the start and end dates of the first 2-day period with nitrate at
/// or below `threshold`.
pub fn find_low_nitrate_days(
    daily: &DailyBiology,
    threshold: f64,
) -> Result<(NaiveDate, NaiveDate), BloomError> {
    for i in 0..daily.dates.len().saturating_sub(1) {
        if daily.nitrate[i] <= threshold
            && daily.nitrate[i + 1] <= threshold
            && (daily.dates[i + 1] - daily.dates[i]).num_days() == 1
        {
            return Ok((daily.dates[i], daily.dates[i + 1]));
        }
    }
    Err(BloomError::NoLowNitrateWindow {
        threshold,
        days_scanned: daily.dates.len(),
    })
}

/// Find the date within `peak_half_width` days of the low-nitrate window
/// on which the diatom biomass is greatest, and that biomass.
///
/// Ties go to the earliest date. That choice is arbitrary rather than
/// deliberate, and is kept for compatibility with the established
/// prediction record.
pub fn find_phytoplankton_peak(
    daily: &DailyBiology,
    low_nitrate_days: (NaiveDate, NaiveDate),
    peak_half_width: i64,
) -> (NaiveDate, f64) {
    let early_bloom_date = low_nitrate_days.0 - chrono::Duration::days(peak_half_width);
    let late_bloom_date = low_nitrate_days.1 + chrono::Duration::days(peak_half_width);
    let mut peak: Option<(NaiveDate, f64)> = None;
    for i in 0..daily.dates.len() {
        let date = daily.dates[i];
        if date < early_bloom_date || date > late_bloom_date {
            continue;
        }
        let biomass = daily.diatoms[i];
        if peak.map(|(_, best)| biomass > best).unwrap_or(true) {
            peak = Some((date, biomass));
        }
    }
    // The window brackets dates the low-nitrate scan just returned, so at
    // least those two days are in range.
    peak.expect("peak window always covers the low-nitrate days")
}

// ---------------------------------------------------------------------------
// Prediction driver
// ---------------------------------------------------------------------------

/// Read one biology result file and calculate the predicted bloom date and
/// peak biomass.
pub fn predict_bloom_date(
    bio_ts_outfile: &Path,
    run_start_date: NaiveDate,
    timestep_seconds: u32,
    label: &str,
    logger: &Logger,
) -> Result<(NaiveDate, f64), Box<dyn std::error::Error>> {
    let mut nitrate = results::read_timeseries(bio_ts_outfile, TIME_FIELD, NITRATE_FIELD)?;
    let mut diatoms = results::read_timeseries(bio_ts_outfile, TIME_FIELD, DIATOMS_FIELD)?;
    clip_to_jan1(&mut nitrate, &mut diatoms, run_start_date);
    let daily = reduce_to_daily(&nitrate, &diatoms, run_start_date, timestep_seconds);

    let low_nitrate_days =
        find_low_nitrate_days(&daily, NITRATE_HALF_SATURATION_CONCENTRATION)?;
    logger.debug(
        "bloom",
        &format!(
            "first 2 days with nitrate <= {} uM N with {} are {} and {}",
            NITRATE_HALF_SATURATION_CONCENTRATION,
            label,
            low_nitrate_days.0.format("%Y-%m-%d"),
            low_nitrate_days.1.format("%Y-%m-%d")
        ),
    );

    let (bloom_date, bloom_biomass) = find_phytoplankton_peak(
        &daily,
        low_nitrate_days,
        PHYTOPLANKTON_PEAK_WINDOW_HALF_WIDTH,
    );
    logger.info(
        "bloom",
        &format!(
            "Predicted {} bloom date is {}",
            label,
            bloom_date.format("%Y-%m-%d")
        ),
    );
    logger.debug(
        "bloom",
        &format!(
            "Phytoplankton biomass on {} bloom date is {} uM N",
            label, bloom_biomass
        ),
    );
    Ok((bloom_date, bloom_biomass))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
