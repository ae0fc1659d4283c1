/// Gap-free forcing series construction.
///
/// A `Series` is an ordered run of (timestamp, value) samples at a uniform
/// nominal interval — hourly for climate quantities, daily for river flows.
/// `None` marks a sample whose record arrived without a usable value. The
/// processing order is fixed: trim incomplete periods from the end, then
/// patch interior gaps by linear interpolation, then finalize for
/// formatting. After trimming the final sample always has a value; after
/// patching no interior `None` remains.

use chrono::{NaiveDate, NaiveDateTime};

use crate::logging::Logger;
use crate::model::{ForcingError, WindComponents};

// ---------------------------------------------------------------------------
// Sample time and value abstractions
// ---------------------------------------------------------------------------

/// Timestamp of one sample. Hourly series use datetimes, daily series use
/// dates; both need to render themselves for log messages.
pub trait SampleTime: Copy {
    /// Full-precision rendering for per-sample debug messages.
    fn full_label(&self) -> String;
    /// Rendering used in large-gap warnings.
    fn warn_label(&self) -> String;
    /// Unit of the nominal sample interval, for warning text.
    fn unit_label() -> &'static str;
}

impl SampleTime for NaiveDateTime {
    fn full_label(&self) -> String {
        self.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn warn_label(&self) -> String {
        self.format("%Y-%m-%d %H:%M").to_string()
    }

    fn unit_label() -> &'static str {
        "hr"
    }
}

impl SampleTime for NaiveDate {
    fn full_label(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }

    fn warn_label(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }

    fn unit_label() -> &'static str {
        "days"
    }
}

/// Linear interpolation of a gap value. For a gap of `gap_len` samples
/// bounded by `v0` and `v1`, the `step`-th filled value (1-indexed) is
/// `v0 + (v1 - v0) / (gap_len + 1) * step`. Vector-valued samples
/// interpolate each component independently.
pub trait Interpolate: Copy {
    fn interpolated(v0: Self, v1: Self, step: usize, gap_len: usize) -> Self;
}

impl Interpolate for f64 {
    fn interpolated(v0: Self, v1: Self, step: usize, gap_len: usize) -> Self {
        v0 + (v1 - v0) / (gap_len + 1) as f64 * step as f64
    }
}

impl Interpolate for WindComponents {
    fn interpolated(v0: Self, v1: Self, step: usize, gap_len: usize) -> Self {
        WindComponents {
            cross: f64::interpolated(v0.cross, v1.cross, step, gap_len),
            along: f64::interpolated(v0.along, v1.along, step, gap_len),
        }
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

pub struct Series<T: SampleTime, V: Interpolate> {
    quantity: String,
    samples: Vec<(T, Option<V>)>,
}

impl<T: SampleTime, V: Interpolate> Series<T, V> {
    /// `quantity` names the series in log messages, e.g. "air_temperature"
    /// or "major river".
    pub fn new(quantity: &str) -> Self {
        Self {
            quantity: quantity.to_string(),
            samples: Vec::new(),
        }
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn push(&mut self, timestamp: T, value: Option<V>) {
        self.samples.push((timestamp, value));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(T, Option<V>)] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut Vec<(T, Option<V>)> {
        &mut self.samples
    }

    /// Remove whole trailing periods (`period_length` consecutive samples,
    /// e.g. 24 hourly samples = 1 day) until the series ends with a
    /// fully-observed period:
    ///
    /// 1. while the last period holds only missing values, delete it;
    /// 2. while the very last value is missing (data cut off mid-period),
    ///    delete the entire last period.
    ///
    /// Exhausting the series is a data-availability fault and propagates
    /// as `EmptySeriesError` rather than being patched over.
    pub fn trim(&mut self, period_length: usize) -> Result<(), ForcingError> {
        loop {
            if self.samples.is_empty() {
                return Err(ForcingError::EmptySeries {
                    quantity: self.quantity.clone(),
                });
            }
            let period_start = self.samples.len().saturating_sub(period_length);
            if self.samples[period_start..].iter().all(|(_, v)| v.is_none()) {
                self.samples.truncate(period_start);
            } else {
                break;
            }
        }
        while matches!(self.samples.last(), Some((_, None))) {
            let period_start = self.samples.len().saturating_sub(period_length);
            self.samples.truncate(period_start);
            if self.samples.is_empty() {
                return Err(ForcingError::EmptySeries {
                    quantity: self.quantity.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fill every interior run of missing values by linear interpolation
    /// between the bounding known values.
    ///
    /// Each patched sample is logged individually at debug level; a gap
    /// longer than `warn_threshold` samples is additionally reported as a
    /// warning, naming its start and duration. Returns the total number of
    /// samples patched, which is also reported in a debug summary.
    ///
    /// A run touching either series boundary has no bounding value on one
    /// side and cannot be interpolated; that is an `UnboundedGap` error.
    /// Trimming beforehand guarantees the trailing case cannot occur.
    pub fn patch(
        &mut self,
        logger: &Logger,
        module: &str,
        warn_threshold: Option<usize>,
    ) -> Result<usize, ForcingError> {
        let mut patched_count = 0;
        let mut last_known: Option<V> = None;
        let mut gap_start: Option<usize> = None;

        for i in 0..self.samples.len() {
            match self.samples[i].1 {
                None => {
                    if gap_start.is_none() {
                        gap_start = Some(i);
                    }
                    logger.debug(
                        module,
                        &format!(
                            "{} data patched for {}",
                            self.quantity,
                            self.samples[i].0.full_label()
                        ),
                    );
                    patched_count += 1;
                }
                Some(value) => {
                    if let Some(start) = gap_start.take() {
                        let Some(v0) = last_known else {
                            return Err(ForcingError::UnboundedGap {
                                quantity: self.quantity.clone(),
                                gap_start: self.samples[start].0.full_label(),
                            });
                        };
                        self.interpolate_values(start, i - 1, v0, value, logger, module, warn_threshold);
                    }
                    last_known = Some(value);
                }
            }
        }

        if let Some(start) = gap_start {
            return Err(ForcingError::UnboundedGap {
                quantity: self.quantity.clone(),
                gap_start: self.samples[start].0.full_label(),
            });
        }
        if patched_count > 0 {
            logger.debug(
                module,
                &format!(
                    "{} {} data values patched; see debug log on disk for details",
                    patched_count, self.quantity
                ),
            );
        }
        Ok(patched_count)
    }

    fn interpolate_values(
        &mut self,
        gap_start: usize,
        gap_end: usize,
        v0: V,
        v1: V,
        logger: &Logger,
        module: &str,
        warn_threshold: Option<usize>,
    ) {
        let gap_len = gap_end - gap_start + 1;
        if let Some(threshold) = warn_threshold {
            if gap_len > threshold {
                logger.warning(
                    module,
                    &format!(
                        "A {} forcing data gap > {} {} starting at {} has been \
                         patched by linear interpolation",
                        self.quantity,
                        threshold,
                        T::unit_label(),
                        self.samples[gap_start].0.warn_label()
                    ),
                );
            }
        }
        for (step, i) in (gap_start..=gap_end).enumerate() {
            self.samples[i].1 = Some(V::interpolated(v0, v1, step + 1, gap_len));
        }
    }

    /// Consume the series into concrete samples for formatting. Any
    /// remaining missing value is a `ResidualMissing` fault.
    pub fn finalized(self) -> Result<Vec<(T, V)>, ForcingError> {
        let Series { quantity, samples } = self;
        let mut finished = Vec::with_capacity(samples.len());
        for (timestamp, value) in samples {
            match value {
                Some(value) => finished.push((timestamp, value)),
                None => {
                    return Err(ForcingError::ResidualMissing {
                        quantity,
                        timestamp: timestamp.full_label(),
                    });
                }
            }
        }
        Ok(finished)
    }
}

impl Series<NaiveDate, f64> {
    /// Insert a missing-value placeholder for every date absent from a
    /// daily series, so a subsequent `patch` can interpolate them. Daily
    /// river data arrive as dated records, so a silent provider outage
    /// shows up as missing records rather than missing values.
    pub fn insert_missing_days(&mut self) {
        let mut i = 0;
        while i + 1 < self.samples.len() {
            let day = self.samples[i].0;
            let next_day = self.samples[i + 1].0;
            let delta = (next_day - day).num_days();
            for j in 1..delta {
                self.samples
                    .insert(i + j as usize, (day + chrono::Duration::days(j), None));
            }
            i += delta.max(1) as usize;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
