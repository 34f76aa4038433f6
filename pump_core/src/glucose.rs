//! Append-only glucose reading log with range statistics and trend
//! projection.

use chrono::{DateTime, Utc};

use crate::error::SeriesError;

/// Glucose below this is treated as low (mmol/L).
pub const LOW_GLUCOSE_MMOL: f32 = 3.9;
/// Glucose above this is treated as high (mmol/L).
pub const HIGH_GLUCOSE_MMOL: f32 = 10.0;

/// One CGM sample. Immutable once appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlucoseReading {
    pub timestamp: DateTime<Utc>,
    /// Concentration in mmol/L.
    pub value: f32,
    pub is_valid: bool,
}

/// Timestamp-ordered reading log. Readings are expected to arrive in
/// non-decreasing time order; the series never re-sorts.
#[derive(Debug, Clone, Default)]
pub struct GlucoseSeries {
    readings: Vec<GlucoseReading>,
}

impl GlucoseSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading. Non-finite values are rejected without mutating the
    /// series.
    pub fn append(&mut self, value: f32, timestamp: DateTime<Utc>) -> Result<(), SeriesError> {
        if !value.is_finite() {
            return Err(SeriesError::NonFiniteValue);
        }
        self.readings.push(GlucoseReading {
            timestamp,
            value,
            is_valid: true,
        });
        Ok(())
    }

    /// The most recent reading.
    pub fn current(&self) -> Result<&GlucoseReading, SeriesError> {
        self.readings.last().ok_or(SeriesError::NoData)
    }

    /// Readings with timestamps in `[start, end]`, insertion order. Lazy and
    /// restartable; never mutates the log.
    pub fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &GlucoseReading> + '_ {
        self.readings
            .iter()
            .filter(move |r| r.timestamp >= start && r.timestamp <= end)
    }

    /// Mean over `[start, end]`.
    pub fn average(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f32, SeriesError> {
        let (sum, n) = self
            .range(start, end)
            .fold((0.0f64, 0usize), |(s, n), r| (s + f64::from(r.value), n + 1));
        if n == 0 {
            return Err(SeriesError::InsufficientData);
        }
        Ok((sum / n as f64) as f32)
    }

    /// Population standard deviation over `[start, end]` (divisor = count).
    pub fn standard_deviation(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f32, SeriesError> {
        let mean = f64::from(self.average(start, end)?);
        let (sumsq, n) = self.range(start, end).fold((0.0f64, 0usize), |(s, n), r| {
            let d = f64::from(r.value) - mean;
            (s + d * d, n + 1)
        });
        // average() already failed on an empty range, so n >= 1 here.
        Ok((sumsq / n as f64).sqrt() as f32)
    }

    /// Fraction (0–1) of readings in `[start, end]` whose value lies within
    /// `[low, high]` inclusive.
    pub fn time_in_range(
        &self,
        low: f32,
        high: f32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f32, SeriesError> {
        let (within, total) = self.range(start, end).fold((0usize, 0usize), |(w, t), r| {
            if r.value >= low && r.value <= high {
                (w + 1, t + 1)
            } else {
                (w, t + 1)
            }
        });
        if total == 0 {
            return Err(SeriesError::InsufficientData);
        }
        Ok(within as f32 / total as f32)
    }

    /// Rate of change in mmol/L per minute, as a finite difference over the
    /// two most recent readings.
    pub fn trend(&self) -> Result<f32, SeriesError> {
        let n = self.readings.len();
        if n < 2 {
            return Err(SeriesError::InsufficientData);
        }
        let last = self.readings[n - 1];
        let prev = self.readings[n - 2];
        let dt_minutes = (last.timestamp - prev.timestamp).num_seconds() as f32 / 60.0;
        if dt_minutes <= 0.0 {
            // Coincident timestamps carry no slope information.
            return Err(SeriesError::InsufficientData);
        }
        Ok((last.value - prev.value) / dt_minutes)
    }

    /// Linear extrapolation of the current value along the current trend.
    /// No clamping to physiological bounds; callers clamp if needed.
    pub fn predict(&self, minutes_ahead: f32) -> Result<f32, SeriesError> {
        let current = self.current()?.value;
        let trend = self.trend()?;
        Ok(current + trend * minutes_ahead)
    }

    /// Whether the current reading is below `threshold`.
    pub fn is_low(&self, threshold: f32) -> Result<bool, SeriesError> {
        Ok(self.current()?.value < threshold)
    }

    /// Whether the current reading is above `threshold`.
    pub fn is_high(&self, threshold: f32) -> Result<bool, SeriesError> {
        Ok(self.current()?.value > threshold)
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }
}
