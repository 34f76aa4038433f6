//! Time-of-day keyed parameter tables.
//!
//! A `ScheduleTable` maps segment-start boundaries (minutes since midnight)
//! to a parameter value. A lookup resolves to the greatest boundary at or
//! before the queried minute; queries before the first boundary wrap to the
//! last segment of the previous day, so a non-empty table always covers the
//! full 24 hours.

use std::collections::BTreeMap;

use crate::error::ScheduleError;

/// Number of minutes in a day; segment boundaries live in `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u16 = 1440;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTable {
    entries: BTreeMap<u16, f32>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from pre-validated schedule rows (e.g. a CSV load).
    pub fn from_rows(rows: &[pump_config::ScheduleRow]) -> Result<Self, ScheduleError> {
        let mut table = Self::new();
        for row in rows {
            table.set(row.minutes, row.value)?;
        }
        Ok(table)
    }

    /// Insert or overwrite a segment boundary.
    pub fn set(&mut self, minutes_since_midnight: u16, value: f32) -> Result<(), ScheduleError> {
        if minutes_since_midnight >= MINUTES_PER_DAY {
            return Err(ScheduleError::OutOfRange(minutes_since_midnight));
        }
        self.entries.insert(minutes_since_midnight, value);
        Ok(())
    }

    /// Resolve the active segment's value for a wall-clock hour and minute.
    pub fn get(&self, hour: u8, minute: u8) -> Result<f32, ScheduleError> {
        self.value_at(u16::from(hour) * 60 + u16::from(minute))
    }

    /// Resolve the active segment's value for a minute of the day.
    ///
    /// Floor-with-wraparound rule: the value at the greatest boundary at or
    /// before `minute_of_day`, or the last boundary of the day when the query
    /// precedes the first one.
    pub fn value_at(&self, minute_of_day: u16) -> Result<f32, ScheduleError> {
        self.entries
            .range(..=minute_of_day)
            .next_back()
            .or_else(|| self.entries.iter().next_back())
            .map(|(_, v)| *v)
            .ok_or(ScheduleError::EmptyTable)
    }

    /// Ordered (boundary, value) view for display.
    pub fn entries(&self) -> impl Iterator<Item = (u16, f32)> + '_ {
        self.entries.iter().map(|(m, v)| (*m, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
