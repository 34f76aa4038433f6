//! Typed delivery/alarm/system events and the append-only event log.
//!
//! Events are a closed variant: consumers match on `EventKind` instead of
//! downcasting. Once logged an event never changes, with one exception: a
//! bolus's `cancelled` flag transitions false to true exactly once, in place,
//! through `EventLog::cancel_latest_bolus`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::HistoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusKind {
    Manual,
    Extended,
    Quick,
    Correction,
}

impl fmt::Display for BolusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Manual => "Manual",
            Self::Extended => "Extended",
            Self::Quick => "Quick",
            Self::Correction => "Correction",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    LowGlucose,
    HighGlucose,
    LowInsulin,
    LowBattery,
    Occlusion,
    CgmDisconnection,
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LowGlucose => "low glucose",
            Self::HighGlucose => "high glucose",
            Self::LowInsulin => "low insulin",
            Self::LowBattery => "low battery",
            Self::Occlusion => "occlusion",
            Self::CgmDisconnection => "CGM disconnection",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Bolus {
        kind: BolusKind,
        units: f32,
        duration_minutes: u32,
        cancelled: bool,
    },
    BasalChange {
        old_rate: f32,
        new_rate: f32,
        reason: String,
    },
    ProfileChange {
        old_profile: String,
        new_profile: String,
    },
    Suspend {
        reason: String,
    },
    Resume {
        reason: String,
    },
    CgmReading {
        value: f32,
    },
    Alarm {
        kind: AlarmKind,
        details: String,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn bolus(
        timestamp: DateTime<Utc>,
        kind: BolusKind,
        units: f32,
        duration_minutes: u32,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::Bolus {
                kind,
                units,
                duration_minutes,
                cancelled: false,
            },
        }
    }

    pub fn basal_change(
        timestamp: DateTime<Utc>,
        old_rate: f32,
        new_rate: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::BasalChange {
                old_rate,
                new_rate,
                reason: reason.into(),
            },
        }
    }

    pub fn profile_change(
        timestamp: DateTime<Utc>,
        old_profile: impl Into<String>,
        new_profile: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::ProfileChange {
                old_profile: old_profile.into(),
                new_profile: new_profile.into(),
            },
        }
    }

    pub fn suspend(timestamp: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: EventKind::Suspend {
                reason: reason.into(),
            },
        }
    }

    pub fn resume(timestamp: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: EventKind::Resume {
                reason: reason.into(),
            },
        }
    }

    pub fn cgm_reading(timestamp: DateTime<Utc>, value: f32) -> Self {
        Self {
            timestamp,
            kind: EventKind::CgmReading { value },
        }
    }

    pub fn alarm(timestamp: DateTime<Utc>, kind: AlarmKind, details: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: EventKind::Alarm {
                kind,
                details: details.into(),
            },
        }
    }

    pub fn error(
        timestamp: DateTime<Utc>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::Error {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Whether this is a bolus event that has not been cancelled.
    pub fn is_uncancelled_bolus(&self) -> bool {
        matches!(self.kind, EventKind::Bolus { cancelled: false, .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Bolus {
                kind,
                units,
                duration_minutes,
                cancelled,
            } => {
                write!(f, "{kind} bolus of {units:.1} units")?;
                if *duration_minutes > 0 {
                    write!(f, " over {duration_minutes} minutes")?;
                }
                if *cancelled {
                    write!(f, " (cancelled)")?;
                }
                Ok(())
            }
            EventKind::BasalChange {
                old_rate,
                new_rate,
                reason,
            } => write!(
                f,
                "Basal rate changed from {old_rate:.2} to {new_rate:.2} U/hr: {reason}"
            ),
            EventKind::ProfileChange {
                old_profile,
                new_profile,
            } => write!(f, "Profile changed from {old_profile} to {new_profile}"),
            EventKind::Suspend { reason } => write!(f, "Insulin delivery suspended: {reason}"),
            EventKind::Resume { reason } => write!(f, "Insulin delivery resumed: {reason}"),
            EventKind::CgmReading { value } => write!(f, "CGM reading: {value:.1} mmol/L"),
            EventKind::Alarm { kind, details } => write!(f, "Alarm ({kind}): {details}"),
            EventKind::Error { code, message } => write!(f, "Error {code}: {message}"),
        }
    }
}

/// Append-only log of pump events, monotonic in call order. Callers supply
/// non-decreasing timestamps; the log does not enforce ordering.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Events with timestamps in `[start, end]`, original order.
    pub fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter(move |e| e.timestamp >= start && e.timestamp <= end)
    }

    /// Up to the last `n` events, most-recent-first.
    pub fn most_recent(&self, n: usize) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().rev().take(n)
    }

    /// Reverse scan for the most recent bolus whose cancelled flag is still
    /// false.
    pub fn latest_uncancelled_bolus(&self) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.is_uncancelled_bolus())
    }

    /// Mark the most recent uncancelled bolus as cancelled, in place, and
    /// return its units. The flag transition is one-way.
    pub fn cancel_latest_bolus(&mut self) -> Result<f32, HistoryError> {
        let event = self
            .events
            .iter_mut()
            .rev()
            .find(|e| e.is_uncancelled_bolus())
            .ok_or(HistoryError::NoActiveBolus)?;
        match &mut event.kind {
            EventKind::Bolus {
                units, cancelled, ..
            } => {
                *cancelled = true;
                Ok(*units)
            }
            // is_uncancelled_bolus only matches Bolus events.
            _ => Err(HistoryError::NoActiveBolus),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
