use thiserror::Error;

/// Persistent controller-wide error state.
///
/// Set by guard failures (power-on with a dead battery, basal start with an
/// empty reservoir, low-reservoir watermark after a bolus) and cleared only
/// by `clear_error` or the corrective actions documented on `charge_battery`
/// and `refill_insulin`. `Occlusion` and `CgmDisconnection` are reserved for
/// external simulation triggers; no core operation raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    #[default]
    None,
    LowBattery,
    LowInsulin,
    Occlusion,
    CgmDisconnection,
    CriticalError,
}

/// Per-call failures from the glucose series (read-only queries plus the
/// single append mutator). These never touch controller error state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SeriesError {
    #[error("no glucose readings recorded")]
    NoData,
    #[error("insufficient glucose data for the requested computation")]
    InsufficientData,
    #[error("glucose value must be finite")]
    NonFiniteValue,
}

/// Per-call failures from time-of-day schedule tables.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule table has no entries")]
    EmptyTable,
    #[error("segment start {0} out of range (0-1439 minutes)")]
    OutOfRange(u16),
}

/// Per-call failures from the event log.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    #[error("no active bolus to cancel")]
    NoActiveBolus,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
