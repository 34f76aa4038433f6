#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Insulin pump control logic (hardware-agnostic behavioral model).
//!
//! This crate models the controller of an insulin infusion pump: its
//! operating-state machine, battery/reservoir gating, time-of-day dosing
//! profiles, delivery/alarm history, and glucose trend analysis. All time
//! flows through the `pump_traits::Clock` seam, so behavior is deterministic
//! under test.
//!
//! ## Architecture
//!
//! - **Schedules**: time-of-day keyed parameter tables (`schedule` module)
//! - **Profiles**: four schedules plus insulin action duration (`profile`)
//! - **Glucose**: append-only CGM series with statistics and linear
//!   projection (`glucose`)
//! - **Events**: closed-variant delivery/alarm history (`event`)
//! - **Controller**: the state machine and safety gates (`controller`)
//!
//! The model is single-threaded and synchronous: every operation runs to
//! completion, and bolus delivery completion is collapsed into an immediate
//! state transition rather than a timer.

pub mod controller;
pub mod error;
pub mod event;
pub mod glucose;
pub mod profile;
pub mod schedule;

pub use controller::{
    DEFAULT_PROFILE, FULL_BATTERY_PERCENT, LOW_BATTERY_CLEAR_PERCENT, LOW_RESERVOIR_UNITS,
    LastBolus, PumpController, PumpControllerBuilder, PumpState, RESERVOIR_CAPACITY_UNITS,
};
pub use error::{BuildError, ErrorKind, HistoryError, ScheduleError, SeriesError};
pub use event::{AlarmKind, BolusKind, Event, EventKind, EventLog};
pub use glucose::{GlucoseReading, GlucoseSeries, HIGH_GLUCOSE_MMOL, LOW_GLUCOSE_MMOL};
pub use profile::DosingProfile;
pub use schedule::{MINUTES_PER_DAY, ScheduleTable};
