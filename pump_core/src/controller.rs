//! The pump controller: operating-state machine, battery/reservoir gating,
//! profile registry, and dosing suggestions.
//!
//! State-changing operations return a plain success flag and, on certain
//! guard failures, set the controller-wide error state (see `ErrorKind`).
//! Query components signal typed per-call errors instead and never touch
//! shared error state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pump_config::PumpSettings;
use pump_traits::{Clock, SystemClock, minute_of_day};

use crate::error::{BuildError, ErrorKind, Result};
use crate::event::{AlarmKind, BolusKind, Event, EventLog};
use crate::glucose::{GlucoseSeries, HIGH_GLUCOSE_MMOL, LOW_GLUCOSE_MMOL};
use crate::profile::DosingProfile;

/// Cartridge capacity in insulin units.
pub const RESERVOIR_CAPACITY_UNITS: f32 = 300.0;
/// Reservoir watermark below which a LowInsulin error is raised after a
/// bolus, and above which a refill clears it.
pub const LOW_RESERVOIR_UNITS: f32 = 50.0;
/// Battery level a charge must exceed to clear a LowBattery error.
pub const LOW_BATTERY_CLEAR_PERCENT: f32 = 15.0;
/// Full battery charge in percent.
pub const FULL_BATTERY_PERCENT: f32 = 100.0;
/// Name of the built-in profile that always exists and cannot be deleted.
pub const DEFAULT_PROFILE: &str = "Default";

/// Operating states of the pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Off,
    On,
    Sleep,
    DeliveringBolus,
    DeliveringBasal,
    Suspended,
    Error,
}

/// Amount and wall-clock time of the most recent bolus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastBolus {
    pub time: DateTime<Utc>,
    pub units: f32,
}

pub struct PumpController {
    state: PumpState,
    error_kind: ErrorKind,
    error_message: String,

    battery_percent: f32,
    reservoir_units: f32,
    insulin_on_board: f32,
    last_bolus: Option<LastBolus>,

    control_iq_enabled: bool,
    cgm_connected: bool,
    current_glucose: f32,

    active_profile: String,
    profiles: BTreeMap<String, DosingProfile>,

    events: EventLog,
    glucose: GlucoseSeries,

    // Injected wall clock for time-of-day resolution and event timestamps.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for PumpController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PumpController")
            .field("state", &self.state)
            .field("error_kind", &self.error_kind)
            .field("battery_percent", &self.battery_percent)
            .field("reservoir_units", &self.reservoir_units)
            .field("insulin_on_board", &self.insulin_on_board)
            .field("active_profile", &self.active_profile)
            .finish()
    }
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpController {
    /// A pump with default settings and the real system clock.
    pub fn new() -> Self {
        Self::from_parts(&PumpSettings::default(), Arc::new(SystemClock::new()))
    }

    /// Start building a pump with explicit settings or clock.
    pub fn builder() -> PumpControllerBuilder {
        PumpControllerBuilder::default()
    }

    fn from_parts(settings: &PumpSettings, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let p = settings.default_profile;
        let default_profile = DosingProfile::uniform(
            DEFAULT_PROFILE,
            p.basal_rate,
            p.carb_ratio,
            p.correction_factor,
            p.target_glucose,
            p.insulin_action_hours,
        );
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), default_profile);

        Self {
            state: PumpState::Off,
            error_kind: ErrorKind::None,
            error_message: String::new(),
            battery_percent: settings.power.battery_percent,
            reservoir_units: settings.reservoir.units,
            insulin_on_board: 0.0,
            last_bolus: None,
            control_iq_enabled: false,
            cgm_connected: false,
            current_glucose: 0.0,
            active_profile: DEFAULT_PROFILE.to_string(),
            profiles,
            events: EventLog::new(),
            glucose: GlucoseSeries::new(),
            clock,
        }
    }

    fn set_error(&mut self, kind: ErrorKind, message: &str) {
        tracing::warn!(?kind, message, "pump error set");
        self.error_kind = kind;
        self.error_message = message.to_string();
    }

    // ---- power and sleep -------------------------------------------------

    pub fn power_on(&mut self) -> bool {
        if self.state != PumpState::Off {
            return false;
        }
        if self.battery_percent <= 0.0 {
            self.set_error(ErrorKind::LowBattery, "Cannot power on: Battery depleted");
            return false;
        }
        self.state = PumpState::On;
        let now = self.clock.now();
        self.events.append(Event::resume(now, "Power on"));
        tracing::debug!("pump powered on");
        true
    }

    pub fn power_off(&mut self) -> bool {
        if self.state == PumpState::Off {
            return false;
        }
        // An active delivery is suspended by the power-off.
        if matches!(
            self.state,
            PumpState::DeliveringBolus | PumpState::DeliveringBasal
        ) {
            let now = self.clock.now();
            self.events.append(Event::suspend(now, "Power off"));
        }
        self.state = PumpState::Off;
        tracing::debug!("pump powered off");
        true
    }

    pub fn sleep(&mut self) -> bool {
        if matches!(self.state, PumpState::On | PumpState::DeliveringBasal) {
            self.state = PumpState::Sleep;
            return true;
        }
        false
    }

    pub fn wake(&mut self) -> bool {
        if self.state == PumpState::Sleep {
            self.state = PumpState::On;
            return true;
        }
        false
    }

    // ---- battery and reservoir -------------------------------------------

    pub fn battery_percent(&self) -> f32 {
        self.battery_percent
    }

    pub fn reservoir_units(&self) -> f32 {
        self.reservoir_units
    }

    pub fn charge_battery(&mut self, amount: f32) -> bool {
        if !(amount.is_finite() && amount > 0.0) {
            return false;
        }
        self.battery_percent = (self.battery_percent + amount).min(FULL_BATTERY_PERCENT);
        if self.error_kind == ErrorKind::LowBattery
            && self.battery_percent > LOW_BATTERY_CLEAR_PERCENT
        {
            self.clear_error();
        }
        true
    }

    pub fn refill_insulin(&mut self, amount: f32) -> bool {
        if !(amount.is_finite() && amount > 0.0) {
            return false;
        }
        if self.state == PumpState::Off {
            return false;
        }
        self.reservoir_units = (self.reservoir_units + amount).min(RESERVOIR_CAPACITY_UNITS);
        if self.error_kind == ErrorKind::LowInsulin && self.reservoir_units > LOW_RESERVOIR_UNITS {
            self.clear_error();
        }
        true
    }

    // ---- profile registry --------------------------------------------------

    pub fn create_profile(&mut self, name: &str) -> bool {
        if name.is_empty() || self.profiles.contains_key(name) {
            return false;
        }
        self.profiles
            .insert(name.to_string(), DosingProfile::new(name));
        true
    }

    /// Read-only view of a profile. Edit a clone and apply it with
    /// `update_profile`.
    pub fn profile(&self, name: &str) -> Option<&DosingProfile> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Replace a profile wholesale. The registry key stays authoritative for
    /// the profile's name.
    pub fn update_profile(&mut self, name: &str, mut profile: DosingProfile) -> bool {
        if name.is_empty() || !self.profiles.contains_key(name) {
            return false;
        }
        profile.set_name(name);
        self.profiles.insert(name.to_string(), profile);
        if name == self.active_profile {
            let now = self.clock.now();
            self.events.append(Event::profile_change(now, name, name));
        }
        true
    }

    pub fn delete_profile(&mut self, name: &str) -> bool {
        if name == DEFAULT_PROFILE || !self.profiles.contains_key(name) {
            return false;
        }
        // Deleting the active profile falls back to the built-in default.
        if name == self.active_profile {
            self.activate_profile(DEFAULT_PROFILE);
        }
        self.profiles.remove(name);
        true
    }

    pub fn activate_profile(&mut self, name: &str) -> bool {
        if !self.profiles.contains_key(name) {
            return false;
        }
        let now = self.clock.now();
        self.events
            .append(Event::profile_change(now, self.active_profile.clone(), name));
        let old_name = std::mem::replace(&mut self.active_profile, name.to_string());

        // A profile switch mid-delivery re-resolves the basal rate; only an
        // actual rate change is worth a BasalChange entry.
        if self.state == PumpState::DeliveringBasal {
            let minute = minute_of_day(now);
            let old_rate = self
                .profiles
                .get(&old_name)
                .and_then(|p| p.basal_rates().value_at(minute).ok());
            let new_rate = self
                .profiles
                .get(name)
                .and_then(|p| p.basal_rates().value_at(minute).ok());
            if let (Some(old_rate), Some(new_rate)) = (old_rate, new_rate)
                && old_rate != new_rate
            {
                self.events
                    .append(Event::basal_change(now, old_rate, new_rate, "Profile change"));
            }
        }
        tracing::debug!(profile = name, "profile activated");
        true
    }

    pub fn active_profile_name(&self) -> &str {
        &self.active_profile
    }

    pub fn active_profile(&self) -> Option<&DosingProfile> {
        self.profiles.get(&self.active_profile)
    }

    // ---- insulin delivery --------------------------------------------------

    pub fn deliver_bolus(&mut self, units: f32, extended: bool, duration_minutes: u32) -> bool {
        if matches!(
            self.state,
            PumpState::Off | PumpState::Sleep | PumpState::Error
        ) {
            return false;
        }
        if !(units.is_finite() && units > 0.0) || self.reservoir_units < units {
            return false;
        }
        if extended && duration_minutes == 0 {
            return false;
        }

        let kind = if extended {
            BolusKind::Extended
        } else {
            BolusKind::Manual
        };
        let now = self.clock.now();
        self.events
            .append(Event::bolus(now, kind, units, duration_minutes));

        self.state = PumpState::DeliveringBolus;
        self.reservoir_units -= units;
        self.insulin_on_board += units;
        self.last_bolus = Some(LastBolus { time: now, units });
        tracing::debug!(units, extended, "bolus delivery started");

        if self.reservoir_units < LOW_RESERVOIR_UNITS && self.error_kind == ErrorKind::None {
            self.set_error(ErrorKind::LowInsulin, "Low insulin reservoir");
        }

        // Instantaneous delivery for a standard bolus; an extended bolus
        // stays in DeliveringBolus until cancelled.
        if !extended {
            self.state = PumpState::DeliveringBasal;
        }
        true
    }

    /// Cancel the in-flight bolus. Half of its units are modeled as already
    /// absorbed; the other half returns to the reservoir and leaves the
    /// insulin-on-board tally.
    pub fn cancel_bolus(&mut self) -> bool {
        if self.state != PumpState::DeliveringBolus {
            return false;
        }
        let units = match self.events.cancel_latest_bolus() {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!(error = %e, "cancel_bolus found nothing to cancel");
                return false;
            }
        };
        let undelivered = units / 2.0;
        self.reservoir_units =
            (self.reservoir_units + undelivered).min(RESERVOIR_CAPACITY_UNITS);
        self.insulin_on_board = (self.insulin_on_board - undelivered).max(0.0);

        let now = self.clock.now();
        self.events.append(Event::suspend(now, "Bolus cancelled"));
        self.state = PumpState::DeliveringBasal;
        tracing::debug!(units, undelivered, "bolus cancelled");
        true
    }

    pub fn start_basal(&mut self) -> bool {
        if matches!(
            self.state,
            PumpState::Off | PumpState::Sleep | PumpState::Error
        ) {
            return false;
        }
        if self.reservoir_units <= 0.0 {
            self.set_error(ErrorKind::LowInsulin, "Cannot start basal: No insulin");
            return false;
        }
        self.state = PumpState::DeliveringBasal;

        let now = self.clock.now();
        let minute = minute_of_day(now);
        if let Some(rate) = self
            .active_profile()
            .and_then(|p| p.basal_rates().value_at(minute).ok())
        {
            self.events
                .append(Event::basal_change(now, 0.0, rate, "Basal started"));
        }
        tracing::debug!("basal delivery started");
        true
    }

    pub fn stop_basal(&mut self) -> bool {
        if !matches!(
            self.state,
            PumpState::DeliveringBasal | PumpState::DeliveringBolus
        ) {
            return false;
        }
        self.state = PumpState::Suspended;
        let now = self.clock.now();
        self.events
            .append(Event::suspend(now, "User stopped insulin"));
        tracing::debug!("insulin delivery suspended");
        true
    }

    pub fn resume_basal(&mut self) -> bool {
        if self.state != PumpState::Suspended {
            return false;
        }
        if self.reservoir_units <= 0.0 {
            self.set_error(ErrorKind::LowInsulin, "Cannot resume basal: No insulin");
            return false;
        }
        self.state = PumpState::DeliveringBasal;

        let now = self.clock.now();
        self.events
            .append(Event::resume(now, "User resumed insulin"));
        let minute = minute_of_day(now);
        if let Some(rate) = self
            .active_profile()
            .and_then(|p| p.basal_rates().value_at(minute).ok())
        {
            self.events
                .append(Event::basal_change(now, 0.0, rate, "Basal resumed"));
        }
        tracing::debug!("basal delivery resumed");
        true
    }

    pub fn insulin_on_board(&self) -> f32 {
        self.insulin_on_board
    }

    pub fn last_bolus(&self) -> Option<LastBolus> {
        self.last_bolus
    }

    // ---- Control-IQ and CGM ------------------------------------------------

    pub fn enable_control_iq(&mut self) -> bool {
        if matches!(self.state, PumpState::Off | PumpState::Error) {
            return false;
        }
        // Automated adjustment is meaningless without a glucose feed.
        if !self.cgm_connected {
            return false;
        }
        self.control_iq_enabled = true;
        true
    }

    pub fn disable_control_iq(&mut self) -> bool {
        self.control_iq_enabled = false;
        true
    }

    pub fn is_control_iq_enabled(&self) -> bool {
        self.control_iq_enabled
    }

    pub fn connect_cgm(&mut self) -> bool {
        self.cgm_connected = true;
        true
    }

    pub fn disconnect_cgm(&mut self) -> bool {
        self.cgm_connected = false;
        true
    }

    pub fn is_cgm_connected(&self) -> bool {
        self.cgm_connected
    }

    pub fn current_glucose(&self) -> f32 {
        self.current_glucose
    }

    /// Record a CGM sample: appends to the series, logs a CGMReading event,
    /// and logs a low/high glucose alarm when the value crosses a threshold.
    /// Rejects non-finite values.
    pub fn update_cgm_data(&mut self, value: f32) -> bool {
        let now = self.clock.now();
        if self.glucose.append(value, now).is_err() {
            tracing::warn!(value, "rejected non-finite CGM value");
            return false;
        }
        self.current_glucose = value;
        self.events.append(Event::cgm_reading(now, value));

        if value < LOW_GLUCOSE_MMOL {
            self.events.append(Event::alarm(
                now,
                AlarmKind::LowGlucose,
                format!("Glucose {value:.1} mmol/L below {LOW_GLUCOSE_MMOL} mmol/L"),
            ));
        } else if value > HIGH_GLUCOSE_MMOL {
            self.events.append(Event::alarm(
                now,
                AlarmKind::HighGlucose,
                format!("Glucose {value:.1} mmol/L above {HIGH_GLUCOSE_MMOL} mmol/L"),
            ));
        }
        true
    }

    pub fn glucose_series(&self) -> &GlucoseSeries {
        &self.glucose
    }

    // ---- dosing suggestions --------------------------------------------------

    /// Suggested bolus in units for a glucose level and planned carb intake.
    ///
    /// food = carbs / carb ratio; correction = max(0, glucose - target) /
    /// correction factor; the sum is reduced by insulin on board and floored
    /// at zero. Returns 0 when the active profile cannot resolve all three
    /// parameters at the current time of day.
    pub fn calculate_suggested_bolus(&self, current_glucose: f32, carb_intake: f32) -> f32 {
        let Some(profile) = self.active_profile() else {
            return 0.0;
        };
        let minute = self.clock.minute_of_day();
        let (Ok(carb_ratio), Ok(correction_factor), Ok(target)) = (
            profile.carb_ratios().value_at(minute),
            profile.correction_factors().value_at(minute),
            profile.target_glucoses().value_at(minute),
        ) else {
            return 0.0;
        };
        if carb_ratio <= 0.0 || correction_factor <= 0.0 {
            return 0.0;
        }

        let food = carb_intake / carb_ratio;
        let correction = (current_glucose - target).max(0.0) / correction_factor;
        (food + correction - self.insulin_on_board).max(0.0)
    }

    // ---- history ---------------------------------------------------------------

    /// Events with timestamps in `[start, end]`, original order.
    pub fn history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Event> + '_ {
        self.events.range(start, end)
    }

    /// Up to the last `n` events, most-recent-first.
    pub fn recent_events(&self, n: usize) -> impl Iterator<Item = &Event> + '_ {
        self.events.most_recent(n)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    // ---- error state ----------------------------------------------------------

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn clear_error(&mut self) -> bool {
        self.error_kind = ErrorKind::None;
        self.error_message.clear();
        true
    }
}

/// Builder for `PumpController`. Settings are validated on `build()`.
#[derive(Default)]
pub struct PumpControllerBuilder {
    settings: Option<PumpSettings>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
}

impl PumpControllerBuilder {
    pub fn with_settings(mut self, settings: PumpSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Provide a custom clock; defaults to `SystemClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<PumpController> {
        let settings = self.settings.unwrap_or_default();

        if !(0.0..=FULL_BATTERY_PERCENT).contains(&settings.power.battery_percent) {
            return Err(eyre::Report::new(BuildError::InvalidSettings(
                "battery_percent must be in [0, 100]",
            )));
        }
        if !(0.0..=RESERVOIR_CAPACITY_UNITS).contains(&settings.reservoir.units) {
            return Err(eyre::Report::new(BuildError::InvalidSettings(
                "reservoir units must be in [0, 300]",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(SystemClock::new()),
        };

        let pump = PumpController::from_parts(&settings, clock);
        // The active profile must always resolve in the registry, from the
        // very first operation on.
        if pump.active_profile().is_none_or(|p| !p.is_valid()) {
            return Err(eyre::Report::new(BuildError::InvalidSettings(
                "default profile values are incomplete",
            )));
        }
        Ok(pump)
    }
}
