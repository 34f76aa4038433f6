#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Settings schemas and schedule parsing for the pump controller.
//!
//! - `PumpSettings` and sub-structs are deserialized from TOML and validated.
//! - Schedule CSV loader enforces headers and segment-boundary ordering so
//!   operator-supplied files cannot produce an inconsistent `ScheduleTable`.

use serde::Deserialize;

/// Schedule CSV schema: one time-of-day segment boundary per row.
///
/// Expected headers:
/// minutes,value
///
/// Example:
/// minutes,value
/// 0,0.5
/// 360,0.8
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ScheduleRow {
    /// Segment start in minutes since midnight (0–1439).
    pub minutes: u16,
    /// Parameter value at that segment (units depend on the table).
    pub value: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PowerCfg {
    /// Initial battery charge in percent.
    pub battery_percent: f32,
}

impl Default for PowerCfg {
    fn default() -> Self {
        Self {
            battery_percent: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReservoirCfg {
    /// Initial reservoir fill in insulin units. The cartridge ships empty;
    /// a refill is required before delivery can start.
    pub units: f32,
}

/// Single-segment values used to seed the undeletable "Default" profile.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DefaultProfileCfg {
    /// Basal rate in units per hour.
    pub basal_rate: f32,
    /// Carb ratio in grams of carbohydrate per unit.
    pub carb_ratio: f32,
    /// Correction factor in mmol/L glucose drop per unit.
    pub correction_factor: f32,
    /// Target glucose in mmol/L.
    pub target_glucose: f32,
    /// Insulin action duration in hours.
    pub insulin_action_hours: f32,
}

impl Default for DefaultProfileCfg {
    fn default() -> Self {
        Self {
            basal_rate: 0.5,
            carb_ratio: 15.0,
            correction_factor: 2.0,
            target_glucose: 6.7,
            insulin_action_hours: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PumpSettings {
    #[serde(default)]
    pub power: PowerCfg,
    #[serde(default)]
    pub reservoir: ReservoirCfg,
    #[serde(default)]
    pub default_profile: DefaultProfileCfg,
}

pub fn load_toml(s: &str) -> Result<PumpSettings, toml::de::Error> {
    toml::from_str::<PumpSettings>(s)
}

impl PumpSettings {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(0.0..=100.0).contains(&self.power.battery_percent) {
            eyre::bail!("power.battery_percent must be in [0, 100]");
        }
        if !(0.0..=300.0).contains(&self.reservoir.units) {
            eyre::bail!("reservoir.units must be in [0, 300]");
        }

        let p = &self.default_profile;
        if !(p.basal_rate.is_finite() && p.basal_rate >= 0.0) {
            eyre::bail!("default_profile.basal_rate must be >= 0");
        }
        if !(p.carb_ratio.is_finite() && p.carb_ratio > 0.0) {
            eyre::bail!("default_profile.carb_ratio must be > 0");
        }
        if !(p.correction_factor.is_finite() && p.correction_factor > 0.0) {
            eyre::bail!("default_profile.correction_factor must be > 0");
        }
        if !(p.target_glucose.is_finite() && p.target_glucose > 0.0) {
            eyre::bail!("default_profile.target_glucose must be > 0");
        }
        if !(p.insulin_action_hours.is_finite() && p.insulin_action_hours > 0.0) {
            eyre::bail!("default_profile.insulin_action_hours must be > 0");
        }

        Ok(())
    }
}

/// Load schedule segment boundaries from a CSV file with strict headers.
///
/// Rules enforced here rather than in the core table:
/// - headers must be exactly `minutes,value`
/// - minutes must be < 1440 and strictly increasing
/// - values must be finite
pub fn load_schedule_csv(path: &std::path::Path) -> eyre::Result<Vec<ScheduleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open schedule CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["minutes", "value"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "schedule CSV must have headers 'minutes,value', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<ScheduleRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<ScheduleRow>().enumerate() {
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if row.minutes >= 1440 {
            eyre::bail!(
                "schedule CSV row {}: minutes {} out of range (0–1439)",
                idx + 2,
                row.minutes
            );
        }
        if !row.value.is_finite() {
            eyre::bail!("schedule CSV row {}: value must be finite", idx + 2);
        }
        if let Some(prev) = rows.last()
            && row.minutes <= prev.minutes
        {
            eyre::bail!(
                "schedule CSV row {}: minutes must be strictly increasing ({} after {})",
                idx + 2,
                row.minutes,
                prev.minutes
            );
        }
        rows.push(row);
    }

    if rows.is_empty() {
        eyre::bail!("schedule CSV {:?} contains no segments", path);
    }

    Ok(rows)
}
