//! Dosing profiles: four time-of-day schedules plus insulin action duration.

use crate::schedule::ScheduleTable;

/// A named set of delivery parameters. The controller's registry owns
/// profiles outright; callers edit a clone and replace the whole profile.
#[derive(Debug, Clone, PartialEq)]
pub struct DosingProfile {
    name: String,
    basal_rates: ScheduleTable,
    carb_ratios: ScheduleTable,
    correction_factors: ScheduleTable,
    target_glucoses: ScheduleTable,
    insulin_action_hours: f32,
}

impl DosingProfile {
    /// A fresh profile with empty tables. Not valid until every table has at
    /// least one segment and the action duration is positive.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            basal_rates: ScheduleTable::new(),
            carb_ratios: ScheduleTable::new(),
            correction_factors: ScheduleTable::new(),
            target_glucoses: ScheduleTable::new(),
            insulin_action_hours: 0.0,
        }
    }

    /// A profile with a single midnight segment in every table, covering the
    /// whole day at constant values. Used to seed the "Default" profile.
    pub fn uniform(
        name: impl Into<String>,
        basal_rate: f32,
        carb_ratio: f32,
        correction_factor: f32,
        target_glucose: f32,
        insulin_action_hours: f32,
    ) -> Self {
        let mut p = Self::new(name);
        // Boundary 0 is always in range.
        let _ = p.basal_rates.set(0, basal_rate);
        let _ = p.carb_ratios.set(0, carb_ratio);
        let _ = p.correction_factors.set(0, correction_factor);
        let _ = p.target_glucoses.set(0, target_glucose);
        p.insulin_action_hours = insulin_action_hours;
        p
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn basal_rates(&self) -> &ScheduleTable {
        &self.basal_rates
    }

    pub fn basal_rates_mut(&mut self) -> &mut ScheduleTable {
        &mut self.basal_rates
    }

    pub fn carb_ratios(&self) -> &ScheduleTable {
        &self.carb_ratios
    }

    pub fn carb_ratios_mut(&mut self) -> &mut ScheduleTable {
        &mut self.carb_ratios
    }

    pub fn correction_factors(&self) -> &ScheduleTable {
        &self.correction_factors
    }

    pub fn correction_factors_mut(&mut self) -> &mut ScheduleTable {
        &mut self.correction_factors
    }

    pub fn target_glucoses(&self) -> &ScheduleTable {
        &self.target_glucoses
    }

    pub fn target_glucoses_mut(&mut self) -> &mut ScheduleTable {
        &mut self.target_glucoses
    }

    pub fn insulin_action_hours(&self) -> f32 {
        self.insulin_action_hours
    }

    pub fn set_insulin_action_hours(&mut self, hours: f32) {
        self.insulin_action_hours = hours;
    }

    /// Pure derived predicate: every table populated and a positive action
    /// duration.
    pub fn is_valid(&self) -> bool {
        self.validation_message().is_none()
    }

    /// First unmet invariant, or `None` when the profile is complete.
    pub fn validation_message(&self) -> Option<String> {
        if self.basal_rates.is_empty() {
            return Some("No basal rates defined".to_string());
        }
        if self.carb_ratios.is_empty() {
            return Some("No carb ratios defined".to_string());
        }
        if self.correction_factors.is_empty() {
            return Some("No correction factors defined".to_string());
        }
        if self.target_glucoses.is_empty() {
            return Some("No target glucose levels defined".to_string());
        }
        if !(self.insulin_action_hours.is_finite() && self.insulin_action_hours > 0.0) {
            return Some("Insulin action duration must be positive".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_profile_is_incomplete() {
        let p = DosingProfile::new("Night");
        assert!(!p.is_valid());
        assert_eq!(
            p.validation_message().as_deref(),
            Some("No basal rates defined")
        );
    }

    #[test]
    fn validation_reports_first_missing_piece() {
        let mut p = DosingProfile::new("Night");
        p.basal_rates_mut().set(0, 0.5).unwrap();
        assert_eq!(
            p.validation_message().as_deref(),
            Some("No carb ratios defined")
        );

        p.carb_ratios_mut().set(0, 15.0).unwrap();
        p.correction_factors_mut().set(0, 2.0).unwrap();
        p.target_glucoses_mut().set(0, 6.7).unwrap();
        assert_eq!(
            p.validation_message().as_deref(),
            Some("Insulin action duration must be positive")
        );

        p.set_insulin_action_hours(5.0);
        assert!(p.is_valid());
    }

    #[test]
    fn uniform_profile_is_valid_and_constant() {
        let p = DosingProfile::uniform("Default", 0.5, 15.0, 2.0, 6.7, 5.0);
        assert!(p.is_valid());
        assert_eq!(p.basal_rates().get(4, 30).unwrap(), 0.5);
        assert_eq!(p.target_glucoses().get(21, 15).unwrap(), 6.7);
    }
}
