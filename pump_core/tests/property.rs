use proptest::prelude::*;
use pump_config::PumpSettings;
use pump_core::{PumpController, RESERVOIR_CAPACITY_UNITS};
use pump_traits::ManualClock;

fn powered_pump(reservoir: f32) -> PumpController {
    let mut settings = PumpSettings::default();
    settings.reservoir.units = reservoir;
    let mut pump = PumpController::builder()
        .with_settings(settings)
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .expect("build pump");
    assert!(pump.power_on());
    pump
}

proptest! {
    /// Battery level stays inside [0, 100] no matter how it is charged.
    #[test]
    fn battery_stays_in_range(amounts in proptest::collection::vec(-50.0f32..200.0, 0..40)) {
        let mut settings = PumpSettings::default();
        settings.power.battery_percent = 40.0;
        let mut pump = PumpController::builder()
            .with_settings(settings)
            .with_clock(Box::new(ManualClock::new()))
            .build()
            .expect("build pump");

        for amount in amounts {
            let _ = pump.charge_battery(amount);
            prop_assert!((0.0..=100.0).contains(&pump.battery_percent()));
        }
    }

    /// The reservoir is never overdrawn and never exceeds capacity under any
    /// interleaving of bolus requests and refills.
    #[test]
    fn reservoir_never_overdrawn(
        ops in proptest::collection::vec((any::<bool>(), 0.1f32..400.0), 0..40),
    ) {
        let mut pump = powered_pump(120.0);

        for (is_refill, amount) in ops {
            let before = pump.reservoir_units();
            if is_refill {
                let _ = pump.refill_insulin(amount);
            } else {
                let delivered = pump.deliver_bolus(amount, false, 0);
                // A granted bolus must have fit in the reservoir.
                if delivered {
                    prop_assert!(amount <= before);
                }
            }
            prop_assert!(pump.reservoir_units() >= 0.0);
            prop_assert!(pump.reservoir_units() <= RESERVOIR_CAPACITY_UNITS);
        }
    }

    /// Insulin on board only grows through boluses and never goes negative
    /// through cancellations.
    #[test]
    fn insulin_on_board_is_never_negative(
        units in proptest::collection::vec(0.1f32..30.0, 1..20),
    ) {
        let mut pump = powered_pump(300.0);

        for u in units {
            let before = pump.insulin_on_board();
            if pump.deliver_bolus(u, true, 30) {
                prop_assert!(pump.insulin_on_board() >= before);
                let _ = pump.cancel_bolus();
            }
            prop_assert!(pump.insulin_on_board() >= 0.0);
        }
    }

    /// A suggestion is never negative and never exceeds the raw
    /// food-plus-correction estimate.
    #[test]
    fn suggestion_is_bounded(
        glucose in 2.0f32..25.0,
        carbs in 0.0f32..200.0,
    ) {
        let pump = powered_pump(300.0);
        let suggested = pump.calculate_suggested_bolus(glucose, carbs);

        // Default profile: carb ratio 15, correction factor 2.0, target 6.7.
        let ceiling = carbs / 15.0 + (glucose - 6.7).max(0.0) / 2.0;
        prop_assert!(suggested >= 0.0);
        prop_assert!(suggested <= ceiling + 1e-4);
    }
}
