use pump_config::PumpSettings;
use pump_core::{BolusKind, ErrorKind, EventKind, PumpController, PumpState};
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

#[test]
fn bolus_disallowed_when_off_sleeping() {
    let mut settings = PumpSettings::default();
    settings.reservoir.units = 100.0;
    let mut pump = PumpController::builder()
        .with_settings(settings)
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .expect("build pump");

    assert!(!pump.deliver_bolus(2.0, false, 0));

    assert!(pump.power_on());
    assert!(pump.sleep());
    assert!(!pump.deliver_bolus(2.0, false, 0));
    assert!(pump.event_log().is_empty() || pump.event_log().iter().all(|e| !matches!(e.kind, EventKind::Bolus { .. })));
}

#[test]
fn bolus_guards_fail_silently_without_state_change() {
    let mut pump = powered_pump(10.0);

    // Non-positive units
    assert!(!pump.deliver_bolus(0.0, false, 0));
    assert!(!pump.deliver_bolus(-1.0, false, 0));
    // More than the reservoir holds
    assert!(!pump.deliver_bolus(10.5, false, 0));
    // Extended bolus without a duration
    assert!(!pump.deliver_bolus(2.0, true, 0));

    assert_eq!(pump.state(), PumpState::On);
    assert!((pump.reservoir_units() - 10.0).abs() < 1e-6);
    assert_eq!(pump.insulin_on_board(), 0.0);
    assert_eq!(pump.error_kind(), ErrorKind::None);
    assert!(pump.last_bolus().is_none());
}

#[test]
fn standard_bolus_updates_accounting_and_advances_to_basal() {
    let mut pump = powered_pump(300.0);
    assert!(pump.deliver_bolus(10.0, false, 0));

    assert_eq!(pump.state(), PumpState::DeliveringBasal);
    assert!((pump.reservoir_units() - 290.0).abs() < 1e-4);
    assert!((pump.insulin_on_board() - 10.0).abs() < 1e-6);
    let last = pump.last_bolus().expect("last bolus recorded");
    assert!((last.units - 10.0).abs() < 1e-6);

    let bolus = pump
        .event_log()
        .latest_uncancelled_bolus()
        .expect("bolus event");
    assert!(matches!(
        bolus.kind,
        EventKind::Bolus { kind: BolusKind::Manual, cancelled: false, .. }
    ));
}

#[test]
fn extended_bolus_stays_in_bolus_state() {
    let mut pump = powered_pump(300.0);
    assert!(pump.deliver_bolus(6.0, true, 90));
    assert_eq!(pump.state(), PumpState::DeliveringBolus);

    let bolus = pump
        .event_log()
        .latest_uncancelled_bolus()
        .expect("bolus event");
    assert!(matches!(
        bolus.kind,
        EventKind::Bolus {
            kind: BolusKind::Extended,
            duration_minutes: 90,
            ..
        }
    ));
}

#[test]
fn bolus_below_watermark_raises_low_insulin() {
    let mut pump = powered_pump(55.0);
    assert!(pump.deliver_bolus(10.0, false, 0));
    assert!((pump.reservoir_units() - 45.0).abs() < 1e-4);
    assert_eq!(pump.error_kind(), ErrorKind::LowInsulin);
    assert_eq!(pump.error_message(), "Low insulin reservoir");
}

#[test]
fn refill_past_watermark_clears_low_insulin() {
    let mut pump = powered_pump(55.0);
    assert!(pump.deliver_bolus(10.0, false, 0));
    assert_eq!(pump.error_kind(), ErrorKind::LowInsulin);

    // 45 -> 50: not above the watermark yet
    assert!(pump.refill_insulin(5.0));
    assert_eq!(pump.error_kind(), ErrorKind::LowInsulin);

    // 50 -> 60: cleared
    assert!(pump.refill_insulin(10.0));
    assert_eq!(pump.error_kind(), ErrorKind::None);
}

#[test]
fn low_insulin_watermark_only_fires_when_no_error_is_set() {
    let mut pump = powered_pump(55.0);
    assert!(pump.deliver_bolus(10.0, false, 0));
    assert_eq!(pump.error_kind(), ErrorKind::LowInsulin);
    let first_message = pump.error_message().to_string();

    // A second crossing while an error is already set leaves it untouched.
    assert!(pump.deliver_bolus(10.0, false, 0));
    assert_eq!(pump.error_kind(), ErrorKind::LowInsulin);
    assert_eq!(pump.error_message(), first_message);
}

#[test]
fn cancel_returns_half_and_marks_event() {
    let mut pump = powered_pump(300.0);
    assert!(pump.deliver_bolus(10.0, true, 60));
    assert_eq!(pump.state(), PumpState::DeliveringBolus);
    assert!((pump.reservoir_units() - 290.0).abs() < 1e-4);
    assert!((pump.insulin_on_board() - 10.0).abs() < 1e-6);

    assert!(pump.cancel_bolus());
    // Half returns to the reservoir, half counts as delivered.
    assert!((pump.reservoir_units() - 295.0).abs() < 1e-4);
    assert!((pump.insulin_on_board() - 5.0).abs() < 1e-6);
    assert_eq!(pump.state(), PumpState::DeliveringBasal);

    // The originating event is flagged in place and stays flagged.
    assert!(pump.event_log().latest_uncancelled_bolus().is_none());
    assert!(pump.event_log().iter().any(|e| matches!(
        e.kind,
        EventKind::Bolus { cancelled: true, .. }
    )));
    assert!(pump.event_log().iter().any(|e| matches!(
        &e.kind,
        EventKind::Suspend { reason } if reason == "Bolus cancelled"
    )));
}

#[test]
fn cancel_requires_an_active_bolus_state() {
    let mut pump = powered_pump(300.0);
    assert!(!pump.cancel_bolus());

    // A standard bolus completes instantly, so there is nothing to cancel.
    assert!(pump.deliver_bolus(5.0, false, 0));
    assert_eq!(pump.state(), PumpState::DeliveringBasal);
    assert!(!pump.cancel_bolus());
    assert!((pump.reservoir_units() - 295.0).abs() < 1e-4);

    // An extended bolus can be cancelled exactly once.
    assert!(pump.deliver_bolus(4.0, true, 30));
    assert!(pump.cancel_bolus());
    assert!(!pump.cancel_bolus());
}

#[test]
fn stop_basal_also_suspends_an_extended_bolus() {
    let mut pump = powered_pump(300.0);
    assert!(pump.deliver_bolus(6.0, true, 90));
    assert_eq!(pump.state(), PumpState::DeliveringBolus);
    assert!(pump.stop_basal());
    assert_eq!(pump.state(), PumpState::Suspended);
}
