//! Integration tests for sleep eligibility, manual requests, and wake.

use super::mock_hw::{RelayCall, started};

use keyswitch::app::commands::AppCommand;
use keyswitch::app::events::AppEvent;
use keyswitch::config::Settings;
use keyswitch::fsm::EnginePhase;
use keyswitch::fsm::context::KeyPosition;
use keyswitch::power::{BOOT_GRACE_MS, INACTIVITY_TIMEOUT_MS, SleepDecision, SleepReason};

#[test]
fn manual_sleep_is_refused_during_boot_grace() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.handle_command(AppCommand::RequestSleep, 30_000, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(app.sleep_check(30_000, &mut sink), SleepDecision::Stay);
    assert!(!app.status(30_000).sleep_eligible);
}

#[test]
fn manual_sleep_after_grace_with_key_off() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let t = BOOT_GRACE_MS + 1_000;
    app.tick(t, &mut hw, &mut sink);
    assert!(app.status(t).sleep_eligible);

    app.handle_command(AppCommand::RequestSleep, t, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        app.sleep_check(t, &mut sink),
        SleepDecision::Sleep(SleepReason::Manual)
    );
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::SleepRequested(SleepReason::Manual))
    ));
}

#[test]
fn refused_manual_request_is_dropped() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let t = BOOT_GRACE_MS + 1_000;
    app.handle_command(AppCommand::SetKeyPosition(1), t, &mut hw, &mut sink)
        .unwrap();
    app.tick(t, &mut hw, &mut sink);
    app.handle_command(AppCommand::RequestSleep, t, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(app.sleep_check(t, &mut sink), SleepDecision::Stay);

    app.handle_command(AppCommand::SetKeyPosition(0), t + 100, &mut hw, &mut sink)
        .unwrap();
    app.tick(t + 100, &mut hw, &mut sink);
    assert_eq!(app.sleep_check(t + 100, &mut sink), SleepDecision::Stay);
}

#[test]
fn inactivity_sleeps_once_timeout_is_exceeded() {
    let (mut app, _hw, mut sink) = started(Settings::default());
    assert_eq!(
        app.sleep_check(INACTIVITY_TIMEOUT_MS, &mut sink),
        SleepDecision::Stay
    );
    assert_eq!(
        app.sleep_check(INACTIVITY_TIMEOUT_MS + 1, &mut sink),
        SleepDecision::Sleep(SleepReason::Inactivity)
    );
}

#[test]
fn accepted_command_restarts_inactivity_timer() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.handle_command(AppCommand::ToggleLights, 500_000, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        app.sleep_check(INACTIVITY_TIMEOUT_MS + 1, &mut sink),
        SleepDecision::Stay
    );
    assert_eq!(app.status(600_000).inactive_ms, 100_000);
}

#[test]
fn disabled_sleep_never_sleeps() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.handle_command(AppCommand::SetSleepEnabled(false), 0, &mut hw, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::RequestSleep, 0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        app.sleep_check(INACTIVITY_TIMEOUT_MS * 2, &mut sink),
        SleepDecision::Stay
    );
    assert!(!app.status(0).sleep_enabled);
}

#[test]
fn running_engine_blocks_sleep() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.handle_command(AppCommand::OverrideStart, 0, &mut hw, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::SetStartHeld(false), 100, &mut hw, &mut sink)
        .unwrap();
    app.tick(100, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Running);

    let t = 100 + INACTIVITY_TIMEOUT_MS + 1;
    app.tick(t, &mut hw, &mut sink);
    assert_eq!(app.sleep_check(t, &mut sink), SleepDecision::Stay);
}

#[test]
fn wake_resets_to_off_with_relays_dark() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.handle_command(AppCommand::SetKeyPosition(1), 0, &mut hw, &mut sink)
        .unwrap();
    app.tick(0, &mut hw, &mut sink);
    app.handle_command(AppCommand::ToggleLights, 50, &mut hw, &mut sink)
        .unwrap();
    app.tick(50, &mut hw, &mut sink);
    assert!(hw.lights);

    app.on_wake(1_000, &mut hw, &mut sink);

    assert_eq!(app.phase(), EnginePhase::Off);
    assert_eq!(app.context().key, KeyPosition::Off);
    assert_eq!(app.alert_flags(), 0);
    assert_eq!(hw.last_call(), Some(&RelayCall::AllOff));
    assert!(matches!(sink.events.last(), Some(AppEvent::Woke)));
}
