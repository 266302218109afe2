//! Integration tests for the command → FSM → relay pipeline.
//!
//! Drives the service the way the control loop does: commands first,
//! then one tick, with the mock recording what reached the relays.

use super::mock_hw::{LogSink, MockHardware, RelayCall, started};

use keyswitch::app::commands::{AppCommand, CommandQueue, QUEUE_DEPTH};
use keyswitch::app::events::AppEvent;
use keyswitch::app::service::AppService;
use keyswitch::config::Settings;
use keyswitch::error::{CommandError, Error};
use keyswitch::fsm::EnginePhase;
use keyswitch::fsm::context::KeyPosition;

fn cmd(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink, now: u32, c: AppCommand) {
    app.handle_command(c, now, hw, sink).unwrap();
}

/// Boot, key to ON, crank at `t` and release into RUNNING at `t + 1000`.
fn running_at(t: u32) -> (AppService, MockHardware, LogSink) {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::SetKeyPosition(1));
    app.tick(0, &mut hw, &mut sink);
    cmd(&mut app, &mut hw, &mut sink, t, AppCommand::SetStartHeld(true));
    app.tick(t, &mut hw, &mut sink);
    cmd(&mut app, &mut hw, &mut sink, t + 1000, AppCommand::SetStartHeld(false));
    app.tick(t + 1000, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Running);
    (app, hw, sink)
}

/// Boot, key to ON and then GLOW at `t`.  The FSM takes one tick per step.
fn glowing_at(t: u32) -> (AppService, MockHardware, LogSink) {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, t, AppCommand::SetKeyPosition(1));
    app.tick(t, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::On);
    cmd(&mut app, &mut hw, &mut sink, t, AppCommand::SetKeyPosition(2));
    app.tick(t, &mut hw, &mut sink);
    (app, hw, sink)
}

// ── Key ON ────────────────────────────────────────────────────

#[test]
fn key_on_energises_main_power_only() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    assert_eq!(app.phase(), EnginePhase::Off);

    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::SetKeyPosition(1));
    app.tick(100, &mut hw, &mut sink);

    assert_eq!(app.phase(), EnginePhase::On);
    assert_eq!(hw.outputs(), (true, false, false, false));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::PhaseChanged {
            from: EnginePhase::Off,
            to: EnginePhase::On
        }
    )));
}

#[test]
fn invalid_key_position_is_rejected() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let res = app.handle_command(AppCommand::SetKeyPosition(7), 0, &mut hw, &mut sink);
    assert_eq!(res, Err(Error::Command(CommandError::InvalidKeyPosition(7))));
    app.tick(50, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Off);
}

// ── Glow ──────────────────────────────────────────────────────

#[test]
fn glow_cycle_runs_for_configured_duration_then_returns_to_on() {
    let (mut app, mut hw, mut sink) = glowing_at(1_000);

    assert_eq!(app.phase(), EnginePhase::Glow);
    assert_eq!(hw.outputs(), (true, true, false, false));
    assert_eq!(app.status(1_000).glow_remaining_s, 20);

    app.tick(20_999, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Glow);
    assert!(hw.glow_plugs);

    app.tick(21_000, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::On);
    assert_eq!(app.context().key, KeyPosition::On);
    assert_eq!(hw.outputs(), (true, false, false, false));
    assert_eq!(app.status(21_000).glow_remaining_s, 0);
}

#[test]
fn hold_start_during_glow_cranks_with_plugs_still_hot() {
    let (mut app, mut hw, mut sink) = glowing_at(1_000);

    cmd(&mut app, &mut hw, &mut sink, 6_000, AppCommand::SetStartHeld(true));
    app.tick(6_000, &mut hw, &mut sink);

    assert_eq!(app.phase(), EnginePhase::Start);
    assert_eq!(hw.outputs(), (true, true, true, false));

    cmd(&mut app, &mut hw, &mut sink, 8_000, AppCommand::SetStartHeld(false));
    app.tick(8_000, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Running);
    assert!(!hw.starter);
    assert!(hw.glow_plugs, "glow keeps heating until its own timer ends");

    app.tick(21_000, &mut hw, &mut sink);
    assert!(!hw.glow_plugs);
    assert_eq!(app.phase(), EnginePhase::Running);
}

// ── Crank ─────────────────────────────────────────────────────

#[test]
fn crank_timeout_drops_starter_but_waits_for_release() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::SetKeyPosition(1));
    app.tick(0, &mut hw, &mut sink);
    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::SetStartHeld(true));
    app.tick(100, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Start);
    assert!(hw.starter);
    assert!(hw.glow_plugs, "direct start auto-activates glow");

    app.tick(10_099, &mut hw, &mut sink);
    assert!(hw.starter);

    app.tick(10_100, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Start);
    assert!(!hw.starter);
    assert!(hw.main_power);

    cmd(&mut app, &mut hw, &mut sink, 10_500, AppCommand::SetStartHeld(false));
    app.tick(10_500, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Running);
}

#[test]
fn starter_never_energised_outside_start() {
    let (mut app, mut hw, mut sink) = running_at(100);
    hw.clear_calls();
    for t in (2_000..30_000).step_by(50) {
        app.tick(t, &mut hw, &mut sink);
    }
    assert!(!hw.calls.contains(&RelayCall::Starter(true)));
}

#[test]
fn bare_key_start_cranks_once_then_runs() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::SetKeyPosition(1));
    app.tick(0, &mut hw, &mut sink);
    hw.clear_calls();

    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::SetKeyPosition(3));
    let mut trace = Vec::new();
    for t in (100..=500).step_by(50) {
        app.tick(t, &mut hw, &mut sink);
        trace.push(app.phase());
    }

    assert_eq!(trace[0], EnginePhase::Start);
    assert!(trace[1..].iter().all(|p| *p == EnginePhase::Running), "{trace:?}");
    assert_eq!(app.context().key, KeyPosition::On, "key springs back to ON");
    assert!(!hw.starter);
    let engagements = hw
        .calls
        .iter()
        .filter(|c| **c == RelayCall::Starter(true))
        .count();
    assert_eq!(engagements, 1);
}

#[test]
fn override_start_from_off_passes_through_on() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 500, AppCommand::OverrideStart);

    assert_eq!(app.phase(), EnginePhase::Start);
    assert!(hw.main_power);
    assert!(hw.starter);
    let phases: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            (EnginePhase::Off, EnginePhase::On),
            (EnginePhase::On, EnginePhase::Start)
        ]
    );

    app.tick(550, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::Start, "hold keeps cranking");
}

// ── Emergency stop, lights, key OFF ───────────────────────────

#[test]
fn emergency_stop_in_running_drops_to_on_with_main_power() {
    let (mut app, mut hw, mut sink) = running_at(100);
    cmd(&mut app, &mut hw, &mut sink, 3_000, AppCommand::EmergencyStop);
    app.tick(3_000, &mut hw, &mut sink);

    assert_eq!(app.phase(), EnginePhase::On);
    assert_eq!(app.context().key, KeyPosition::On);
    assert!(!app.context().start_held);
    assert!(hw.main_power);
    assert!(!hw.starter);
    assert!(!hw.glow_plugs);
}

#[test]
fn emergency_stop_mid_crank_releases_starter() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::OverrideStart);
    assert!(hw.starter);

    cmd(&mut app, &mut hw, &mut sink, 200, AppCommand::EmergencyStop);
    app.tick(200, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::On);
    assert!(!hw.starter);

    // The cleared hold must not re-engage on the following tick.
    app.tick(250, &mut hw, &mut sink);
    assert_eq!(app.phase(), EnginePhase::On);
}

#[test]
fn lights_toggle_twice_returns_to_dark() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::SetKeyPosition(1));
    app.tick(0, &mut hw, &mut sink);

    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::ToggleLights);
    app.tick(100, &mut hw, &mut sink);
    assert!(hw.lights);
    assert!(app.status(100).work_lights_on);

    cmd(&mut app, &mut hw, &mut sink, 200, AppCommand::ToggleLights);
    app.tick(200, &mut hw, &mut sink);
    assert!(!hw.lights);
}

#[test]
fn toggles_drained_in_the_same_tick_each_count() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    cmd(&mut app, &mut hw, &mut sink, 0, AppCommand::SetKeyPosition(1));
    app.tick(0, &mut hw, &mut sink);

    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::ToggleLights);
    cmd(&mut app, &mut hw, &mut sink, 100, AppCommand::ToggleLights);
    app.tick(100, &mut hw, &mut sink);
    assert!(!hw.lights);
    assert!(!app.context().work_lights_on);

    for _ in 0..3 {
        cmd(&mut app, &mut hw, &mut sink, 200, AppCommand::ToggleLights);
    }
    app.tick(200, &mut hw, &mut sink);
    assert!(hw.lights);
    assert!(app.context().work_lights_on);
}

#[test]
fn key_off_from_running_de_energises_everything() {
    let (mut app, mut hw, mut sink) = running_at(100);
    cmd(&mut app, &mut hw, &mut sink, 2_000, AppCommand::ToggleLights);
    app.tick(2_000, &mut hw, &mut sink);
    assert!(hw.lights);

    cmd(&mut app, &mut hw, &mut sink, 3_000, AppCommand::SetKeyPosition(0));
    app.tick(3_000, &mut hw, &mut sink);

    assert_eq!(app.phase(), EnginePhase::Off);
    assert_eq!(hw.last_call(), Some(&RelayCall::AllOff));
    assert_eq!(hw.outputs(), (false, false, false, false));
    assert!(!app.context().work_lights_on);
}

// ── Command queue ─────────────────────────────────────────────

#[test]
fn queued_commands_apply_in_submission_order() {
    let queue = CommandQueue::new();
    queue.submit(AppCommand::SetKeyPosition(1)).unwrap();
    queue.submit(AppCommand::SetKeyPosition(2)).unwrap();
    queue.submit(AppCommand::SetKeyPosition(1)).unwrap();

    let (mut app, mut hw, mut sink) = started(Settings::default());
    let mut seen = Vec::new();
    while let Some(c) = queue.try_next() {
        seen.push(c.clone());
        app.handle_command(c, 10, &mut hw, &mut sink).unwrap();
    }
    assert_eq!(
        seen,
        vec![
            AppCommand::SetKeyPosition(1),
            AppCommand::SetKeyPosition(2),
            AppCommand::SetKeyPosition(1)
        ]
    );
    assert_eq!(app.context().key, KeyPosition::On, "last write wins");
}

#[test]
fn full_queue_reports_queue_full() {
    let queue = CommandQueue::new();
    for _ in 0..QUEUE_DEPTH {
        queue.submit(AppCommand::ToggleLights).unwrap();
    }
    assert_eq!(
        queue.submit(AppCommand::ToggleLights),
        Err(Error::Command(CommandError::QueueFull))
    );
    assert_eq!(queue.len(), QUEUE_DEPTH);
}

// ── Status ────────────────────────────────────────────────────

#[test]
fn status_json_carries_phase_name_and_relays() {
    let (app, _hw, _sink) = glowing_at(0);

    let json = app.status(4_500).to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(v["phase"], "GLOW");
    assert_eq!(v["key_position"], 2);
    assert_eq!(v["relays"]["main_power"], true);
    assert_eq!(v["relays"]["glow_plugs"], true);
    assert_eq!(v["relays"]["starter"], false);
    assert_eq!(v["glow_remaining_s"], 16);
    assert_eq!(v["sensors"]["raw"]["battery"], 1135);
    assert_eq!(v["alerts"], 0);
}
