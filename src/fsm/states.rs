//! Concrete phase handler functions and table builder.
//!
//! Each phase is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  OFF ──[key ≥ 1]──▶ ON ──[key = 2]──▶ GLOW ──[timer done]──▶ ON
//!                      │  ◀──[key = 1]──  │
//!                      │                  │
//!               [start request]    [start request]
//!                      ▼                  ▼
//!                    START ◀──────────────┘
//!                      │
//!                 [released]
//!                      ▼
//!                   RUNNING ──[start request]──▶ START
//!
//!  Any phase ──[key = 0]──▶ OFF
//!  LOW_OIL_PRESSURE / HIGH_TEMPERATURE / ERROR ──[start request]──▶ START
//! ```

use super::context::{FsmContext, KeyPosition, RelayCommands, elapsed_ms};
use super::{EnginePhase, StateDescriptor};
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static phase table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; EnginePhase::COUNT] {
    [
        // Index 0: Off
        StateDescriptor {
            id: EnginePhase::Off,
            name: EnginePhase::Off.name(),
            on_enter: Some(off_enter),
            on_exit: None,
            on_input: off_input,
            on_poll: None,
        },
        // Index 1: On
        StateDescriptor {
            id: EnginePhase::On,
            name: EnginePhase::On.name(),
            on_enter: Some(on_enter),
            on_exit: None,
            on_input: on_input,
            on_poll: None,
        },
        // Index 2: Glow
        StateDescriptor {
            id: EnginePhase::Glow,
            name: EnginePhase::Glow.name(),
            on_enter: Some(glow_enter),
            on_exit: None,
            on_input: glow_input,
            on_poll: Some(glow_poll),
        },
        // Index 3: Start
        StateDescriptor {
            id: EnginePhase::Start,
            name: EnginePhase::Start.name(),
            on_enter: Some(start_enter),
            on_exit: Some(start_exit),
            on_input: start_input,
            on_poll: Some(start_poll),
        },
        // Index 4: Running
        StateDescriptor {
            id: EnginePhase::Running,
            name: EnginePhase::Running.name(),
            on_enter: Some(running_enter),
            on_exit: None,
            on_input: restart_on_request,
            on_poll: None,
        },
        // Index 5: LowOilPressure
        StateDescriptor {
            id: EnginePhase::LowOilPressure,
            name: EnginePhase::LowOilPressure.name(),
            on_enter: Some(alert_enter),
            on_exit: None,
            on_input: restart_on_request,
            on_poll: None,
        },
        // Index 6: HighTemperature
        StateDescriptor {
            id: EnginePhase::HighTemperature,
            name: EnginePhase::HighTemperature.name(),
            on_enter: Some(alert_enter),
            on_exit: None,
            on_input: restart_on_request,
            on_poll: None,
        },
        // Index 7: Error
        StateDescriptor {
            id: EnginePhase::Error,
            name: EnginePhase::Error.name(),
            on_enter: Some(error_enter),
            on_exit: None,
            on_input: restart_on_request,
            on_poll: None,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut FsmContext) {
    off_baseline(ctx);
}

/// Everything de-energised, lights off, every timer cleared.
pub(super) fn off_baseline(ctx: &mut FsmContext) {
    ctx.relays = RelayCommands::all_off();
    ctx.work_lights_on = false;
    ctx.glow_started_at = None;
    ctx.ignition_started_at = None;
    ctx.start_held_at = None;
}

fn off_input(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if ctx.key >= KeyPosition::On {
        return Some(EnginePhase::On);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ON
// ═══════════════════════════════════════════════════════════════════════════

fn on_enter(ctx: &mut FsmContext) {
    ctx.relays.main_power = true;
}

fn on_input(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if ctx.start_requested() {
        // Direct start: the plugs get a fresh cycle alongside the starter.
        info!("Direct start from ON, auto-activating glow plugs");
        ctx.restart_glow();
        return Some(EnginePhase::Start);
    }
    if ctx.key == KeyPosition::Glow {
        return Some(EnginePhase::Glow);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  GLOW
// ═══════════════════════════════════════════════════════════════════════════

fn glow_enter(ctx: &mut FsmContext) {
    ctx.relays.main_power = true;
    if ctx.glow_in_progress() {
        // Resume a cycle that kept heating while we were elsewhere.
        ctx.relays.glow_plugs = true;
        info!(
            "Glow plugs resumed: {} ms remaining",
            ctx.glow_remaining_ms()
        );
    } else {
        ctx.restart_glow();
        info!(
            "Glow plugs activated for {} ms",
            ctx.settings.glow_duration_ms
        );
    }
}

fn glow_input(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if ctx.start_requested() {
        return Some(EnginePhase::Start);
    }
    if ctx.key == KeyPosition::On {
        return Some(EnginePhase::On);
    }
    None
}

fn glow_poll(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if ctx.glow_in_progress() {
        return None;
    }
    info!("Glow cycle complete");
    ctx.cancel_glow();
    ctx.key = KeyPosition::On;
    Some(EnginePhase::On)
}

// ═══════════════════════════════════════════════════════════════════════════
//  START
// ═══════════════════════════════════════════════════════════════════════════

fn start_enter(ctx: &mut FsmContext) {
    ctx.ignition_started_at = Some(ctx.now);
    ctx.start_held_at = Some(ctx.now);
    ctx.relays.main_power = true;
    ctx.relays.starter = true;
    info!("Starter engaged");
}

fn start_exit(ctx: &mut FsmContext) {
    ctx.relays.starter = false;
    ctx.ignition_started_at = None;
    ctx.start_held_at = None;
}

fn start_input(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if !ctx.start_held || ctx.key < KeyPosition::Start {
        info!("Start released");
        // Leaving START ends the request, so RUNNING does not re-crank.
        ctx.start_held = false;
        if ctx.key >= KeyPosition::Start {
            ctx.key = KeyPosition::On;
        }
        return Some(EnginePhase::Running);
    }
    None
}

fn start_poll(ctx: &mut FsmContext) -> Option<EnginePhase> {
    let Some(started) = ctx.ignition_started_at else {
        return None;
    };
    if elapsed_ms(ctx.now, started) >= ctx.settings.crank_timeout_ms {
        warn!(
            "Crank timeout after {} ms, starter released; waiting for key release",
            ctx.settings.crank_timeout_ms
        );
        ctx.relays.starter = false;
        ctx.ignition_started_at = None;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING and alert phases
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(_ctx: &mut FsmContext) {
    info!("Engine running");
}

fn alert_enter(ctx: &mut FsmContext) {
    warn!("Engine alert active (flags=0x{:02X})", ctx.alert_flags);
}

fn error_enter(ctx: &mut FsmContext) {
    ctx.relays.starter = false;
    ctx.cancel_glow();
    warn!("Engine in ERROR (flags=0x{:02X})", ctx.alert_flags);
}

/// Shared by RUNNING and every alert phase: a start request re-engages
/// the starter regardless of active alerts.
fn restart_on_request(ctx: &mut FsmContext) -> Option<EnginePhase> {
    if ctx.start_requested() {
        return Some(EnginePhase::Start);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Phase-independent handlers (called by the engine)
// ═══════════════════════════════════════════════════════════════════════════

/// Consume an emergency stop.  Returns the phase to force, if any.
pub(super) fn emergency_stop(ctx: &mut FsmContext, phase: EnginePhase) -> Option<EnginePhase> {
    if phase == EnginePhase::Off {
        debug!("Emergency stop ignored: ignition off");
        return None;
    }
    warn!("EMERGENCY STOP in {}", phase.name());
    ctx.relays.starter = false;
    ctx.cancel_glow();
    ctx.start_held = false;
    ctx.key = KeyPosition::On;
    ctx.relays.main_power = true;
    Some(EnginePhase::On)
}

/// Consume a lights toggle.
pub(super) fn toggle_lights(ctx: &mut FsmContext, phase: EnginePhase) {
    if phase == EnginePhase::Off {
        debug!("Lights toggle ignored: ignition off");
        return;
    }
    ctx.work_lights_on = !ctx.work_lights_on;
    ctx.relays.lights = ctx.work_lights_on;
    info!(
        "Work lights {}",
        if ctx.work_lights_on { "ON" } else { "OFF" }
    );
}

/// Enforce the glow duration in every phase.  Clearing the stamp makes
/// repeated calls no-ops, so an expired cycle never re-energises.
pub(super) fn expire_glow(ctx: &mut FsmContext) {
    if ctx.glow_started_at.is_some() && !ctx.glow_in_progress() {
        info!("Glow plugs de-energised after {} ms", ctx.settings.glow_duration_ms);
        ctx.cancel_glow();
    }
}
