//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, push to a web
//! client, etc.

use serde::Serialize;

use crate::error::SafetyAlert;
use crate::fsm::EnginePhase;
use crate::fsm::context::{RelayCommands, SensorSnapshot};
use crate::power::SleepReason;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started (carries initial phase).
    Started(EnginePhase),

    /// The FSM moved between phases.
    PhaseChanged { from: EnginePhase, to: EnginePhase },

    /// A safety alert bit went from clear to set.
    AlertRaised(SafetyAlert),

    /// A safety alert bit went from set to clear.
    AlertCleared(SafetyAlert),

    /// A settings group was accepted (name of the group).
    SettingsChanged(&'static str),

    /// The controller is about to enter deep sleep.
    SleepRequested(SleepReason),

    /// The machine was reset after waking from sleep.
    Woke,

    /// Periodic status snapshot.
    Status(StatusReport),
}

/// Point-in-time status document served to the remote layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Symbolic phase name (`"OFF"`, `"LOW_OIL_PRESSURE"`, ...).
    pub phase: &'static str,
    pub key_position: u8,
    pub start_held: bool,
    /// Calibrated values plus the raw counts behind them.
    pub sensors: SensorSnapshot,
    pub relays: RelayCommands,
    pub work_lights_on: bool,
    /// Whole seconds of preheat left, 0 when the plugs are cold.
    pub glow_remaining_s: u32,
    /// Latched [`SafetyAlert`] bitmask.
    pub alerts: u8,
    pub inactive_ms: u32,
    pub sleep_enabled: bool,
    pub sleep_eligible: bool,
}

impl StatusReport {
    /// Render as the JSON document the web UI polls.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
