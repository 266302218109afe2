//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single record that state handlers read from and
//! write to: operator inputs, timers, the latest sensor snapshot, the relay
//! command set, and the live settings.  Handlers never touch hardware;
//! they describe relay effects in [`RelayCommands`] and the service applies
//! them afterwards.
//!
//! ## Time
//!
//! Timestamps are `u32` milliseconds since boot.  Elapsed time is always
//! `now.wrapping_sub(start)`, which is exact across the counter wrap
//! (every 2^32 ms, about 49.7 days) for any interval shorter than that.

use serde::Serialize;

use crate::config::Settings;
use crate::error::CommandError;

/// Milliseconds since boot (wrapping).
pub type Millis = u32;

/// Wrap-safe elapsed time.
pub fn elapsed_ms(now: Millis, since: Millis) -> u32 {
    now.wrapping_sub(since)
}

// ---------------------------------------------------------------------------
// Key position (operator intent)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum KeyPosition {
    Off = 0,
    On = 1,
    Glow = 2,
    Start = 3,
}

impl TryFrom<u8> for KeyPosition {
    type Error = CommandError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::Glow),
            3 => Ok(Self::Start),
            other => Err(CommandError::InvalidKeyPosition(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers; written by sensor hub)
// ---------------------------------------------------------------------------

/// Raw 12-bit ADC counts behind the calibrated values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawCounts {
    pub engine_temp: u16,
    pub oil_pressure: u16,
    pub battery: u16,
    pub fuel_level: u16,
}

/// A point-in-time snapshot of every input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Coolant temperature (°C).
    pub engine_temp_c: f32,
    /// Oil pressure (kPa).
    pub oil_pressure_kpa: f32,
    /// Battery voltage (V).
    pub battery_volts: f32,
    /// Fuel level, clamped to 0–100 %.
    pub fuel_percent: f32,
    pub alternator_charging: bool,
    pub engine_running: bool,
    pub raw: RawCounts,
}

// ---------------------------------------------------------------------------
// Relay commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayCommands {
    pub main_power: bool,
    pub glow_plugs: bool,
    pub starter: bool,
    pub lights: bool,
}

impl RelayCommands {
    /// All relays off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Timestamp of the evaluation in progress.  Set by the caller.
    pub now: Millis,

    // -- Operator inputs --
    pub key: KeyPosition,
    /// Remote hold-to-crank input.
    pub start_held: bool,
    /// Edge flag: consumed by the engine in the tick it is observed.
    pub emergency_stop: bool,
    /// Lights presses accepted since the last tick; consumed by the engine.
    pub lights_toggles: u8,
    /// Logical state of the work lights.
    pub work_lights_on: bool,
    /// Set by the engine: the input signature differs from the last one
    /// evaluated.
    pub inputs_changed: bool,

    // -- Timers (`None` = not started) --
    pub glow_started_at: Option<Millis>,
    pub ignition_started_at: Option<Millis>,
    pub start_held_at: Option<Millis>,

    // -- Sensor data --
    /// Latest readings.  Updated before each FSM tick.
    pub sensors: SensorSnapshot,

    // -- Relay outputs --
    /// Relay states to be applied after the FSM tick.
    pub relays: RelayCommands,

    // -- Configuration --
    pub settings: Settings,

    // -- Safety --
    /// Latched alert bitmask (see `SafetyAlert::mask()`).
    pub alert_flags: u8,
}

impl FsmContext {
    /// Create the boot baseline: key OFF, nothing running.
    pub fn new(settings: Settings) -> Self {
        Self {
            now: 0,
            key: KeyPosition::Off,
            start_held: false,
            emergency_stop: false,
            lights_toggles: 0,
            work_lights_on: false,
            inputs_changed: false,
            glow_started_at: None,
            ignition_started_at: None,
            start_held_at: None,
            sensors: SensorSnapshot::default(),
            relays: RelayCommands::all_off(),
            settings,
            alert_flags: 0,
        }
    }

    /// Operator asks for the starter (key in START or hold active).
    pub fn start_requested(&self) -> bool {
        self.key >= KeyPosition::Start || self.start_held
    }

    /// Milliseconds into the current glow cycle, if one is running.
    pub fn glow_elapsed_ms(&self) -> Option<u32> {
        self.glow_started_at.map(|t| elapsed_ms(self.now, t))
    }

    /// A glow cycle is running and has not yet reached its duration.
    pub fn glow_in_progress(&self) -> bool {
        self.glow_elapsed_ms()
            .is_some_and(|e| e < self.settings.glow_duration_ms)
    }

    /// Remaining glow time in ms (0 when no cycle is heating).
    pub fn glow_remaining_ms(&self) -> u32 {
        self.glow_remaining_ms_at(self.now)
    }

    /// Remaining glow time as seen at `now`, which may be later than the
    /// last evaluation.
    pub fn glow_remaining_ms_at(&self, now: Millis) -> u32 {
        if !self.relays.glow_plugs {
            return 0;
        }
        self.glow_started_at.map_or(0, |t| {
            self.settings
                .glow_duration_ms
                .saturating_sub(elapsed_ms(now, t))
        })
    }

    /// Begin a fresh glow cycle at `now` and energise the plugs.
    pub fn restart_glow(&mut self) {
        self.glow_started_at = Some(self.now);
        self.relays.glow_plugs = true;
    }

    /// End the glow cycle and de-energise the plugs.
    pub fn cancel_glow(&mut self) {
        self.glow_started_at = None;
        self.relays.glow_plugs = false;
    }

    /// Check whether a specific alert flag is set.
    pub fn has_alert(&self, alert: crate::error::SafetyAlert) -> bool {
        self.alert_flags & alert.mask() != 0
    }
}
