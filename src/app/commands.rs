//! Inbound commands to the application service.
//!
//! Remote handlers run on another execution context (HTTP server task,
//! WiFi callbacks).  They never touch the FSM context directly: they
//! [`submit`](CommandQueue::submit) an [`AppCommand`], and the control
//! loop drains the queue once per tick before evaluation.
//!
//! ```text
//! ┌──────────────┐  AppCommand  ┌──────────────┐
//! │ Remote layer │─────────────▶│ Control loop │
//! │ (any task)   │  COMMANDS    │ (sync tick)  │
//! └──────────────┘              └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::{AlarmThresholds, EngineTiming, WifiCredentials};
use crate::error::{CommandError, Error};
use crate::fsm::EnginePhase;
use crate::fsm::context::KeyPosition;
use crate::sensors::calibration::{Calibration, Reference};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Move the virtual key (0 = OFF, 1 = ON, 2 = GLOW, 3 = START).
    SetKeyPosition(u8),

    /// Hold-to-crank.  Holding forces the key to START, releasing to GLOW.
    SetStartHeld(bool),

    /// Drop glow and starter, keep main power, return to ON.
    EmergencyStop,

    /// Flip the work lights.
    ToggleLights,

    /// Crank regardless of active alerts or the ERROR phase.
    OverrideStart,

    /// Sleep now if the controller is eligible.
    RequestSleep,

    SetSleepEnabled(bool),

    UpdateEngineTiming(EngineTiming),

    UpdateAlarmThresholds(AlarmThresholds),

    UpdateSensorCalibration(Calibration),

    UpdateWifi(WifiCredentials),

    /// Derive calibration from an externally measured reference value
    /// against the current raw reading of that channel.
    AutoCalibrate(Reference),

    /// Restore compiled-in defaults and persist them.
    FactoryReset,

    /// Persist settings immediately instead of waiting for the debounce.
    SaveSettings,

    /// Force the FSM into a specific phase (bench / testing only).
    ForcePhase(EnginePhase),
}

impl AppCommand {
    /// Reject malformed commands before they are queued.
    pub fn validate(&self) -> Result<(), CommandError> {
        if let Self::SetKeyPosition(raw) = *self {
            KeyPosition::try_from(raw)?;
        }
        Ok(())
    }
}

/// Queue depth.  At a 50 ms tick this absorbs bursts far beyond what a
/// human operator can produce.
pub const QUEUE_DEPTH: usize = 16;

/// Bounded MPSC hand-off between the remote layer and the control loop.
pub struct CommandQueue {
    channel: Channel<CriticalSectionRawMutex, AppCommand, QUEUE_DEPTH>,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Validate and enqueue a command.  Never blocks.
    pub fn submit(&self, cmd: AppCommand) -> Result<(), Error> {
        cmd.validate()?;
        self.channel
            .try_send(cmd)
            .map_err(|_| Error::Command(CommandError::QueueFull))
    }

    /// Take the oldest pending command, if any.
    pub fn try_next(&self) -> Option<AppCommand> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The queue shared by the remote layer and the control loop.
pub static COMMANDS: CommandQueue = CommandQueue::new();
