//! Unified error types for the keyswitch firmware.
//!
//! A single `Error` enum that every subsystem can convert into, so the
//! command-intake path reports failures uniformly to the remote layer.
//! All variants are `Copy`; nothing here allocates.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation exposed to the remote-command layer funnels
/// into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A command was rejected before reaching the state machine.
    Command(CommandError),
    /// A settings update or load failed.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Key position outside 0–3.
    InvalidKeyPosition(u8),
    /// The command queue is full; the producer should retry later.
    QueueFull,
    /// Auto-calibration needs a non-zero raw reading.
    ZeroRawReading,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyPosition(p) => write!(f, "invalid key position {p} (expected 0-3)"),
            Self::QueueFull => write!(f, "command queue full"),
            Self::ZeroRawReading => write!(f, "raw reading is zero, cannot calibrate"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Safety alerts
// ---------------------------------------------------------------------------

/// Safety alerts are latched in a bitfield by the safety monitor so that
/// simultaneous conditions are tracked and cleared individually.  None of
/// them de-energises a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyAlert {
    /// Oil pressure below the configured minimum while running.
    LowOilPressure = 0b0000_0001,
    /// Coolant temperature above the configured maximum while running.
    HighTemperature = 0b0000_0010,
    /// Battery voltage below the configured minimum.
    LowBattery = 0b0000_0100,
    /// Battery voltage above the configured maximum.
    BatteryOverVoltage = 0b0000_1000,
}

impl SafetyAlert {
    pub const ALL: [Self; 4] = [
        Self::LowOilPressure,
        Self::HighTemperature,
        Self::LowBattery,
        Self::BatteryOverVoltage,
    ];

    /// Return the bitmask for this alert.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowOilPressure => write!(f, "low oil pressure"),
            Self::HighTemperature => write!(f, "high coolant temperature"),
            Self::LowBattery => write!(f, "low battery voltage"),
            Self::BatteryOverVoltage => write!(f, "battery over-voltage"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
