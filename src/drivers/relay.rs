//! Four-channel relay bank (main power, glow plugs, starter, lights).
//!
//! Each relay is an `embedded-hal` output pin, active HIGH.  The bank
//! remembers the last commanded level and only writes on change, so the
//! service can re-apply the full command set every tick.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator.  Starter gating and power sequencing
//! live in the application service.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Relay {
    MainPower = 0,
    GlowPlugs = 1,
    Starter = 2,
    Lights = 3,
}

impl Relay {
    pub const COUNT: usize = 4;

    fn name(self) -> &'static str {
        match self {
            Self::MainPower => "main power",
            Self::GlowPlugs => "glow plugs",
            Self::Starter => "starter",
            Self::Lights => "lights",
        }
    }
}

pub struct RelayBank<P: OutputPin> {
    pins: [P; Relay::COUNT],
    /// Last level written successfully; `None` until the first write.
    states: [Option<bool>; Relay::COUNT],
}

impl<P: OutputPin> RelayBank<P> {
    /// Take ownership of the pins and drive every relay LOW.
    pub fn new(main_power: P, glow_plugs: P, starter: P, lights: P) -> Self {
        let mut bank = Self {
            pins: [main_power, glow_plugs, starter, lights],
            states: [None; Relay::COUNT],
        };
        for relay in [Relay::Starter, Relay::GlowPlugs, Relay::Lights, Relay::MainPower] {
            bank.set(relay, false);
        }
        bank
    }

    pub fn set(&mut self, relay: Relay, on: bool) {
        let idx = relay as usize;
        if self.states[idx] == Some(on) {
            return;
        }
        let pin = &mut self.pins[idx];
        let result = if on { pin.set_high() } else { pin.set_low() };
        match result {
            Ok(()) => {
                debug!("Relay {} -> {}", relay.name(), if on { "ON" } else { "OFF" });
                self.states[idx] = Some(on);
            }
            Err(e) => warn!("Relay {} write failed: {:?}", relay.name(), e),
        }
    }

    pub fn is_on(&self, relay: Relay) -> bool {
        self.states[relay as usize] == Some(true)
    }
}
