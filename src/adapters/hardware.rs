//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the [`RelayBank`], exposing them through
//! [`SensorPort`] and [`RelayPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets the analog
//! channels read cfg-gated simulation cells and the pins are whatever
//! `embedded-hal` implementation the caller supplies.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RelayPort, SensorPort};
use crate::drivers::relay::{Relay, RelayBank};
use crate::fsm::context::SensorSnapshot;
use crate::sensors::SensorHub;
use crate::sensors::calibration::Calibration;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<O: OutputPin, I: InputPin> {
    sensor_hub: SensorHub<I>,
    relays: RelayBank<O>,
}

impl<O: OutputPin, I: InputPin> HardwareAdapter<O, I> {
    pub fn new(sensor_hub: SensorHub<I>, relays: RelayBank<O>) -> Self {
        Self {
            sensor_hub,
            relays,
        }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<O: OutputPin, I: InputPin> SensorPort for HardwareAdapter<O, I> {
    fn read_all(&mut self, cal: &Calibration) -> SensorSnapshot {
        self.sensor_hub.read_all(cal)
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<O: OutputPin, I: InputPin> RelayPort for HardwareAdapter<O, I> {
    fn set_main_power(&mut self, on: bool) {
        self.relays.set(Relay::MainPower, on);
    }

    fn set_glow_plugs(&mut self, on: bool) {
        self.relays.set(Relay::GlowPlugs, on);
    }

    fn set_starter(&mut self, on: bool) {
        self.relays.set(Relay::Starter, on);
    }

    fn set_lights(&mut self, on: bool) {
        self.relays.set(Relay::Lights, on);
    }
}
