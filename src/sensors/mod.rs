//! Sensor subsystem: analog senders, digital feedback, and the
//! aggregating [`SensorHub`].
//!
//! The hub produces a [`SensorSnapshot`] each tick that gets written into
//! `FsmContext.sensors`.  The calibration is an argument of every read,
//! never a field of the hub.

pub mod analog;
pub mod calibration;
pub mod feedback;

use embedded_hal::digital::InputPin;

use crate::fsm::context::{RawCounts, SensorSnapshot};
use analog::AnalogChannel;
use calibration::Calibration;
use feedback::{FeedbackInputs, FeedbackLevels};

/// Aggregates all sensor inputs and produces a unified snapshot.
pub struct SensorHub<P: InputPin> {
    feedback: FeedbackInputs<P>,
}

impl<P: InputPin> SensorHub<P> {
    pub fn new(feedback: FeedbackInputs<P>) -> Self {
        Self { feedback }
    }

    /// Read every input and convert with the calibration in force *now*.
    pub fn read_all(&mut self, cal: &Calibration) -> SensorSnapshot {
        let raw = RawCounts {
            engine_temp: analog::read_raw(AnalogChannel::EngineTemp),
            oil_pressure: analog::read_raw(AnalogChannel::OilPressure),
            battery: analog::read_raw(AnalogChannel::Battery),
            fuel_level: analog::read_raw(AnalogChannel::FuelLevel),
        };
        convert(raw, self.feedback.read(), cal)
    }
}

/// Pure conversion from raw counts to a calibrated snapshot.
pub fn convert(raw: RawCounts, feedback: FeedbackLevels, cal: &Calibration) -> SensorSnapshot {
    SensorSnapshot {
        engine_temp_c: cal.engine_temp_c(raw.engine_temp),
        oil_pressure_kpa: cal.oil_pressure_kpa(raw.oil_pressure),
        battery_volts: cal.battery_volts(raw.battery),
        fuel_percent: cal.fuel_percent(raw.fuel_level),
        alternator_charging: feedback.alternator_charging,
        engine_running: feedback.engine_running,
        raw,
    }
}
