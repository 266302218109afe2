//! Analog engine senders on ADC1.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from static `AtomicU16`s for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

/// The four analog inputs on the controller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    EngineTemp,
    OilPressure,
    Battery,
    FuelLevel,
}

impl AnalogChannel {
    #[cfg(target_os = "espidf")]
    fn adc1_channel(self) -> u32 {
        match self {
            Self::EngineTemp => hw_init::ADC1_CH_ENGINE_TEMP,
            Self::OilPressure => hw_init::ADC1_CH_OIL_PRESSURE,
            Self::Battery => hw_init::ADC1_CH_BATTERY,
            Self::FuelLevel => hw_init::ADC1_CH_FUEL,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_cell(self) -> &'static AtomicU16 {
        match self {
            Self::EngineTemp => &SIM_ENGINE_TEMP_ADC,
            Self::OilPressure => &SIM_OIL_PRESSURE_ADC,
            Self::Battery => &SIM_BATTERY_ADC,
            Self::FuelLevel => &SIM_FUEL_ADC,
        }
    }
}

// Mid-scale idle readings: ~80 °C coolant, ~230 kPa oil, ~12.5 V, ~50 % fuel.
#[cfg(not(target_os = "espidf"))]
static SIM_ENGINE_TEMP_ADC: AtomicU16 = AtomicU16::new(614);
#[cfg(not(target_os = "espidf"))]
static SIM_OIL_PRESSURE_ADC: AtomicU16 = AtomicU16::new(1370);
#[cfg(not(target_os = "espidf"))]
static SIM_BATTERY_ADC: AtomicU16 = AtomicU16::new(1126);
#[cfg(not(target_os = "espidf"))]
static SIM_FUEL_ADC: AtomicU16 = AtomicU16::new(2000);

/// Inject a raw ADC count for `channel` (host builds only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: AnalogChannel, raw: u16) {
    channel.sim_cell().store(raw, Ordering::Relaxed);
}

/// Read one raw 12-bit count.
#[cfg(target_os = "espidf")]
pub fn read_raw(channel: AnalogChannel) -> u16 {
    hw_init::adc1_read(channel.adc1_channel())
}

/// Read one raw 12-bit count.
#[cfg(not(target_os = "espidf"))]
pub fn read_raw(channel: AnalogChannel) -> u16 {
    channel.sim_cell().load(Ordering::Relaxed)
}
