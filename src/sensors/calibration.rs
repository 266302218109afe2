//! Raw-count → engineering-unit conversion.
//!
//! Every conversion takes the [`Calibration`] by reference at call time.
//! The hub never keeps its own copy, so a recalibration pushed through the
//! settings store is visible on the very next read.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Full-scale count of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

/// Runtime-adjustable conversion parameters for the analog channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// °C per ADC count for the coolant sender.
    pub temp_scale: f32,
    /// °C added after scaling.
    pub temp_offset: f32,
    /// kPa per ADC count for the oil pressure sender.
    pub pressure_scale: f32,
    /// kPa added after scaling.
    pub pressure_offset: f32,
    /// Volts per ADC count through the battery divider.
    pub battery_divider: f32,
    /// ADC count read with an empty tank.
    pub fuel_empty_raw: u16,
    /// ADC count read with a full tank.
    pub fuel_full_raw: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            temp_scale: 0.1953,
            temp_offset: -40.0,
            pressure_scale: 0.1682,
            pressure_offset: 0.0,
            battery_divider: 0.0111,
            fuel_empty_raw: 200,
            fuel_full_raw: 3800,
        }
    }
}

/// `raw * scale + offset`.
pub fn linear(raw: u16, scale: f32, offset: f32) -> f32 {
    f32::from(raw) * scale + offset
}

/// Two-point interpolation of `raw` over `[empty, full]` onto `[0, 100]`.
///
/// Readings outside the calibrated span are clamped, so a sender that
/// drifts past its end stops never reports a negative or >100 % tank.
/// A degenerate span (`full <= empty`) reads as empty.
pub fn fuel_percent(raw: u16, empty: u16, full: u16) -> f32 {
    if full <= empty {
        return 0.0;
    }
    let span = f32::from(full - empty);
    ((f32::from(raw) - f32::from(empty)) / span * 100.0).clamp(0.0, 100.0)
}

impl Calibration {
    pub fn engine_temp_c(&self, raw: u16) -> f32 {
        linear(raw, self.temp_scale, self.temp_offset)
    }

    pub fn oil_pressure_kpa(&self, raw: u16) -> f32 {
        linear(raw, self.pressure_scale, self.pressure_offset)
    }

    pub fn battery_volts(&self, raw: u16) -> f32 {
        f32::from(raw) * self.battery_divider
    }

    pub fn fuel_percent(&self, raw: u16) -> f32 {
        fuel_percent(raw, self.fuel_empty_raw, self.fuel_full_raw)
    }

    /// Derive a new calibration so that `raw` converts to the externally
    /// measured `reference` value.  Only the parameters belonging to the
    /// referenced channel change.  The result still has to pass settings
    /// validation before it is adopted.
    pub fn calibrated_against(
        &self,
        reference: Reference,
        raw: u16,
    ) -> Result<Calibration, CommandError> {
        if raw == 0 {
            return Err(CommandError::ZeroRawReading);
        }
        let raw_f = f32::from(raw);
        let mut next = *self;

        match reference {
            Reference::BatteryVolts(volts) => {
                next.battery_divider = volts / raw_f;
            }
            Reference::EngineTempC(celsius) => {
                next.temp_scale = (celsius - self.temp_offset) / raw_f;
            }
            Reference::OilPressureKpa(kpa) => {
                next.pressure_scale = (kpa - self.pressure_offset) / raw_f;
            }
            Reference::FuelPercent(percent) if percent <= 10.0 => {
                next.fuel_empty_raw = raw;
            }
            Reference::FuelPercent(percent) if percent >= 90.0 => {
                next.fuel_full_raw = raw;
            }
            Reference::FuelPercent(percent) => {
                // Count the current bounds say `percent` should read at.
                let empty = f32::from(self.fuel_empty_raw);
                let full = f32::from(self.fuel_full_raw);
                let expected = empty + percent / 100.0 * (full - empty);
                if expected <= 0.0 {
                    return Err(CommandError::ZeroRawReading);
                }
                // Interpolation is scale-invariant: stretching both bounds by
                // raw/expected moves `expected` onto `raw`.
                let k = raw_f / expected;
                next.fuel_empty_raw = (empty * k).round().min(f32::from(u16::MAX)) as u16;
                next.fuel_full_raw = (full * k).round().min(f32::from(u16::MAX)) as u16;
            }
        }
        Ok(next)
    }
}

/// An externally measured value used as the ground truth for
/// auto-calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reference {
    BatteryVolts(f32),
    EngineTempC(f32),
    OilPressureKpa(f32),
    FuelPercent(f32),
}
