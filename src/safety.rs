//! Safety monitor.
//!
//! The monitor runs **every tick after the FSM** and maintains a latched
//! alert bitmask.  It never touches relays: a verdict may name a phase to
//! force, and the service applies it through the FSM.
//!
//! ## Alert lifecycle
//!
//! 1. While `Running`, low oil pressure or high coolant temperature sets
//!    the matching bit and the verdict forces the alert phase (oil first
//!    when both trip).  The engine keeps running.
//! 2. In `LowOilPressure` / `HighTemperature` the engine bits stay latched
//!    until the operator leaves the phase (key OFF or override start).
//! 3. Battery bounds are checked in every phase except `Off` and `Start`.
//!    Low battery either alerts only or forces `Error`, per
//!    [`LowBatteryPolicy`].
//! 4. Nothing is evaluated during `Start`, so crank sag and sender noise
//!    never interrupt a crank attempt.

use crate::config::{LowBatteryPolicy, Settings};
use crate::error::SafetyAlert;
use crate::fsm::EnginePhase;
use crate::fsm::context::SensorSnapshot;
use log::{info, warn};

const ENGINE_ALERTS: u8 = SafetyAlert::LowOilPressure.mask() | SafetyAlert::HighTemperature.mask();
const BATTERY_ALERTS: u8 = SafetyAlert::LowBattery.mask() | SafetyAlert::BatteryOverVoltage.mask();

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyVerdict {
    /// Latched alert bitmask after this evaluation.
    pub alerts: u8,
    /// Phase the FSM must be forced into, if any.
    pub force_phase: Option<EnginePhase>,
}

/// Safety monitor.
#[derive(Debug, Default)]
pub struct SafetyMonitor {
    /// Latched alert bitmask.
    alerts: u8,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self { alerts: 0 }
    }

    /// Evaluate the thresholds that apply to `phase` against the latest
    /// snapshot.
    pub fn evaluate(
        &mut self,
        phase: EnginePhase,
        snap: &SensorSnapshot,
        settings: &Settings,
    ) -> SafetyVerdict {
        let mut force_phase = None;

        // ── Engine vitals ─────────────────────────────────────────
        match phase {
            EnginePhase::Running => {
                self.eval_alert(
                    SafetyAlert::LowOilPressure,
                    snap.oil_pressure_kpa < f32::from(settings.min_oil_pressure_kpa),
                );
                self.eval_alert(
                    SafetyAlert::HighTemperature,
                    snap.engine_temp_c > f32::from(settings.max_coolant_temp_c),
                );
                if self.has_alert(SafetyAlert::LowOilPressure) {
                    force_phase = Some(EnginePhase::LowOilPressure);
                } else if self.has_alert(SafetyAlert::HighTemperature) {
                    force_phase = Some(EnginePhase::HighTemperature);
                }
            }
            EnginePhase::LowOilPressure | EnginePhase::HighTemperature | EnginePhase::Start => {}
            _ => self.clear_group(ENGINE_ALERTS),
        }

        // ── Battery ───────────────────────────────────────────────
        match phase {
            EnginePhase::Off => self.clear_group(BATTERY_ALERTS),
            EnginePhase::Start => {}
            _ => {
                self.eval_alert(
                    SafetyAlert::LowBattery,
                    snap.battery_volts < settings.min_battery_voltage,
                );
                self.eval_alert(
                    SafetyAlert::BatteryOverVoltage,
                    snap.battery_volts > settings.max_battery_voltage,
                );
                if self.has_alert(SafetyAlert::LowBattery)
                    && settings.low_battery_policy == LowBatteryPolicy::ForceError
                    && phase != EnginePhase::Error
                {
                    force_phase = Some(EnginePhase::Error);
                }
            }
        }

        SafetyVerdict {
            alerts: self.alerts,
            force_phase,
        }
    }

    /// Current alert bitmask.
    pub fn alerts(&self) -> u8 {
        self.alerts
    }

    /// Check if a specific alert is active.
    pub fn has_alert(&self, alert: SafetyAlert) -> bool {
        self.alerts & alert.mask() != 0
    }

    /// Drop every latched alert (wake, factory reset).
    pub fn reset(&mut self) {
        self.alerts = 0;
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear an alert bit based on a boolean condition.
    fn eval_alert(&mut self, alert: SafetyAlert, condition: bool) {
        if condition {
            if self.alerts & alert.mask() == 0 {
                warn!("SAFETY ALERT SET: {alert}");
            }
            self.alerts |= alert.mask();
        } else {
            self.clear_alert(alert);
        }
    }

    fn clear_alert(&mut self, alert: SafetyAlert) {
        if self.alerts & alert.mask() != 0 {
            info!("SAFETY ALERT CLEARED: {alert}");
        }
        self.alerts &= !alert.mask();
    }

    fn clear_group(&mut self, group: u8) {
        for alert in SafetyAlert::ALL {
            if group & alert.mask() != 0 {
                self.clear_alert(alert);
            }
        }
    }
}
