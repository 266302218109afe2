//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(s) => {
                info!(
                    "STATUS | phase={} key={} held={} | T={:.1}\u{00b0}C oil={:.0}kPa \
                     batt={:.2}V fuel={:.0}% | alt={} run={} | \
                     main={} glow={} ({}s) start={} lights={} | alerts=0b{:04b} | idle={}s",
                    s.phase,
                    s.key_position,
                    s.start_held,
                    s.sensors.engine_temp_c,
                    s.sensors.oil_pressure_kpa,
                    s.sensors.battery_volts,
                    s.sensors.fuel_percent,
                    s.sensors.alternator_charging,
                    s.sensors.engine_running,
                    s.relays.main_power,
                    s.relays.glow_plugs,
                    s.glow_remaining_s,
                    s.relays.starter,
                    s.relays.lights,
                    s.alerts,
                    s.inactive_ms / 1000,
                );
            }
            AppEvent::PhaseChanged { from, to } => {
                info!("PHASE | {} -> {}", from.name(), to.name());
            }
            AppEvent::AlertRaised(alert) => {
                warn!("ALERT | raised: {}", alert);
            }
            AppEvent::AlertCleared(alert) => {
                info!("ALERT | cleared: {}", alert);
            }
            AppEvent::SettingsChanged(group) => {
                info!("SETTINGS | {} updated", group);
            }
            AppEvent::SleepRequested(reason) => {
                info!("SLEEP | entering ({:?})", reason);
            }
            AppEvent::Woke => {
                info!("SLEEP | woke, state reset");
            }
            AppEvent::Started(phase) => {
                info!("START | initial_phase={}", phase.name());
            }
        }
    }
}
