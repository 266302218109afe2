//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the FSM, safety monitor, power manager, and shared
//! context.  It exposes a clean, hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                 │         AppService         │
//!   RelayPort ◀── │  FSM · Safety · Power      │ ◀── AppCommand
//!                 └────────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::Settings;
use crate::error::{Error, SafetyAlert};
use crate::fsm::context::{FsmContext, KeyPosition, Millis, elapsed_ms};
use crate::fsm::states::build_state_table;
use crate::fsm::{EnginePhase, Fsm};
use crate::power::{PowerManager, SleepDecision};
use crate::safety::SafetyMonitor;
use crate::sensors::calibration::Reference;

use super::commands::AppCommand;
use super::events::{AppEvent, StatusReport};
use super::ports::{ConfigPort, EventSink, RelayPort, SensorPort};

/// Debounce between the first unsaved settings change and the flash write.
pub const AUTO_SAVE_DELAY_MS: u32 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetyMonitor,
    power: PowerManager,
    tick_count: u64,
    /// Alert mask reported on the previous tick, for edge events.
    last_alerts: u8,
    config_dirty: bool,
    dirty_since_ms: Millis,
    /// Skip the debounce on the next save check.
    save_now: bool,
}

impl AppService {
    /// Construct the service from persisted settings.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(settings: Settings) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), EnginePhase::Off),
            ctx: FsmContext::new(settings),
            safety: SafetyMonitor::new(),
            power: PowerManager::new(0),
            tick_count: 0,
            last_alerts: 0,
            config_dirty: false,
            dirty_since_ms: 0,
            save_now: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter the OFF phase and open the boot grace period at `now`.
    pub fn start(&mut self, now: Millis, sink: &mut impl EventSink) {
        self.ctx.now = now;
        self.power = PowerManager::new(now);
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {}", self.fsm.current_state().name());
    }

    /// Unconditional reset after waking from sleep: phase OFF, key OFF,
    /// alerts cleared, relays de-energised.
    pub fn on_wake(&mut self, now: Millis, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        self.ctx.now = now;
        self.fsm.reset(&mut self.ctx);
        self.safety.reset();
        self.ctx.alert_flags = 0;
        self.last_alerts = 0;
        self.power.on_wake(now);
        self.apply_relays(hw);
        sink.emit(&AppEvent::Woke);
        info!("Woke from sleep, state reset to OFF");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: read sensors → FSM → safety → relays.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`RelayPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        now: Millis,
        hw: &mut (impl SensorPort + RelayPort),
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.ctx.now = now;
        let prev_phase = self.fsm.current_state();

        // 1. Read sensors with the calibration in force right now
        self.ctx.sensors = hw.read_all(&self.ctx.settings.calibration);

        // 2. FSM tick (pure phase logic)
        self.fsm.tick(&mut self.ctx);

        // 3. Safety evaluation on the phase the FSM settled in
        let verdict = self
            .safety
            .evaluate(self.fsm.current_state(), &self.ctx.sensors, &self.ctx.settings);
        self.ctx.alert_flags = verdict.alerts;
        if let Some(forced) = verdict.force_phase {
            warn!(
                "Safety forcing {} (alerts=0b{:04b})",
                forced.name(),
                verdict.alerts
            );
            self.fsm.force_transition(forced, &mut self.ctx);
        }
        self.emit_alert_edges(sink);

        // 4. Apply relay commands via RelayPort
        self.apply_relays(hw);

        // 5. Emit phase change if the FSM moved
        let new_phase = self.fsm.current_state();
        if new_phase != prev_phase {
            sink.emit(&AppEvent::PhaseChanged {
                from: prev_phase,
                to: new_phase,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command.  Accepted commands count as activity.
    /// A rejected command leaves every piece of state untouched.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now: Millis,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        self.ctx.now = now;
        self.dispatch(cmd, hw, sink)?;
        self.power.record_activity(now);
        Ok(())
    }

    fn dispatch(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::SetKeyPosition(raw) => {
                self.ctx.key = KeyPosition::try_from(raw)?;
            }
            AppCommand::SetStartHeld(held) => {
                self.ctx.start_held = held;
                self.ctx.key = if held {
                    KeyPosition::Start
                } else {
                    KeyPosition::Glow
                };
            }
            AppCommand::EmergencyStop => self.ctx.emergency_stop = true,
            AppCommand::ToggleLights => {
                self.ctx.lights_toggles = self.ctx.lights_toggles.saturating_add(1);
            }
            AppCommand::OverrideStart => {
                info!("Override start from {}", self.fsm.current_state().name());
                self.ctx.key = KeyPosition::Start;
                self.ctx.start_held = true;
                if self.fsm.current_state() == EnginePhase::Off {
                    self.force_phase(EnginePhase::On, sink);
                }
                self.force_phase(EnginePhase::Start, sink);
                self.apply_relays(hw);
            }
            AppCommand::RequestSleep => self.power.request_sleep(),
            AppCommand::SetSleepEnabled(enabled) => self.power.set_sleep_enabled(enabled),
            AppCommand::UpdateEngineTiming(timing) => {
                self.ctx.settings.update_engine_timing(timing)?;
                self.settings_changed("engine_timing", sink);
            }
            AppCommand::UpdateAlarmThresholds(thresholds) => {
                self.ctx.settings.update_alarm_thresholds(thresholds)?;
                self.settings_changed("alarm_thresholds", sink);
            }
            AppCommand::UpdateSensorCalibration(cal) => {
                self.ctx.settings.update_sensor_calibration(cal)?;
                self.settings_changed("sensor_calibration", sink);
            }
            AppCommand::UpdateWifi(creds) => {
                self.ctx.settings.update_wifi(creds)?;
                self.settings_changed("wifi", sink);
            }
            AppCommand::AutoCalibrate(reference) => {
                let raw = self.raw_for(reference);
                let cal = self
                    .ctx
                    .settings
                    .calibration
                    .calibrated_against(reference, raw)?;
                self.ctx.settings.update_sensor_calibration(cal)?;
                info!("Auto-calibrated against {:?} at raw {}", reference, raw);
                self.settings_changed("sensor_calibration", sink);
            }
            AppCommand::FactoryReset => {
                warn!("Factory reset: restoring default settings");
                self.ctx.settings = Settings::default();
                self.save_now = true;
                self.settings_changed("factory_reset", sink);
            }
            AppCommand::SaveSettings => {
                self.save_now = true;
                self.mark_config_dirty();
                info!("Explicit settings save requested (will flush on next auto-save check)");
            }
            AppCommand::ForcePhase(target) => {
                self.force_phase(target, sink);
                self.apply_relays(hw);
            }
        }
        Ok(())
    }

    // ── Sleep ─────────────────────────────────────────────────

    /// Ask the power manager whether to sleep now.  On `Sleep`, the
    /// caller flushes settings, de-energises relays and enters deep sleep.
    pub fn sleep_check(&mut self, now: Millis, sink: &mut impl EventSink) -> SleepDecision {
        let decision = self
            .power
            .evaluate(now, self.fsm.current_state(), self.ctx.key);
        if let SleepDecision::Sleep(reason) = decision {
            sink.emit(&AppEvent::SleepRequested(reason));
        }
        decision
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build the status document from the current context.
    pub fn status(&self, now: Millis) -> StatusReport {
        let phase = self.fsm.current_state();
        StatusReport {
            phase: phase.name(),
            key_position: self.ctx.key as u8,
            start_held: self.ctx.start_held,
            sensors: self.ctx.sensors,
            relays: self.ctx.relays,
            work_lights_on: self.ctx.work_lights_on,
            glow_remaining_s: self.ctx.glow_remaining_ms_at(now).div_ceil(1000),
            alerts: self.ctx.alert_flags,
            inactive_ms: self.power.inactive_ms(now),
            sleep_enabled: self.power.sleep_enabled(),
            sleep_eligible: self.power.sleep_eligible(now, phase, self.ctx.key),
        }
    }

    /// Current FSM phase.
    pub fn phase(&self) -> EnginePhase {
        self.fsm.current_state()
    }

    /// Read-only view of the shared context.
    pub fn context(&self) -> &FsmContext {
        &self.ctx
    }

    /// Live settings (for read-back by the remote layer).
    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Current latched alert bitmask (0 = no alerts).
    pub fn alert_flags(&self) -> u8 {
        self.ctx.alert_flags
    }

    // ── Internal ──────────────────────────────────────────────

    /// Translate the FSM relay command set into port calls.
    fn apply_relays(&self, hw: &mut impl RelayPort) {
        let phase = self.fsm.current_state();
        if phase == EnginePhase::Off {
            hw.all_off();
            return;
        }
        let r = &self.ctx.relays;
        // Double-gated: the starter only ever runs in START.
        let starter = r.starter && phase == EnginePhase::Start;

        if r.main_power {
            hw.set_main_power(true);
            hw.set_glow_plugs(r.glow_plugs);
            hw.set_starter(starter);
            hw.set_lights(r.lights);
        } else {
            hw.set_starter(false);
            hw.set_glow_plugs(r.glow_plugs);
            hw.set_lights(r.lights);
            hw.set_main_power(false);
        }
    }

    fn force_phase(&mut self, target: EnginePhase, sink: &mut impl EventSink) {
        let prev = self.fsm.current_state();
        if prev == target {
            return;
        }
        self.fsm.force_transition(target, &mut self.ctx);
        sink.emit(&AppEvent::PhaseChanged {
            from: prev,
            to: target,
        });
    }

    fn emit_alert_edges(&mut self, sink: &mut impl EventSink) {
        let now = self.ctx.alert_flags;
        let changed = now ^ self.last_alerts;
        for alert in SafetyAlert::ALL {
            if changed & alert.mask() == 0 {
                continue;
            }
            if now & alert.mask() != 0 {
                sink.emit(&AppEvent::AlertRaised(alert));
            } else {
                sink.emit(&AppEvent::AlertCleared(alert));
            }
        }
        self.last_alerts = now;
    }

    /// Latest raw count of the channel a reference measurement belongs to.
    fn raw_for(&self, reference: Reference) -> u16 {
        let raw = &self.ctx.sensors.raw;
        match reference {
            Reference::BatteryVolts(_) => raw.battery,
            Reference::EngineTempC(_) => raw.engine_temp,
            Reference::OilPressureKpa(_) => raw.oil_pressure,
            Reference::FuelPercent(_) => raw.fuel_level,
        }
    }

    fn settings_changed(&mut self, group: &'static str, sink: &mut impl EventSink) {
        self.mark_config_dirty();
        sink.emit(&AppEvent::SettingsChanged(group));
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the settings as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.ctx.now;
        }
    }

    /// Persist once [`AUTO_SAVE_DELAY_MS`] have passed since the first
    /// unsaved change, or right away after an explicit save request.
    /// Returns `true` if the settings were saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if !self.save_now && elapsed_ms(self.ctx.now, self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.ctx.settings) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_now = false;
                info!("Settings auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Settings auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before deep sleep).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.ctx.settings) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_now = false;
                info!("Settings force-saved before sleep");
            }
            Err(e) => {
                warn!("Settings force-save failed: {}", e);
            }
        }
    }

    /// Whether the settings have unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
