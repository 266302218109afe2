//! Sleep eligibility and deep-sleep entry.
//!
//! The manager never decides *how* to sleep; it only answers whether the
//! controller may sleep now.  The binary performs the actual entry after
//! flushing dirty settings and de-energising every relay.

use crate::fsm::EnginePhase;
use crate::fsm::context::{KeyPosition, Millis, elapsed_ms};
use log::{debug, info};

/// Sleep evaluation is suppressed for this long after boot.
pub const BOOT_GRACE_MS: u32 = 60_000;
/// Automatic sleep after this much time without an accepted command.
pub const INACTIVITY_TIMEOUT_MS: u32 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepReason {
    Manual,
    Inactivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    Stay,
    Sleep(SleepReason),
}

pub struct PowerManager {
    boot_ms: Millis,
    /// Latched once the boot grace has elapsed, so a clock wrap never
    /// re-opens it.
    grace_over: bool,
    last_activity_ms: Millis,
    sleep_enabled: bool,
    manual_request: bool,
}

impl PowerManager {
    pub fn new(boot_ms: Millis) -> Self {
        Self {
            boot_ms,
            grace_over: false,
            last_activity_ms: boot_ms,
            sleep_enabled: true,
            manual_request: false,
        }
    }

    /// An accepted command counts as operator activity.
    pub fn record_activity(&mut self, now: Millis) {
        self.last_activity_ms = now;
    }

    pub fn set_sleep_enabled(&mut self, enabled: bool) {
        if self.sleep_enabled != enabled {
            info!("Sleep mode {}", if enabled { "enabled" } else { "disabled" });
        }
        self.sleep_enabled = enabled;
    }

    pub fn sleep_enabled(&self) -> bool {
        self.sleep_enabled
    }

    /// Queue a manual sleep; honoured on the next [`evaluate`](Self::evaluate)
    /// if the controller is eligible, dropped otherwise.
    pub fn request_sleep(&mut self) {
        self.manual_request = true;
    }

    pub fn inactive_ms(&self, now: Millis) -> u32 {
        elapsed_ms(now, self.last_activity_ms)
    }

    /// Everything except the inactivity threshold permits sleep.
    pub fn sleep_eligible(&self, now: Millis, phase: EnginePhase, key: KeyPosition) -> bool {
        self.past_grace(now)
            && self.sleep_enabled
            && key == KeyPosition::Off
            && phase != EnginePhase::Running
            && !phase.is_alert()
    }

    /// Decide whether to sleep now.  Consumes any pending manual request.
    pub fn evaluate(&mut self, now: Millis, phase: EnginePhase, key: KeyPosition) -> SleepDecision {
        let manual = core::mem::take(&mut self.manual_request);
        if !self.grace_over && self.past_grace(now) {
            debug!("Boot grace period over");
            self.grace_over = true;
        }
        let eligible = self.sleep_eligible(now, phase, key);

        if manual {
            if eligible {
                info!("Manual sleep request accepted");
                return SleepDecision::Sleep(SleepReason::Manual);
            }
            info!(
                "Manual sleep request refused (phase={}, key={:?}, enabled={})",
                phase.name(),
                key,
                self.sleep_enabled
            );
        }

        if eligible && self.inactive_ms(now) > INACTIVITY_TIMEOUT_MS {
            info!("Inactive for {} ms, sleeping", self.inactive_ms(now));
            return SleepDecision::Sleep(SleepReason::Inactivity);
        }
        SleepDecision::Stay
    }

    /// Restart activity tracking after wake.
    pub fn on_wake(&mut self, now: Millis) {
        self.last_activity_ms = now;
        self.manual_request = false;
    }

    fn past_grace(&self, now: Millis) -> bool {
        self.grace_over || elapsed_ms(now, self.boot_ms) >= BOOT_GRACE_MS
    }
}

/// Enter deep sleep with the wake button armed.  Does not return.
#[cfg(target_os = "espidf")]
pub fn enter_deep_sleep() -> ! {
    info!("Entering deep sleep");
    unsafe {
        esp_idf_sys::esp_sleep_enable_ext0_wakeup(crate::pins::WAKE_BUTTON_GPIO, 0);
        esp_idf_sys::esp_deep_sleep_start();
    }
}
