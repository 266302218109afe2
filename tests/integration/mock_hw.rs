//! Mock hardware adapter for integration tests.
//!
//! Records every relay call so tests can assert on the full switching
//! history, and serves injected raw ADC counts through the real
//! calibration path.

use std::cell::{Cell, RefCell};

use keyswitch::app::events::AppEvent;
use keyswitch::app::ports::{ConfigError, ConfigPort, EventSink, RelayPort, SensorPort};
use keyswitch::app::service::AppService;
use keyswitch::config::{self, Settings};
use keyswitch::fsm::context::{RawCounts, SensorSnapshot};
use keyswitch::sensors;
use keyswitch::sensors::calibration::Calibration;
use keyswitch::sensors::feedback::FeedbackLevels;

// ── Raw counts for a healthy idle engine at default calibration ──
//
// 640 → 85 °C, 1784 → 300 kPa, 1135 → 12.6 V, 2000 → 50 %.

pub const HEALTHY: RawCounts = RawCounts {
    engine_temp: 640,
    oil_pressure: 1784,
    battery: 1135,
    fuel_level: 2000,
};

// ── Relay call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCall {
    MainPower(bool),
    GlowPlugs(bool),
    Starter(bool),
    Lights(bool),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<RelayCall>,
    pub raw: RawCounts,
    pub feedback: FeedbackLevels,
    pub main_power: bool,
    pub glow_plugs: bool,
    pub starter: bool,
    pub lights: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            raw: HEALTHY,
            feedback: FeedbackLevels::default(),
            main_power: false,
            glow_plugs: false,
            starter: false,
            lights: false,
        }
    }

    pub fn last_call(&self) -> Option<&RelayCall> {
        self.calls.last()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// `(main, glow, starter, lights)` as last driven.
    pub fn outputs(&self) -> (bool, bool, bool, bool) {
        (self.main_power, self.glow_plugs, self.starter, self.lights)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self, cal: &Calibration) -> SensorSnapshot {
        sensors::convert(self.raw, self.feedback, cal)
    }
}

impl RelayPort for MockHardware {
    fn set_main_power(&mut self, on: bool) {
        self.main_power = on;
        self.calls.push(RelayCall::MainPower(on));
    }

    fn set_glow_plugs(&mut self, on: bool) {
        self.glow_plugs = on;
        self.calls.push(RelayCall::GlowPlugs(on));
    }

    fn set_starter(&mut self, on: bool) {
        self.starter = on;
        self.calls.push(RelayCall::Starter(on));
    }

    fn set_lights(&mut self, on: bool) {
        self.lights = on;
        self.calls.push(RelayCall::Lights(on));
    }

    fn all_off(&mut self) {
        self.main_power = false;
        self.glow_plugs = false;
        self.starter = false;
        self.lights = false;
        self.calls.push(RelayCall::AllOff);
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// Blob-level settings store using the production encoding.
pub struct MockNvs {
    blob: RefCell<Option<Vec<u8>>>,
    pub saves: Cell<u32>,
    pub fail_writes: Cell<bool>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            blob: RefCell::new(None),
            saves: Cell::new(0),
            fail_writes: Cell::new(false),
        }
    }

    pub fn stored(&self) -> Option<Settings> {
        self.blob
            .borrow()
            .as_deref()
            .and_then(|b| config::decode_blob(b).ok())
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<Settings, ConfigError> {
        match self.blob.borrow().as_deref() {
            Some(b) => config::decode_blob(b),
            None => Err(ConfigError::NotFound),
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if self.fail_writes.get() {
            return Err(ConfigError::IoError);
        }
        let blob = config::encode_blob(settings)?;
        *self.blob.borrow_mut() = Some(blob);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// ── LogSink ──────────────────────────────────────────────────

pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn rendered(&self) -> Vec<String> {
        self.events.iter().map(|e| format!("{:?}", e)).collect()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A started service with fresh mocks, boot at t = 0.
#[allow(dead_code)]
pub fn started(settings: Settings) -> (AppService, MockHardware, LogSink) {
    let mut app = AppService::new(settings);
    let hw = MockHardware::new();
    let mut sink = LogSink::new();
    app.start(0, &mut sink);
    (app, hw, sink)
}
