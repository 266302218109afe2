//! Digital feedback inputs: alternator charge lamp and engine-run sense.
//!
//! Generic over `embedded_hal::digital::InputPin` so the board build can
//! hand in `esp_idf_hal` pin drivers while tests use plain mocks.  Both
//! inputs are active-high.

use embedded_hal::digital::InputPin;
use log::warn;

/// Latest digital feedback levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackLevels {
    pub alternator_charging: bool,
    pub engine_running: bool,
}

pub struct FeedbackInputs<P: InputPin> {
    alternator: P,
    run_sense: P,
    last: FeedbackLevels,
}

impl<P: InputPin> FeedbackInputs<P> {
    pub fn new(alternator: P, run_sense: P) -> Self {
        Self {
            alternator,
            run_sense,
            last: FeedbackLevels::default(),
        }
    }

    /// Sample both inputs.  A pin error keeps the previous level.
    pub fn read(&mut self) -> FeedbackLevels {
        match self.alternator.is_high() {
            Ok(level) => self.last.alternator_charging = level,
            Err(e) => warn!("feedback: alternator read failed: {:?}", e),
        }
        match self.run_sense.is_high() {
            Ok(level) => self.last.engine_running = level,
            Err(e) => warn!("feedback: run-sense read failed: {:?}", e),
        }
        self.last
    }
}
