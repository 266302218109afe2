//! Fuzz target: `AppService` command/tick sequences
//!
//! Interprets the input as a stream of operator commands, sensor readings
//! and clock jumps, and checks after every tick that:
//! - the starter relay is only energised in START
//! - OFF leaves every relay de-energised
//!
//! cargo fuzz run fuzz_command_sequence

#![no_main]

use keyswitch::app::commands::AppCommand;
use keyswitch::app::events::AppEvent;
use keyswitch::app::ports::{EventSink, RelayPort, SensorPort};
use keyswitch::app::service::AppService;
use keyswitch::config::Settings;
use keyswitch::fsm::EnginePhase;
use keyswitch::fsm::context::{RawCounts, SensorSnapshot};
use keyswitch::sensors;
use keyswitch::sensors::calibration::Calibration;
use keyswitch::sensors::feedback::FeedbackLevels;
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Board {
    raw: RawCounts,
    relays: [bool; 4],
}

impl SensorPort for Board {
    fn read_all(&mut self, cal: &Calibration) -> SensorSnapshot {
        sensors::convert(self.raw, FeedbackLevels::default(), cal)
    }
}

impl RelayPort for Board {
    fn set_main_power(&mut self, on: bool) {
        self.relays[0] = on;
    }
    fn set_glow_plugs(&mut self, on: bool) {
        self.relays[1] = on;
    }
    fn set_starter(&mut self, on: bool) {
        self.relays[2] = on;
    }
    fn set_lights(&mut self, on: bool) {
        self.relays[3] = on;
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut app = AppService::new(Settings::default());
    let mut board = Board::default();
    let mut sink = Discard;
    let mut now: u32 = 0;
    app.start(now, &mut sink);

    for pair in data.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1]);
        let cmd = match op % 10 {
            0 => Some(AppCommand::SetKeyPosition(arg % 5)),
            1 => Some(AppCommand::SetStartHeld(arg & 1 == 1)),
            2 => Some(AppCommand::EmergencyStop),
            3 => Some(AppCommand::ToggleLights),
            4 => Some(AppCommand::OverrideStart),
            5 => Some(AppCommand::ForcePhase(EnginePhase::from_index(
                usize::from(arg) % EnginePhase::COUNT,
            ))),
            6 => {
                let v = u16::from(arg) << 4;
                match arg % 4 {
                    0 => board.raw.engine_temp = v,
                    1 => board.raw.oil_pressure = v,
                    2 => board.raw.battery = v,
                    _ => board.raw.fuel_level = v,
                }
                None
            }
            _ => {
                now = now.wrapping_add(u32::from(arg) * 250);
                None
            }
        };
        if let Some(cmd) = cmd {
            let _ = app.handle_command(cmd, now, &mut board, &mut sink);
        }
        app.tick(now, &mut board, &mut sink);

        if board.relays[2] {
            assert_eq!(app.phase(), EnginePhase::Start, "starter outside START");
        }
        if app.phase() == EnginePhase::Off {
            assert_eq!(board.relays, [false; 4], "relay energised in OFF");
        }
    }
});
