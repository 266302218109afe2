//! Keyswitch Firmware: Main Entry Point
//!
//! Hexagonal architecture around a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Sensor+Relay)    (EventSink)    (Config+NVS) (clock)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Safety · Power                                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                          ▲                                     │
//! │                 COMMANDS queue (remote layer)                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::gpio::{InputPin, OutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use log::{info, warn};

use keyswitch::adapters::hardware::HardwareAdapter;
use keyswitch::adapters::log_sink::LogEventSink;
use keyswitch::adapters::nvs::NvsAdapter;
use keyswitch::adapters::time::Esp32TimeAdapter;
use keyswitch::app::commands::COMMANDS;
use keyswitch::app::events::AppEvent;
use keyswitch::app::ports::{EventSink, RelayPort};
use keyswitch::app::service::AppService;
use keyswitch::config;
use keyswitch::drivers::hw_init;
use keyswitch::drivers::relay::RelayBank;
use keyswitch::power::{self, SleepDecision};
use keyswitch::sensors::SensorHub;
use keyswitch::sensors::feedback::FeedbackInputs;

/// Control loop period.
const TICK_MS: u64 = 50;
/// Status snapshot cadence.
const STATUS_INTERVAL_MS: u32 = 1_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Keyswitch v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let woke_from_sleep = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() }
        == esp_idf_svc::sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0;

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {e}"))?;
    let p = Peripherals::take()?;

    // Relays first, so every output is driven LOW as early as possible.
    let relays = RelayBank::new(
        PinDriver::output(p.pins.gpio5.downgrade_output())?,
        PinDriver::output(p.pins.gpio21.downgrade_output())?,
        PinDriver::output(p.pins.gpio22.downgrade_output())?,
        PinDriver::output(p.pins.gpio18.downgrade_output())?,
    );
    let feedback = FeedbackInputs::new(
        PinDriver::input(p.pins.gpio27.downgrade_input())?,
        PinDriver::input(p.pins.gpio14.downgrade_input())?,
    );
    let mut hw = HardwareAdapter::new(SensorHub::new(feedback), relays);

    // ── 3. Settings (defaults restored on any integrity failure) ──
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let settings = config::load_or_restore(&nvs);

    // ── 4. Application service ────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut log_sink = LogEventSink::new();
    let mut app = AppService::new(settings);
    app.start(clock.now_ms(), &mut log_sink);
    if woke_from_sleep {
        app.on_wake(clock.now_ms(), &mut hw, &mut log_sink);
    }

    info!("System ready. Entering control loop ({} ms tick).", TICK_MS);

    // ── 5. Control loop ───────────────────────────────────────
    let mut last_status = clock.now_ms();

    loop {
        std::thread::sleep(std::time::Duration::from_millis(TICK_MS));
        let now = clock.now_ms();

        // Remote commands, FIFO, before evaluation.
        while let Some(cmd) = COMMANDS.try_next() {
            if let Err(e) = app.handle_command(cmd, now, &mut hw, &mut log_sink) {
                warn!("Command rejected: {}", e);
            }
        }

        app.tick(now, &mut hw, &mut log_sink);

        // Settings auto-save (5 s debounce after first change).
        app.auto_save_if_needed(&nvs);

        if now.wrapping_sub(last_status) >= STATUS_INTERVAL_MS {
            last_status = now;
            log_sink.emit(&AppEvent::Status(app.status(now)));
        }

        if let SleepDecision::Sleep(_) = app.sleep_check(now, &mut log_sink) {
            app.force_save_if_dirty(&nvs);
            hw.all_off();
            power::enter_deep_sleep();
        }
    }
}
