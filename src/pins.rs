//! GPIO / peripheral pin assignments for the ignition controller board
//! (classic ESP32, 30-pin DevKit).
//!
//! `main.rs` claims the matching `Peripherals` fields by name, so a pin
//! moved here must be moved there too.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH, opto-isolated relay board)
// ---------------------------------------------------------------------------

/// Main ignition power relay.
pub const MAIN_POWER_GPIO: i32 = 5;
/// Glow-plug relay.
pub const GLOW_PLUGS_GPIO: i32 = 21;
/// Starter solenoid relay.
pub const STARTER_GPIO: i32 = 22;
/// Front and rear work lights (one relay).
pub const LIGHTS_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Analog senders (ADC1 only; ADC2 is unusable while WiFi is up)
// ---------------------------------------------------------------------------

/// Coolant temperature sender.  ADC1 channel 6.
pub const ENGINE_TEMP_GPIO: i32 = 34;
/// Oil pressure sender (0–5 V through divider).  ADC1 channel 7.
pub const OIL_PRESSURE_GPIO: i32 = 35;
/// Battery voltage through a resistive divider.  ADC1 channel 0.
pub const BATTERY_GPIO: i32 = 36;
/// Fuel level sender.  ADC1 channel 3.
pub const FUEL_LEVEL_GPIO: i32 = 39;

// ---------------------------------------------------------------------------
// Digital feedback inputs
// ---------------------------------------------------------------------------

/// Alternator charge lamp line.  HIGH = charging.
pub const ALTERNATOR_GPIO: i32 = 27;
/// Engine run feedback (oil pressure switch).  HIGH = running.
pub const RUN_FEEDBACK_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// Wake source
// ---------------------------------------------------------------------------

/// BOOT button (RTC-capable, active LOW) wakes the board from deep sleep.
pub const WAKE_BUTTON_GPIO: i32 = 0;
