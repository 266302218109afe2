//! Persisted settings
//!
//! All tunable parameters of the ignition controller, their validation
//! limits, grouped update operations, and the versioned/checksummed blob
//! format used by the storage adapter.

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::sensors::calibration::{ADC_MAX, Calibration};

/// Layout version of the persisted blob.  Bump on any field change.
pub const SETTINGS_VERSION: u8 = 1;

/// Validation limits.
pub mod limits {
    pub const GLOW_DURATION_MS: (u32, u32) = (5_000, 60_000);
    pub const CRANK_TIMEOUT_MS: (u32, u32) = (5_000, 30_000);
    pub const COOLDOWN_MS: (u32, u32) = (60_000, 300_000);
    pub const COOLANT_TEMP_C: (i16, i16) = (80, 120);
    pub const OIL_PRESSURE_KPA: (i16, i16) = (30, 150);
    pub const BATTERY_VOLTAGE: (f32, f32) = (10.0, 16.0);
    pub const TEMP_SCALE: (f32, f32) = (0.01, 1.0);
    pub const SENSOR_OFFSET: (f32, f32) = (-50.0, 50.0);
    pub const PRESSURE_SCALE: (f32, f32) = (0.01, 1.0);
    pub const BATTERY_DIVIDER: (f32, f32) = (0.001, 0.1);
    pub const WIFI_PASSWORD_LEN: (usize, usize) = (8, 64);
}

/// What the safety monitor does when battery voltage drops below the
/// configured minimum with the engine not OFF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LowBatteryPolicy {
    /// Raise the alert and keep running.
    #[default]
    AlertOnly,
    /// Raise the alert, force the ERROR phase, drop glow and starter.
    ForceError,
}

/// Core controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // --- Engine timing ---
    /// Glow-plug preheat duration (ms)
    pub glow_duration_ms: u32,
    /// Maximum continuous starter drive (ms)
    pub crank_timeout_ms: u32,
    /// Post-run cooldown (ms).  Reported only; the state machine does not enforce it.
    pub cooldown_ms: u32,

    // --- Alarm thresholds ---
    pub max_coolant_temp_c: i16,
    pub min_oil_pressure_kpa: i16,
    pub min_battery_voltage: f32,
    pub max_battery_voltage: f32,
    pub low_battery_policy: LowBatteryPolicy,

    // --- Sensor calibration ---
    pub calibration: Calibration,

    // --- Network credentials (consumed by the network collaborator) ---
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            glow_duration_ms: 20_000,
            crank_timeout_ms: 10_000,
            cooldown_ms: 120_000,

            max_coolant_temp_c: 104,
            min_oil_pressure_kpa: 69,
            min_battery_voltage: 11.0,
            max_battery_voltage: 15.0,
            low_battery_policy: LowBatteryPolicy::AlertOnly,

            calibration: Calibration::default(),

            wifi_ssid: String::new(),
            wifi_password: String::new(),
        }
    }
}

// ── Update groups ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineTiming {
    pub glow_duration_ms: u32,
    pub crank_timeout_ms: u32,
    pub cooldown_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmThresholds {
    pub max_coolant_temp_c: i16,
    pub min_oil_pressure_kpa: i16,
    pub min_battery_voltage: f32,
    pub max_battery_voltage: f32,
    pub low_battery_policy: LowBatteryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String<32>,
    pub password: String<64>,
}

fn in_range<T: PartialOrd>(value: T, (lo, hi): (T, T)) -> bool {
    value >= lo && value <= hi
}

impl Settings {
    pub fn engine_timing(&self) -> EngineTiming {
        EngineTiming {
            glow_duration_ms: self.glow_duration_ms,
            crank_timeout_ms: self.crank_timeout_ms,
            cooldown_ms: self.cooldown_ms,
        }
    }

    pub fn alarm_thresholds(&self) -> AlarmThresholds {
        AlarmThresholds {
            max_coolant_temp_c: self.max_coolant_temp_c,
            min_oil_pressure_kpa: self.min_oil_pressure_kpa,
            min_battery_voltage: self.min_battery_voltage,
            max_battery_voltage: self.max_battery_voltage,
            low_battery_policy: self.low_battery_policy,
        }
    }

    /// Range-check every field.  NaN fails every float range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use limits::*;

        if !in_range(self.glow_duration_ms, GLOW_DURATION_MS) {
            return Err(ConfigError::ValidationFailed("glow_duration_ms must be 5000–60000"));
        }
        if !in_range(self.crank_timeout_ms, CRANK_TIMEOUT_MS) {
            return Err(ConfigError::ValidationFailed("crank_timeout_ms must be 5000–30000"));
        }
        if !in_range(self.cooldown_ms, COOLDOWN_MS) {
            return Err(ConfigError::ValidationFailed("cooldown_ms must be 60000–300000"));
        }
        if !in_range(self.max_coolant_temp_c, COOLANT_TEMP_C) {
            return Err(ConfigError::ValidationFailed("max_coolant_temp_c must be 80–120"));
        }
        if !in_range(self.min_oil_pressure_kpa, OIL_PRESSURE_KPA) {
            return Err(ConfigError::ValidationFailed("min_oil_pressure_kpa must be 30–150"));
        }
        if !in_range(self.min_battery_voltage, BATTERY_VOLTAGE)
            || !in_range(self.max_battery_voltage, BATTERY_VOLTAGE)
        {
            return Err(ConfigError::ValidationFailed("battery voltage bounds must be 10.0–16.0"));
        }
        if self.min_battery_voltage >= self.max_battery_voltage {
            return Err(ConfigError::ValidationFailed(
                "min_battery_voltage must be < max_battery_voltage",
            ));
        }

        let cal = &self.calibration;
        if !in_range(cal.temp_scale, TEMP_SCALE) {
            return Err(ConfigError::ValidationFailed("temp_scale must be 0.01–1.0"));
        }
        if !in_range(cal.temp_offset, SENSOR_OFFSET) {
            return Err(ConfigError::ValidationFailed("temp_offset must be -50.0–50.0"));
        }
        if !in_range(cal.pressure_scale, PRESSURE_SCALE) {
            return Err(ConfigError::ValidationFailed("pressure_scale must be 0.01–1.0"));
        }
        if !in_range(cal.pressure_offset, SENSOR_OFFSET) {
            return Err(ConfigError::ValidationFailed("pressure_offset must be -50.0–50.0"));
        }
        if !in_range(cal.battery_divider, BATTERY_DIVIDER) {
            return Err(ConfigError::ValidationFailed("battery_divider must be 0.001–0.1"));
        }
        if cal.fuel_empty_raw > ADC_MAX || cal.fuel_full_raw > ADC_MAX {
            return Err(ConfigError::ValidationFailed("fuel bounds must be 0–4095"));
        }
        if cal.fuel_empty_raw >= cal.fuel_full_raw {
            return Err(ConfigError::ValidationFailed("fuel_empty_raw must be < fuel_full_raw"));
        }

        let pw_len = self.wifi_password.chars().count();
        if pw_len != 0 && !in_range(pw_len, WIFI_PASSWORD_LEN) {
            return Err(ConfigError::ValidationFailed(
                "wifi_password must be empty or 8–64 characters",
            ));
        }
        Ok(())
    }

    pub fn update_engine_timing(&mut self, t: EngineTiming) -> Result<(), ConfigError> {
        let old = self.engine_timing();
        self.apply("Engine timing", |s| {
            s.glow_duration_ms = t.glow_duration_ms;
            s.crank_timeout_ms = t.crank_timeout_ms;
            s.cooldown_ms = t.cooldown_ms;
        })?;
        log_change("glow_duration_ms", old.glow_duration_ms, t.glow_duration_ms);
        log_change("crank_timeout_ms", old.crank_timeout_ms, t.crank_timeout_ms);
        log_change("cooldown_ms", old.cooldown_ms, t.cooldown_ms);
        Ok(())
    }

    pub fn update_alarm_thresholds(&mut self, a: AlarmThresholds) -> Result<(), ConfigError> {
        let old = self.alarm_thresholds();
        self.apply("Alarm thresholds", |s| {
            s.max_coolant_temp_c = a.max_coolant_temp_c;
            s.min_oil_pressure_kpa = a.min_oil_pressure_kpa;
            s.min_battery_voltage = a.min_battery_voltage;
            s.max_battery_voltage = a.max_battery_voltage;
            s.low_battery_policy = a.low_battery_policy;
        })?;
        log_change("max_coolant_temp_c", old.max_coolant_temp_c, a.max_coolant_temp_c);
        log_change("min_oil_pressure_kpa", old.min_oil_pressure_kpa, a.min_oil_pressure_kpa);
        log_change("min_battery_voltage", old.min_battery_voltage, a.min_battery_voltage);
        log_change("max_battery_voltage", old.max_battery_voltage, a.max_battery_voltage);
        if old.low_battery_policy != a.low_battery_policy {
            info!(
                "Settings: low_battery_policy changed from {:?} to {:?}",
                old.low_battery_policy, a.low_battery_policy
            );
        }
        Ok(())
    }

    pub fn update_sensor_calibration(&mut self, cal: Calibration) -> Result<(), ConfigError> {
        let old = self.calibration;
        self.apply("Sensor calibration", |s| s.calibration = cal)?;
        log_change("temp_scale", old.temp_scale, cal.temp_scale);
        log_change("temp_offset", old.temp_offset, cal.temp_offset);
        log_change("pressure_scale", old.pressure_scale, cal.pressure_scale);
        log_change("pressure_offset", old.pressure_offset, cal.pressure_offset);
        log_change("battery_divider", old.battery_divider, cal.battery_divider);
        log_change("fuel_empty_raw", old.fuel_empty_raw, cal.fuel_empty_raw);
        log_change("fuel_full_raw", old.fuel_full_raw, cal.fuel_full_raw);
        Ok(())
    }

    pub fn update_wifi(&mut self, creds: WifiCredentials) -> Result<(), ConfigError> {
        let old_ssid = self.wifi_ssid.clone();
        self.apply("WiFi credentials", |s| {
            s.wifi_ssid = creds.ssid.clone();
            s.wifi_password = creds.password.clone();
        })?;
        if old_ssid != creds.ssid {
            info!("Settings: wifi_ssid changed from '{}' to '{}'", old_ssid, creds.ssid);
        }
        info!("Settings: wifi_password updated (****)");
        Ok(())
    }

    /// Apply `edit` to a copy, validate the copy, and only then adopt it.
    fn apply(&mut self, group: &str, edit: impl FnOnce(&mut Settings)) -> Result<(), ConfigError> {
        let mut candidate = self.clone();
        edit(&mut candidate);
        if let Err(e) = candidate.validate() {
            warn!("Settings: {} update rejected: {}", group, e);
            return Err(e);
        }
        *self = candidate;
        Ok(())
    }
}

fn log_change<T: PartialEq + core::fmt::Display>(field: &str, old: T, new: T) {
    if old != new {
        info!("Settings: {} changed from {} to {}", field, old, new);
    }
}

// ── Persisted blob ────────────────────────────────────────────
//
// [version: u8][checksum: u32 LE][postcard(Settings)]
//
// The version byte is checked before decoding so a layout change is
// reported as a version mismatch rather than as garbage.

const HEADER_LEN: usize = 5;

/// Rotate-left XOR checksum over the encoded settings bytes.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc ^ u32::from(b)).rotate_left(1))
}

/// Validate and encode `settings` into a storable blob.
pub fn encode_blob(settings: &Settings) -> Result<Vec<u8>, ConfigError> {
    settings.validate()?;
    let body = postcard::to_allocvec(settings).map_err(|_| ConfigError::IoError)?;
    let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
    blob.push(SETTINGS_VERSION);
    blob.extend_from_slice(&checksum(&body).to_le_bytes());
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode and verify a stored blob.
pub fn decode_blob(blob: &[u8]) -> Result<Settings, ConfigError> {
    if blob.len() <= HEADER_LEN {
        return Err(ConfigError::Corrupted);
    }
    let version = blob[0];
    if version != SETTINGS_VERSION {
        return Err(ConfigError::VersionMismatch { found: version });
    }
    let stored = u32::from_le_bytes([blob[1], blob[2], blob[3], blob[4]]);
    let body = &blob[HEADER_LEN..];
    if checksum(body) != stored {
        return Err(ConfigError::ChecksumMismatch);
    }
    let settings: Settings = postcard::from_bytes(body).map_err(|_| ConfigError::Corrupted)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings, falling back to defaults on any integrity failure.
///
/// Missing, corrupted, foreign-version, checksum-failed or out-of-range
/// blobs are replaced by the defaults, which are then written back.  A
/// plain I/O error falls back without writing.
pub fn load_or_restore(store: &impl ConfigPort) -> Settings {
    match store.load() {
        Ok(settings) => {
            info!("Settings loaded (v{})", SETTINGS_VERSION);
            settings
        }
        Err(ConfigError::IoError) => {
            warn!("Settings: storage I/O error, running on defaults");
            Settings::default()
        }
        Err(e) => {
            warn!("Settings: {}, restoring defaults", e);
            let defaults = Settings::default();
            if let Err(e) = store.save(&defaults) {
                warn!("Settings: could not persist defaults: {}", e);
            }
            defaults
        }
    }
}
