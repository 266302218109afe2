//! Integration tests for settings updates, persistence, and recovery.

use super::mock_hw::{MockNvs, started};

use keyswitch::adapters::nvs::NvsAdapter;
use keyswitch::app::commands::AppCommand;
use keyswitch::app::ports::{ConfigError, ConfigPort};
use keyswitch::app::service::AUTO_SAVE_DELAY_MS;
use keyswitch::config::{self, EngineTiming, LowBatteryPolicy, Settings, WifiCredentials};
use keyswitch::error::{CommandError, Error};
use keyswitch::sensors::calibration::Reference;

// ── Validation through the command path ───────────────────────

#[test]
fn out_of_range_oil_threshold_is_rejected_and_nothing_changes() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let mut thresholds = app.settings().alarm_thresholds();
    thresholds.min_oil_pressure_kpa = 200;

    let res = app.handle_command(
        AppCommand::UpdateAlarmThresholds(thresholds),
        100,
        &mut hw,
        &mut sink,
    );

    assert!(matches!(
        res,
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(app.settings(), &Settings::default());
    assert!(!app.is_config_dirty());
}

#[test]
fn short_wifi_password_is_rejected() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let creds = WifiCredentials {
        ssid: heapless::String::try_from("yard").unwrap(),
        password: heapless::String::try_from("short").unwrap(),
    };
    assert!(
        app.handle_command(AppCommand::UpdateWifi(creds), 0, &mut hw, &mut sink)
            .is_err()
    );
    assert!(app.settings().wifi_ssid.is_empty());
}

// ── Auto-save debounce ────────────────────────────────────────

#[test]
fn accepted_update_saves_after_debounce() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let nvs = MockNvs::new();
    let timing = EngineTiming {
        glow_duration_ms: 15_000,
        ..app.settings().engine_timing()
    };

    app.handle_command(AppCommand::UpdateEngineTiming(timing), 1_000, &mut hw, &mut sink)
        .unwrap();
    assert!(app.is_config_dirty());

    app.tick(1_000 + AUTO_SAVE_DELAY_MS - 1, &mut hw, &mut sink);
    assert!(!app.auto_save_if_needed(&nvs));
    assert_eq!(nvs.saves.get(), 0);

    app.tick(1_000 + AUTO_SAVE_DELAY_MS, &mut hw, &mut sink);
    assert!(app.auto_save_if_needed(&nvs));
    assert!(!app.is_config_dirty());
    assert_eq!(nvs.stored().unwrap().glow_duration_ms, 15_000);
}

#[test]
fn explicit_save_skips_the_debounce() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let nvs = MockNvs::new();
    app.handle_command(AppCommand::SaveSettings, 200, &mut hw, &mut sink)
        .unwrap();
    assert!(app.auto_save_if_needed(&nvs));
    assert_eq!(nvs.saves.get(), 1);
}

#[test]
fn factory_reset_restores_defaults_and_saves_immediately() {
    let custom = Settings {
        glow_duration_ms: 30_000,
        low_battery_policy: LowBatteryPolicy::ForceError,
        ..Settings::default()
    };
    let (mut app, mut hw, mut sink) = started(custom);
    let nvs = MockNvs::new();

    app.handle_command(AppCommand::FactoryReset, 500, &mut hw, &mut sink)
        .unwrap();

    assert_eq!(app.settings(), &Settings::default());
    assert!(app.auto_save_if_needed(&nvs));
    assert_eq!(nvs.stored(), Some(Settings::default()));
}

#[test]
fn failed_write_keeps_settings_dirty_for_retry() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    let nvs = MockNvs::new();
    nvs.fail_writes.set(true);

    app.handle_command(AppCommand::SaveSettings, 0, &mut hw, &mut sink)
        .unwrap();
    assert!(!app.auto_save_if_needed(&nvs));
    assert!(app.is_config_dirty());

    nvs.fail_writes.set(false);
    assert!(app.auto_save_if_needed(&nvs));
    assert!(!app.is_config_dirty());
}

// ── Auto-calibration ──────────────────────────────────────────

#[test]
fn auto_calibration_reproduces_the_reference_reading() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.tick(0, &mut hw, &mut sink);

    app.handle_command(
        AppCommand::AutoCalibrate(Reference::BatteryVolts(12.9)),
        100,
        &mut hw,
        &mut sink,
    )
    .unwrap();
    app.tick(150, &mut hw, &mut sink);

    let volts = app.status(150).sensors.battery_volts;
    assert!((volts - 12.9).abs() < 0.01, "got {volts}");
    assert!(app.is_config_dirty());
}

#[test]
fn auto_calibration_of_temperature_keeps_offset() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    app.tick(0, &mut hw, &mut sink);
    let offset = app.settings().calibration.temp_offset;

    app.handle_command(
        AppCommand::AutoCalibrate(Reference::EngineTempC(90.0)),
        100,
        &mut hw,
        &mut sink,
    )
    .unwrap();
    app.tick(150, &mut hw, &mut sink);

    assert_eq!(app.settings().calibration.temp_offset, offset);
    assert!((app.status(150).sensors.engine_temp_c - 90.0).abs() < 0.05);
}

#[test]
fn auto_calibration_refuses_a_zero_reading() {
    let (mut app, mut hw, mut sink) = started(Settings::default());
    hw.raw.battery = 0;
    app.tick(0, &mut hw, &mut sink);

    let res = app.handle_command(
        AppCommand::AutoCalibrate(Reference::BatteryVolts(12.6)),
        100,
        &mut hw,
        &mut sink,
    );
    assert_eq!(res, Err(Error::Command(CommandError::ZeroRawReading)));
    assert!(!app.is_config_dirty());
}

// ── Load / restore ────────────────────────────────────────────

#[test]
fn settings_survive_a_reboot() {
    let nvs = NvsAdapter::new().unwrap();
    let custom = Settings {
        crank_timeout_ms: 7_000,
        min_oil_pressure_kpa: 80,
        ..Settings::default()
    };
    nvs.save(&custom).unwrap();

    assert_eq!(config::load_or_restore(&nvs), custom);
}

#[test]
fn first_boot_persists_defaults() {
    let nvs = NvsAdapter::new().unwrap();
    assert_eq!(nvs.load(), Err(ConfigError::NotFound));

    assert_eq!(config::load_or_restore(&nvs), Settings::default());
    assert_eq!(nvs.load(), Ok(Settings::default()));
}

#[test]
fn corrupted_blob_falls_back_to_defaults_and_rewrites() {
    let nvs = NvsAdapter::new().unwrap();
    let mut blob = config::encode_blob(&Settings {
        glow_duration_ms: 9_000,
        ..Settings::default()
    })
    .unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0xFF;
    nvs.write_raw_settings(&blob).unwrap();

    assert_eq!(nvs.load(), Err(ConfigError::ChecksumMismatch));
    assert_eq!(config::load_or_restore(&nvs), Settings::default());
    assert_eq!(nvs.load(), Ok(Settings::default()));
}

#[test]
fn out_of_range_stored_value_is_not_adopted() {
    let nvs = NvsAdapter::new().unwrap();
    let mut bad = Settings::default();
    bad.max_coolant_temp_c = 150;
    // encode_blob validates, so hand-assemble the blob around the body.
    let body = postcard::to_allocvec(&bad).unwrap();
    let mut blob = vec![config::SETTINGS_VERSION];
    blob.extend_from_slice(&config::checksum(&body).to_le_bytes());
    blob.extend_from_slice(&body);
    nvs.write_raw_settings(&blob).unwrap();

    assert!(matches!(nvs.load(), Err(ConfigError::ValidationFailed(_))));
    assert_eq!(config::load_or_restore(&nvs), Settings::default());
}
