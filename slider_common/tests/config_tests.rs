//! Config file loading tests.
//!
//! `SliderConfig::load_validated()`: missing file, syntax errors, defaults,
//! unknown fields, polarity selection and the end-stop over-travel bound.

use slider_common::config::{ConfigError, ConfigLoader, SliderConfig};
use slider_common::io::DiLogic;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("slider.toml");
    fs::write(&path, body).unwrap();
    path
}

const FULL: &str = r#"
[shared]
service_name = "slider-bench"
log_level = "debug"

[stepper]
pulse_pin = 4
dir_pin = 13
enable_pin = 12
steps_per_revolution = 200
mm_per_revolution = 8.0
default_speed = 800
max_speed = 2000
min_percent_speed = 100
pulse_width_us = 5

[servo]
pin = 19
initial_angle = 45
default_speed = 30
min_pulse_us = 500
max_pulse_us = 2400

[limits]
min_pin = 23
max_pin = 15
logic = "NO"
debounce_ms = 40
poll_interval_ms = 10
endstop_margin_mm = 6.0

[tasks]
watchdog_timeout_ms = 5000
"#;

#[test]
fn full_file_loads() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL);
    let cfg = SliderConfig::load_validated(&path).unwrap();
    assert_eq!(cfg.shared.service_name, "slider-bench");
    assert_eq!(cfg.stepper.default_speed, 800);
    assert_eq!(cfg.servo.initial_angle, 45);
    assert_eq!(cfg.limits.logic, DiLogic::NO);
    assert_eq!(cfg.limits.debounce_ms, 40);
    assert_eq!(cfg.tasks.watchdog_timeout_ms, 5000);
}

#[test]
fn missing_file_is_file_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = SliderConfig::load(&tmp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound));
}

#[test]
fn broken_syntax_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "[shared\nservice_name = ");
    let err = SliderConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn unknown_stepper_field_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        "[shared]\nservice_name = \"s\"\n[stepper]\nacceleration = 500\n",
    );
    assert!(matches!(
        SliderConfig::load(&path).unwrap_err(),
        ConfigError::ParseError(_)
    ));
}

#[test]
fn overtravel_bound_is_enforced_on_load() {
    let tmp = TempDir::new().unwrap();
    // 150 ms debounce at 2000 steps/s covers 321 steps = 12.84 mm
    let path = write_config(
        tmp.path(),
        "[shared]\nservice_name = \"s\"\n[limits]\ndebounce_ms = 150\n",
    );
    match SliderConfig::load_validated(&path) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("over-travel"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn wider_margin_admits_slower_debounce() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        "[shared]\nservice_name = \"s\"\n[limits]\ndebounce_ms = 150\nendstop_margin_mm = 15.0\n",
    );
    SliderConfig::load_validated(&path).unwrap();
}

#[test]
fn shipped_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/slider.toml");
    let cfg = SliderConfig::load_validated(&path).unwrap();
    assert_eq!(cfg.limits.logic, DiLogic::NC);
}
