//! Loads the shipped configuration file and checks it against the
//! built-in defaults.

use std::path::PathBuf;

use reach_common::config::{AppConfig, ConfigLoader};
use reach_common::prelude::*;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/reach.toml")
}

#[test]
fn shipped_config_is_valid() {
    let config = AppConfig::load_validated(&shipped_config()).unwrap();
    assert_eq!(config.shared.service_name, "reach-sweep");
    assert_eq!(config.sweep.parameters.len(), 4);
    assert_eq!(config.sweep.focus, ParamId::ElevatorLength);
    assert_eq!(config.sweep.ghost_resolution, 120);
}

#[test]
fn shipped_arm_matches_defaults() {
    let config = AppConfig::load(&shipped_config()).unwrap();
    assert!(config.arm.approx_eq(&ArmConfig::default(), 1e-12));
    assert_eq!(config.calibration, ServoCalibration::default());
}

#[test]
fn arm_snapshot_round_trips_through_toml() {
    let mut arm = ArmConfig::default();
    arm.set(ParamId::RodRatio, 1.25).unwrap();
    let text = toml::to_string(&arm).unwrap();
    let back = ArmConfig::from_toml(&text).unwrap();
    assert!(back.approx_eq(&arm, 1e-12));
}
