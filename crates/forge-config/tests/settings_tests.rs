//! Settings loading and precedence tests

use forge_config::{ConfigError, ForgeSettings, SettingsLoader};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for var in [
        "FORGE_INSTALL_DIR",
        "FORGE_SOURCE_DIR",
        "FORGE_BUILD_DIR",
        "FORGE_MAX_PARALLEL",
        "FORGE_JOBS_PER_LIB",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_project_overrides_global() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let global = temp.path().join("global.toml");
    fs::write(&global, "max_parallel = 2\njobs_per_lib = 4\n").unwrap();
    fs::write(temp.path().join("forge.toml"), "max_parallel = 6\n").unwrap();

    let settings = SettingsLoader::new()
        .with_global_path(&global)
        .load(temp.path())
        .unwrap();

    assert_eq!(settings.max_parallel, Some(6));
    assert_eq!(settings.jobs_per_lib, Some(4));
}

#[test]
#[serial]
fn test_env_overrides_project() {
    clear_env();
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("forge.toml"),
        "install_dir = \"from-file\"\nmax_parallel = 3\n",
    )
    .unwrap();
    env::set_var("FORGE_INSTALL_DIR", "/from/env");
    env::set_var("FORGE_MAX_PARALLEL", "12");

    let settings = SettingsLoader::new()
        .with_global_path(temp.path().join("missing.toml"))
        .load(temp.path())
        .unwrap();
    clear_env();

    assert_eq!(settings.install_dir, Some(PathBuf::from("/from/env")));
    assert_eq!(settings.max_parallel, Some(12));
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    let temp = TempDir::new().unwrap();
    env::set_var("FORGE_JOBS_PER_LIB", "lots");

    let result = SettingsLoader::new()
        .with_global_path(temp.path().join("missing.toml"))
        .load(temp.path());
    clear_env();

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_unknown_field_rejected() {
    clear_env();
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("forge.toml"), "colour = \"blue\"\n").unwrap();

    let result = SettingsLoader::new()
        .with_global_path(temp.path().join("missing.toml"))
        .load(temp.path());
    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
fn test_settings_roundtrip_through_toml() {
    let settings = ForgeSettings {
        source_dir: Some(PathBuf::from("/cache/src")),
        include_cmake_configs: Some(true),
        ..Default::default()
    };
    let text = toml::to_string(&settings).unwrap();
    let parsed: ForgeSettings = toml::from_str(&text).unwrap();
    assert_eq!(parsed, settings);
}
