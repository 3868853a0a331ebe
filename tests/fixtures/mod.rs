//! Shared fixtures for integration tests
//!
//! `fixtures/config_dir` is a complete config directory with a
//! `config.toml` holding two datastores.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use wrestic::Config;

/// Config directory fixture
pub fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/config_dir")
}

/// Path to the fixture config file
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load the fixture config
pub fn load() -> Config {
    Config::load(&config_path()).expect("Failed to load fixture config")
}

/// Convert string literals to owned strings
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
