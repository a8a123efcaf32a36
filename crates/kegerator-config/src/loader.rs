// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, lowest precedence first:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, KegeratorConfig, LogFormat};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "kegerator.toml";

/// Find the kegerator configuration file
///
/// Search order:
/// 1. `KEGERATOR_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("KEGERATOR_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by KEGERATOR_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet KEGERATOR_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is a separate step, see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<KegeratorConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: KegeratorConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower == "true" || lower == "1" || lower == "yes"
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `KEGERATOR_LOG_LEVEL` -> `logging.level`
/// - `KEGERATOR_LOG_FORMAT` -> `logging.format`
/// - `KEGERATOR_POLL_INTERVAL_MS` -> `sampling.poll_interval_ms`
/// - `KEGERATOR_READ_RETRIES` -> `sampling.read_retries`
/// - `KEGERATOR_ATTACH_RETRIES` -> `sampling.attach_retries`
/// - `KEGERATOR_POUR_HISTORY_LIMIT` -> `pours.history_limit`
/// - `KEGERATOR_METRICS_ENABLED` -> `metrics.enabled`
pub fn apply_environment_overrides(config: &mut KegeratorConfig) {
    if let Ok(value) = env::var("KEGERATOR_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("KEGERATOR_LOG_FORMAT") {
        if let Some(format) = parse_log_format(&value) {
            config.logging.format = format;
        }
    }
    if let Ok(value) = env::var("KEGERATOR_POLL_INTERVAL_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.sampling.poll_interval_ms = ms;
        }
    }
    if let Ok(value) = env::var("KEGERATOR_READ_RETRIES") {
        if let Ok(retries) = value.parse::<u32>() {
            config.sampling.read_retries = retries;
        }
    }
    if let Ok(value) = env::var("KEGERATOR_ATTACH_RETRIES") {
        if let Ok(retries) = value.parse::<u32>() {
            config.sampling.attach_retries = retries;
        }
    }
    if let Ok(value) = env::var("KEGERATOR_POUR_HISTORY_LIMIT") {
        if let Ok(limit) = value.parse::<usize>() {
            config.pours.history_limit = Some(limit);
        }
    }
    if let Ok(value) = env::var("KEGERATOR_METRICS_ENABLED") {
        config.metrics.enabled = parse_bool(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"log_level": "debug", "read_retries": "3"}`)
pub fn apply_cli_overrides(config: &mut KegeratorConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_format") {
        if let Some(format) = parse_log_format(value) {
            config.logging.format = format;
        }
    }
    if let Some(value) = cli_args.get("poll_interval_ms") {
        if let Ok(ms) = value.parse::<u64>() {
            config.sampling.poll_interval_ms = ms;
        }
    }
    if let Some(value) = cli_args.get("read_retries") {
        if let Ok(retries) = value.parse::<u32>() {
            config.sampling.read_retries = retries;
        }
    }
    if let Some(value) = cli_args.get("metrics_enabled") {
        config.metrics.enabled = parse_bool(value);
    }
}
