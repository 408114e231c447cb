use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Loads a config file; `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    if is_yaml {
        load_config_from_yaml_str(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;
    load_config_from_value(json_value)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_yaml::from_str(content)?;
    load_config_from_value(json_value)
}

fn load_config_from_value(json_value: serde_json::Value) -> Result<Config, ConfigError> {
    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    validate_bitrate(config.download.bitrate)?;

    if !config.catalog.app_secret.is_configured() {
        return Err(ConfigError::Validation {
            message: "catalog.app_secret needs one of: value, file, env".to_string(),
        });
    }
    if !config.catalog.auth_tokens.is_configured() {
        return Err(ConfigError::Validation {
            message: "catalog.auth_tokens needs one of: value, file, env".to_string(),
        });
    }

    Ok(())
}

/// Shared with CLI overrides, which bypass schema validation.
pub fn validate_bitrate(bitrate: Option<u32>) -> Result<(), ConfigError> {
    match bitrate {
        Some(b) if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&b) => {
            Err(ConfigError::InvalidBitrate {
                bitrate: b,
                min: MIN_BITRATE_KBPS,
                max: MAX_BITRATE_KBPS,
            })
        }
        _ => Ok(()),
    }
}
