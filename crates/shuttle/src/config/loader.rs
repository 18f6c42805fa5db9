use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::locale::code::Locale;

/// Loads a config file, choosing the parser from the extension
/// (`.yaml`/`.yml` for YAML, anything else JSON).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        load_config_from_yaml(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_yaml(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.jobs.materialize_chunk_size == 0 {
        return Err(ConfigError::Validation {
            message: "jobs.materialize_chunk_size must be at least 1".to_string(),
        });
    }

    let threshold = config.locales.fuzzy_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::Validation {
            message: format!("locales.fuzzy_threshold must be in (0, 1], got {}", threshold),
        });
    }

    for (locale, fallbacks) in &config.locales.fallbacks {
        for code in std::iter::once(locale).chain(fallbacks) {
            Locale::parse(code).map_err(|e| ConfigError::Validation {
                message: format!("locales.fallbacks: {}", e),
            })?;
        }
        if fallbacks.contains(locale) {
            return Err(ConfigError::Validation {
                message: format!("locales.fallbacks: '{}' falls back to itself", locale),
            });
        }
    }

    if config.notifications.broadcast_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "notifications.broadcast_capacity must be at least 1".to_string(),
        });
    }

    Ok(())
}
