use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::fields::FieldTable;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be greater than 0".to_string(),
        });
    }

    if config.ocr.dpi == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.dpi must be greater than 0".to_string(),
        });
    }

    if let Some(cloud) = &config.ocr.cloud {
        if cloud.api_key.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "ocr.cloud.api_key must not be empty".to_string(),
            });
        }
        if cloud.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "ocr.cloud.timeout_ms must be greater than 0".to_string(),
            });
        }
    }

    if let Some(fields) = &config.fields {
        FieldTable::new(fields.clone()).validate()?;
    }

    Ok(())
}
