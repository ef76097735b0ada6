//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply per-service `<NAME>_HOST`, `<NAME>_GRPC_PORT` and `<NAME>_HTTP_PORT`
/// overrides.
///
/// `NAME` is the upper-cased service name with `-` replaced by `_`
/// (`AI_KERNEL_HOST`). The literal upper-cased form (`AI-KERNEL_HOST`) is
/// accepted as a fallback.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for service in &mut config.services {
        let name = service.name.clone();
        let find = |suffix: &str| -> Option<(String, String)> {
            env_names(&name, suffix)
                .into_iter()
                .find_map(|var| lookup(&var).map(|value| (var, value)))
        };

        if let Some((var, host)) = find("HOST") {
            tracing::debug!(service = %name, var = %var, host = %host, "Host override");
            service.host = Some(host);
        }
        if let Some((var, value)) = find("GRPC_PORT") {
            service.grpc_port = Some(parse_port(&var, &value)?);
        }
        if let Some((var, value)) = find("HTTP_PORT") {
            service.http_port = Some(parse_port(&var, &value)?);
        }
    }
    Ok(())
}

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    apply_env_overrides(config, |var| std::env::var(var).ok())
}

fn env_names(service: &str, suffix: &str) -> Vec<String> {
    let upper = service.to_uppercase();
    let normalized = upper.replace('-', "_");
    if normalized == upper {
        vec![format!("{upper}_{suffix}")]
    } else {
        vec![format!("{normalized}_{suffix}"), format!("{upper}_{suffix}")]
    }
}

fn parse_port(var: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}
