use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

/// Smallest accepted HMAC key, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime: one year.
pub const MAX_TOKEN_EXPIRE_MINUTES: u64 = 366 * 24 * 60;

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    let config = parse_config(&contents)?;

    info!("Configuration loaded successfully");

    Ok(config)
}

/// Parse and validate a configuration document.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    validate_config(&config)?;

    info!(users = config.users.len(), "Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind.is_empty() {
        return Err(ConfigError::InvalidConfig("bind cannot be empty".into()));
    }

    if config.auth.token_expire_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "token_expire_minutes must be greater than 0".into(),
        ));
    }

    if config.auth.token_expire_minutes > MAX_TOKEN_EXPIRE_MINUTES {
        return Err(ConfigError::InvalidConfig(format!(
            "token_expire_minutes cannot exceed {}",
            MAX_TOKEN_EXPIRE_MINUTES
        )));
    }

    if config.auth.token_refresh_minutes >= config.auth.token_expire_minutes {
        return Err(ConfigError::InvalidConfig(
            "token_refresh_minutes must be smaller than token_expire_minutes".into(),
        ));
    }

    if config.cookie.name.is_empty() {
        return Err(ConfigError::InvalidConfig("cookie name cannot be empty".into()));
    }

    let hash = &config.auth.hash;
    if hash.iterations == 0 || hash.parallelism == 0 || hash.memory_kib < 8 * hash.parallelism {
        return Err(ConfigError::InvalidConfig(
            "hash cost needs iterations >= 1, parallelism >= 1 and memory_kib >= 8 * parallelism"
                .into(),
        ));
    }

    // A missing secret is replaced by a random one at startup; a short one is
    // an operator mistake and is rejected here.
    if let Some(secret) = config.auth.resolved_jwt_secret() {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidConfig(format!(
                "jwt_secret must be at least {} characters long",
                MIN_SECRET_LEN
            )));
        }
    }

    for (name, user) in &config.users {
        if user.password_hash.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "user {} has no password_hash",
                name
            )));
        }
    }

    Ok(())
}
