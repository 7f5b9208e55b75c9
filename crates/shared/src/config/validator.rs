//! Configuration validation
//!
//! This module provides validation logic for configuration DTOs.

use super::dto::{MAX_RETENTION_HOURS, RealtimeConfig, ServerConfigDto};
use super::error::{ConfigError, Result};

/// Validate a database URL format
///
/// Accepts `postgres://` and `postgresql://` URLs, with or without
/// credentials, and Unix socket URLs (`postgresql:///db`). Network URLs must
/// carry a numeric port.
pub fn validate_database_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ConfigError::InvalidDatabaseUrl(
            "Database URL cannot be empty".to_string(),
        ));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "Database URL must start with postgres:// or postgresql://, got: {}",
            url
        )));
    };
    if scheme != "postgres" && scheme != "postgresql" {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "Database URL must start with postgres:// or postgresql://, got: {}",
            url
        )));
    }

    let host_part = match rest.rsplit_once('@') {
        Some((_, host)) => host,
        None => rest,
    };

    // Unix socket
    if host_part.starts_with('/') {
        return Ok(());
    }

    let authority = host_part.split(['/', '?']).next().unwrap_or_default();
    let Some((_, port)) = authority.rsplit_once(':') else {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "Database URL must include port for network connections, got: {}",
            url
        )));
    };
    if port.parse::<u16>().is_err() {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "Invalid port in database URL: {}",
            port
        )));
    }

    Ok(())
}

/// Validate realtime backplane settings
pub fn validate_realtime_config(config: &RealtimeConfig) -> Result<()> {
    if config.channel.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Realtime channel cannot be empty".to_string(),
        ));
    }
    if !config
        .channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Realtime channel must be a plain identifier, got: {}",
            config.channel
        )));
    }
    if config.cleanup_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "Realtime cleanup interval must be > 0".to_string(),
        ));
    }
    if config.retention_hours == 0 {
        return Err(ConfigError::Validation(
            "Realtime retention must be > 0".to_string(),
        ));
    }
    if config.retention_hours > MAX_RETENTION_HOURS {
        return Err(ConfigError::Validation(format!(
            "Realtime retention must be <= {} hours, got: {}",
            MAX_RETENTION_HOURS, config.retention_hours
        )));
    }
    Ok(())
}

/// Validate the complete server configuration
pub fn validate_server_config(config: &ServerConfigDto) -> Result<()> {
    validate_database_url(&config.database.url)?;

    if config.database.pool_size == 0 {
        return Err(ConfigError::Validation(
            "Database pool size must be > 0".to_string(),
        ));
    }

    if config.http.bind_address.port() == 0 {
        return Err(ConfigError::Validation(
            "Bind address port cannot be 0".to_string(),
        ));
    }

    validate_realtime_config(&config.realtime)?;

    if config.auth.jwt_secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "JWT secret cannot be empty".to_string(),
        ));
    }

    Ok(())
}
