//! Configuration module for the Beacon realtime gateway
//!
//! This module provides centralized configuration loading, validation, and
//! Data Transfer Objects (DTOs) for the gateway server.
//!
//! # Architecture
//!
//! 1. **Single Source of Truth**: All configuration is loaded once at startup
//! 2. **Fail Fast**: Errors are reported immediately, no silent fallbacks
//! 3. **DTO Pattern**: Configuration is immutable and passed via dependency injection
//! 4. **Env File Priority**: `.env` file > environment variables > error
//!
//! # Usage
//!
//! ```ignore
//! use beacon_shared::config::ConfigLoader;
//! use std::path::PathBuf;
//!
//! let loader = ConfigLoader::new(Some(PathBuf::from(".env")));
//! let config = loader.load_server_config()?;
//! println!("Listening on {}", config.http.bind_address);
//! ```
//!
//! # Environment Variables
//!
//! ## Required Variables
//!
//! - `BEACON_DATABASE_URL` (or `DATABASE_URL`): PostgreSQL connection string
//! - `BEACON_JWT_SECRET`: Secret used to validate staff bearer tokens
//!
//! ## Optional Variables
//!
//! - `BEACON_DB_POOL_SIZE`: Database pool size (default: 10)
//! - `BEACON_HTTP_ADDR`: HTTP/WebSocket bind address (default: "0.0.0.0:8080")
//! - `BEACON_REALTIME_ENABLED`: "true"/"false" (default: true)
//! - `BEACON_REALTIME_CHANNEL`: LISTEN/NOTIFY channel (default: "beacon_realtime")
//! - `BEACON_REALTIME_CLEANUP_INTERVAL_SECS`: Retention sweep period (default: 600)
//! - `BEACON_REALTIME_RETENTION_HOURS`: Retention window (default: 72)
//! - `BEACON_JWT_ISSUER`: Expected token issuer (default: none)
//! - `BEACON_LOG_LEVEL`: Log level (default: "info")

pub mod dto;
pub mod error;
pub mod loader;
pub mod validator;

pub use dto::{
    AuthConfig, DatabaseConfig, HttpServerConfig, LoggingConfig, MAX_RETENTION_HOURS, RealtimeConfig,
    ServerConfigDto,
};
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use validator::{validate_database_url, validate_realtime_config, validate_server_config};
