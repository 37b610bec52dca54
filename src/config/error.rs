//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid timeout")]
    InvalidTimeout,

    #[error("Invalid broker address: {0}")]
    InvalidBrokerAddress(String),

    #[error("Partition count must be at least 1")]
    InvalidPartitionCount,

    #[error("Maximum message size must be greater than zero")]
    InvalidMessageSize,

    #[error("Database index must not be negative")]
    InvalidDatabaseIndex,

    #[error("Scan settings must be greater than zero")]
    InvalidScanSettings,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
