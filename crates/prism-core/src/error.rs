//! Error types for the Prism mirroring engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrismError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Discovery error for module {module}: {message}")]
    DiscoveryError { module: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Signing error: {message}")]
    SigningError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PrismError {
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn discovery_error(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryError {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn signing_error(message: impl Into<String>) -> Self {
        Self::SigningError {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure only invalidates a single frontend/backend pairing.
    ///
    /// Every other kind aborts the generation or publish it occurred in.
    pub fn is_pairing_recoverable(&self) -> bool {
        matches!(self, Self::DiscoveryError { .. })
    }
}

pub type Result<T> = std::result::Result<T, PrismError>;
