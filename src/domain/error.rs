//! Domain errors

use std::fmt;

/// Domain-level error types
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Connector not found
    ConnectorNotFound(u32),
    /// Durable write failed
    StorageError(String),
    /// Configuration read/write error
    ConfigError(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectorNotFound(id) => write!(f, "Connector not found: {}", id),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
