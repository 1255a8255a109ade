//! Error types for database adapters.

use thiserror::Error;

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors raised by connections, adapters and the adapter factory.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The driver is unknown, disabled, or does not match the live connection.
    #[error("Unsupported driver '{driver}': {reason}")]
    UnsupportedDriver {
        /// Driver identifier reported by the connection.
        driver: String,
        /// Why the driver was rejected.
        reason: String,
    },

    /// An introspection query failed.
    #[error("Introspection of {target} failed: {message}")]
    Introspection {
        /// What was being introspected (a table name or `"database"`).
        target: String,
        /// Underlying driver message.
        message: String,
    },

    /// A statement failed to execute.
    #[error("Execution failed: {message} (sql: {sql})")]
    Execution {
        /// The statement that failed.
        sql: String,
        /// Underlying driver message.
        message: String,
    },

    /// The connection is unavailable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid adapter or driver configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Create an unsupported driver error.
    pub fn unsupported_driver(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedDriver {
            driver: driver.into(),
            reason: reason.into(),
        }
    }

    /// Create an introspection error.
    pub fn introspection(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Introspection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create an execution error.
    pub fn execution(sql: impl Into<String>, message: impl ToString) -> Self {
        Self::Execution {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Re-label any error as an introspection failure of `target`.
    ///
    /// Introspection errors keep their original target.
    pub fn into_introspection(self, target: &str) -> Self {
        match self {
            Self::Introspection { .. } => self,
            Self::Execution { message, .. } => Self::introspection(target, message),
            other => Self::introspection(target, other),
        }
    }

    /// The driver message carried by this error.
    pub fn message(&self) -> String {
        match self {
            Self::Introspection { message, .. } | Self::Execution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if this error is an introspection failure.
    pub fn is_introspection(&self) -> bool {
        matches!(self, Self::Introspection { .. })
    }

    /// Check if this error rejected the driver.
    pub fn is_unsupported_driver(&self) -> bool {
        matches!(self, Self::UnsupportedDriver { .. })
    }
}
