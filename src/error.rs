//! Error types for the stack set reconciliation system.
//!
//! The hierarchy mirrors the lifecycle of a run: configuration loading,
//! calls against the provisioning API, and the reconciliation driver.
//! Provisioning errors are deliberately coarse: callers only ever need to
//! tell a missing resource from a throttled request from everything else.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the reconciliation system.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provisioning API errors.
    #[error("Provisioning API error: {0}")]
    Provisioner(#[from] ProvisionerError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The template directory does not exist or is not a directory.
    #[error("Template directory not found: {path}")]
    TemplateDirNotFound {
        /// Path that was searched.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required setting was not supplied.
    #[error("Missing required setting: {name}")]
    MissingSetting {
        /// Name of the setting (environment variable or flag).
        name: String,
    },

    /// Two templates resolve to the same unit name.
    #[error("Duplicate unit name '{name}' from templates {first} and {second}")]
    DuplicateUnit {
        /// The duplicated unit name.
        name: String,
        /// First template file.
        first: String,
        /// Second template file.
        second: String,
    },
}

/// Errors returned by the provisioning API.
///
/// Every backend classifies its failures into one of these three outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionerError {
    /// The addressed unit or operation does not exist.
    #[error("{operation}: not found: {message}")]
    NotFound {
        /// API operation that failed.
        operation: String,
        /// Message from the provider.
        message: String,
    },

    /// The request exceeded the provider's rate limit.
    #[error("{operation}: throttled: {message}")]
    Throttled {
        /// API operation that was throttled.
        operation: String,
        /// Message from the provider.
        message: String,
    },

    /// Any other failure.
    #[error("{operation}: {message}")]
    Other {
        /// API operation that failed.
        operation: String,
        /// Message from the provider.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The provider reported a unit status this system cannot act on.
    #[error("Unit '{unit}' is in unexpected status {status}")]
    UnexpectedUnitStatus {
        /// Unit name.
        unit: String,
        /// Reported status.
        status: String,
    },
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for raw provisioning API calls.
pub type ApiResult<T> = std::result::Result<T, ProvisionerError>;

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-setting error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingSetting { name: name.into() }
    }
}

impl ProvisionerError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a throttling error.
    #[must_use]
    pub fn throttled(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Throttled {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an unclassified error.
    #[must_use]
    pub fn other(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns true if the provider rejected the call for rate limiting.
    #[must_use]
    pub const fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// Returns true if the addressed resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
