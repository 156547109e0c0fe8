//! Error handling for the dispatcher

use std::error::Error;
use std::fmt;

/// Result type for hook operations
pub type HookResult<T> = Result<T, HookError>;

/// Dispatcher error types
#[derive(Debug)]
pub enum HookError {
    /// No callable or method registered under the target name
    TargetNotFound {
        target: String,
    },

    /// A module-method registration fired with no host module installed
    HostModuleMissing {
        target: String,
    },

    /// Handler raised during execution
    ExecutionFailed {
        handler: String,
        source: Box<dyn Error + Send + Sync>,
    },

    /// Invalid declarative configuration
    InvalidConfiguration(String),

    /// Pattern registration failed to compile
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// Serialization/deserialization error
    SerializationError(serde_json::Error),

    /// IO error
    IoError(std::io::Error),

    /// Custom error raised by handler code
    Custom(String),
}

impl HookError {
    /// Create a target-not-found error
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Create an execution failed error
    pub fn execution_failed(
        handler: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::ExecutionFailed {
            handler: handler.into(),
            source: source.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a custom error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetNotFound { target } => {
                write!(f, "Hook target not found: {}", target)
            }
            Self::HostModuleMissing { target } => {
                write!(f, "No host module installed for method '{}'", target)
            }
            Self::ExecutionFailed { handler, source } => {
                write!(f, "Hook handler '{}' execution failed: {}", handler, source)
            }
            Self::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::InvalidPattern { pattern, source } => {
                write!(f, "Invalid hook pattern '{}': {}", pattern, source)
            }
            Self::SerializationError(e) => write!(f, "Serialization error: {}", e),
            Self::IoError(e) => write!(f, "IO error: {}", e),
            Self::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for HookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ExecutionFailed { source, .. } => {
                Some(source.as_ref() as &(dyn Error + 'static))
            }
            Self::InvalidPattern { source, .. } => Some(source),
            Self::SerializationError(e) => Some(e),
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HookError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error)
    }
}

impl From<std::io::Error> for HookError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error)
    }
}
