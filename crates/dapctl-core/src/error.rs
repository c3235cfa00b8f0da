//! Error types for the dapctl domain

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Error Codes - Machine-readable codes for callers
// ============================================================================

/// Machine-readable error codes.
///
/// Error code ranges:
/// - 1xxx: Launch configuration lookup errors
/// - 2xxx: Debugger / session errors
/// - 3xxx: Config errors
/// - 5xxx: Infrastructure errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
pub enum ErrorCode {
    // Lookup errors (1xxx)
    /// Launch configuration not found (1001)
    ConfigurationNotFound = 1001,
    /// More than one launch configuration matches (1002)
    ConfigurationAmbiguous = 1002,
    /// Compound references itself (1003)
    CompoundCycle = 1003,
    /// Compound without a configurations list (1004)
    CompoundInvalid = 1004,
    /// Dynamic configuration could not be refetched (1005)
    DynamicConfigurationMissing = 1005,

    // Debugger errors (2xxx)
    /// No debugger registered for the configuration type (2001)
    DebuggerNotSupported = 2001,
    /// Adapter or protocol failure (2002)
    AdapterError = 2002,
    /// Unknown session id (2003)
    SessionNotFound = 2003,

    // Config errors (3xxx)
    /// Invalid configuration (3001)
    ConfigInvalid = 3001,

    // Infrastructure errors (5xxx)
    /// Task service failure (5001)
    TaskError = 5001,
    /// Key-value storage failure (5002)
    StorageError = 5002,
    /// I/O error (5003)
    IoError = 5003,
    /// Serialization error (5004)
    SerializationError = 5004,
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl ErrorCode {
    /// Get the numeric value of the error code
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the error code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationNotFound => "CONFIGURATION_NOT_FOUND",
            ErrorCode::ConfigurationAmbiguous => "CONFIGURATION_AMBIGUOUS",
            ErrorCode::CompoundCycle => "COMPOUND_CYCLE",
            ErrorCode::CompoundInvalid => "COMPOUND_INVALID",
            ErrorCode::DynamicConfigurationMissing => "DYNAMIC_CONFIGURATION_MISSING",
            ErrorCode::DebuggerNotSupported => "DEBUGGER_NOT_SUPPORTED",
            ErrorCode::AdapterError => "ADAPTER_ERROR",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::ConfigInvalid => "CONFIG_INVALID",
            ErrorCode::TaskError => "TASK_ERROR",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

// ============================================================================
// Error
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No configuration or compound with this name in the searched roots
    #[error("Could not find launch configuration '{0}' in the workspace.")]
    ConfigurationNotFound(String),

    /// A compound member name matches configurations in several roots
    #[error("There are multiple launch configurations '{0}' in the workspace. Use folder name to qualify the configuration.")]
    AmbiguousConfiguration(String),

    /// A compound lists itself as a member
    #[error("Launch configuration '{0}' contains a cycle with itself")]
    CompoundCycle(String),

    /// A compound without a `configurations` list (carries the compound name)
    #[error("Compound must have \"configurations\" attribute set in order to start multiple configurations.")]
    CompoundWithoutConfigurations(String),

    #[error("Dynamic configuration '{provider_type}:{name}' is missing or not applicable")]
    DynamicConfigurationMissing { provider_type: String, name: String },

    /// The debug service has no contribution for this configuration type
    #[error("The debug session type \"{0}\" is not supported.")]
    DebuggerNotSupported(String),

    #[error("Debug adapter error: {0}")]
    Adapter(String),

    #[error("Debug session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Machine-readable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigurationNotFound(_) => ErrorCode::ConfigurationNotFound,
            Error::AmbiguousConfiguration(_) => ErrorCode::ConfigurationAmbiguous,
            Error::CompoundCycle(_) => ErrorCode::CompoundCycle,
            Error::CompoundWithoutConfigurations(_) => ErrorCode::CompoundInvalid,
            Error::DynamicConfigurationMissing { .. } => ErrorCode::DynamicConfigurationMissing,
            Error::DebuggerNotSupported(_) => ErrorCode::DebuggerNotSupported,
            Error::Adapter(_) => ErrorCode::AdapterError,
            Error::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Error::InvalidConfig(_) => ErrorCode::ConfigInvalid,
            Error::Task(_) => ErrorCode::TaskError,
            Error::Storage(_) => ErrorCode::StorageError,
            Error::Io(_) => ErrorCode::IoError,
            Error::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Errors caused by the contents of the user's launch configuration.
    ///
    /// These are reported to the user and never retried.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationNotFound(_)
                | Error::AmbiguousConfiguration(_)
                | Error::CompoundCycle(_)
                | Error::CompoundWithoutConfigurations(_)
                | Error::DynamicConfigurationMissing { .. }
        )
    }

    /// Helper to create an adapter error from anything displayable
    pub fn adapter(err: impl std::fmt::Display) -> Self {
        Error::Adapter(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_messages() {
        assert_eq!(
            Error::ConfigurationNotFound("Launch".into()).to_string(),
            "Could not find launch configuration 'Launch' in the workspace."
        );
        assert_eq!(
            Error::CompoundCycle("All".into()).to_string(),
            "Launch configuration 'All' contains a cycle with itself"
        );
        assert_eq!(
            Error::DynamicConfigurationMissing {
                provider_type: "node".into(),
                name: "Run Script".into()
            }
            .to_string(),
            "Dynamic configuration 'node:Run Script' is missing or not applicable"
        );
    }

    #[test]
    fn test_not_supported_carries_type() {
        let err = Error::DebuggerNotSupported("cppdbg".into());
        assert_eq!(
            err.to_string(),
            "The debug session type \"cppdbg\" is not supported."
        );
        assert_eq!(err.code(), ErrorCode::DebuggerNotSupported);
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_error_code_ranges() {
        assert_eq!(ErrorCode::ConfigurationNotFound.as_u16(), 1001);
        assert_eq!(ErrorCode::DebuggerNotSupported.as_u16(), 2001);
        assert_eq!(ErrorCode::StorageError.name(), "STORAGE_ERROR");
        assert!(Error::AmbiguousConfiguration("x".into()).is_user_error());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = json_err.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
