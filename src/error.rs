use std::fmt;

use thiserror::Error;

use crate::native::{NativeClient, StatusCode};

/// Errors surfaced by the driver.
///
/// Native failures carry the code reported by the client library plus the
/// message it left on the connection handle. Everything else is raised by the
/// driver itself before (or instead of) crossing into the native client.
#[derive(Debug, Error)]
pub enum NuoDbError {
    /// Operation on a handle that was never opened or was already released.
    #[error("nuodb: uninitialized connection")]
    Uninitialized,

    /// Operation on a connection that was explicitly closed.
    #[error("nuodb: connection is closed")]
    Closed,

    /// A boundary call reported a non-zero status.
    #[error("nuodb: {message}")]
    Native { code: ErrorCode, message: String },

    /// The caller's deadline elapsed (or it was cancelled) before the call.
    #[error("nuodb: {0}")]
    Cancelled(Cancellation),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl NuoDbError {
    /// Native error code, if this error came from the client library.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            NuoDbError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NuoDbError::Cancelled(_))
    }
}

/// Why an operation was refused before reaching the native client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancellation::DeadlineExceeded => f.write_str("context deadline exceeded"),
            Cancellation::Cancelled => f.write_str("context canceled"),
        }
    }
}

/// SQL error code reported by NuoDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// Short symbolic name for the code; `UNKNOWN_ERROR` when unmapped.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            -1 => "SYNTAX_ERROR",
            -2 => "FEATURE_NOT_YET_IMPLEMENTED",
            -3 => "BUG_CHECK",
            -4 => "COMPILE_ERROR",
            -5 => "RUNTIME_ERROR",
            -6 => "OCS_ERROR",
            -7 => "NETWORK_ERROR",
            -8 => "CONVERSION_ERROR",
            -9 => "TRUNCATION_ERROR",
            -10 => "CONNECTION_ERROR",
            -11 => "DDL_ERROR",
            -12 => "APPLICATION_ERROR",
            -13 => "SECURITY_ERROR",
            -14 => "DATABASE_CORRUPTION",
            -15 => "VERSION_ERROR",
            -16 => "LICENSE_ERROR",
            -17 => "INTERNAL_ERROR",
            -18 => "DEBUG_ERROR",
            -19 => "LOST_BLOB",
            -20 => "INCONSISTENT_BLOB",
            -21 => "DELETED_BLOB",
            -22 => "LOG_ERROR",
            -23 => "DATABASE_DAMAGED",
            -24 => "UPDATE_CONFLICT",
            -25 => "NO_SUCH_TABLE",
            -26 => "INDEX_OVERFLOW",
            -27 => "UNIQUE_DUPLICATE",
            -29 => "DEADLOCK",
            -30 => "OUT_OF_MEMORY_ERROR",
            -31 => "OUT_OF_RECORD_MEMORY_ERROR",
            -32 => "LOCK_TIMEOUT",
            -36 => "PLATFORM_ERROR",
            -37 => "NO_SCHEMA",
            -38 => "CONFIGURATION_ERROR",
            -39 => "READ_ONLY_ERROR",
            -40 => "NO_GENERATED_KEYS",
            -41 => "THROWN_EXCEPTION",
            -42 => "INVALID_TRANSACTION_ISOLATION",
            -43 => "UNSUPPORTED_TRANSACTION_ISOLATION",
            -44 => "INVALID_UTF8",
            -45 => "CONSTRAINT_ERROR",
            -46 => "UPDATE_ERROR",
            -47 => "I18N_ERROR",
            -48 => "OPERATION_KILLED",
            -49 => "INVALID_STATEMENT",
            -50 => "IS_SHUTDOWN",
            -51 => "IN_QUOTED_STRING",
            -52 => "BATCH_UPDATE_ERROR",
            -53 => "JAVA_ERROR",
            -54 => "INVALID_FIELD",
            -55 => "INVALID_INDEX_NULL",
            -56 => "INVALID_OPERATION",
            -57 => "INVALID_STATISTICS",
            -58 => "INVALID_GENERATOR",
            -59 => "OPERATION_TIMEOUT",
            -60 => "NO_SUCH_INDEX",
            -61 => "NO_SUCH_SEQUENCE",
            -62 => "XAER_PROTO",
            _ => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<StatusCode> for ErrorCode {
    fn from(status: StatusCode) -> Self {
        ErrorCode(status.get())
    }
}

/// Build the structured error for a failed boundary call, pulling the
/// message the client library left on the handle.
pub(crate) fn native_error(client: &dyn NativeClient, status: StatusCode) -> NuoDbError {
    NuoDbError::Native {
        code: status.into(),
        message: client.last_error(),
    }
}
