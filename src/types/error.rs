use anyhow::Error;
use thiserror::Error;

/// Application-level error kinds for rgwbox-rs.
///
/// Fallible operations return `anyhow::Result`; the typed kind is carried
/// inside and recovered with `downcast_ref`.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Cancelled
/// - 1: Credential, transport, service and response errors
/// - 2: InvalidConfig, InvalidArgument
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RgwboxError {
    /// Credentials could not be resolved, or they are empty.
    #[error("credential error: {0}")]
    Credential(String),

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-2xx status.
    #[error("service error: {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation cancelled")]
    Cancelled,

    /// One or more buckets of a sweep failed to drain.
    #[error("failed to drain buckets: {}", .0.join(", "))]
    SweepFailed(Vec<String>),
}

impl RgwboxError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RgwboxError::Cancelled => 0,
            RgwboxError::InvalidConfig(_) | RgwboxError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }

    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        RgwboxError::Service {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<RgwboxError>() {
        return *err == RgwboxError::Cancelled;
    }
    false
}

/// Credential errors are never swallowed by the drain workers.
pub fn is_credential_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<RgwboxError>(),
        Some(RgwboxError::Credential(_))
    )
}

/// HTTP status of a service error, if `e` is one.
pub fn service_error_status(e: &Error) -> Option<u16> {
    match e.downcast_ref::<RgwboxError>() {
        Some(RgwboxError::Service { status, .. }) => Some(*status),
        _ => None,
    }
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<RgwboxError>() {
        return err.exit_code();
    }
    1
}
