//! Error types shared across the client.
//!
//! Errors cross the API boundary as [`ErrorInfo`] records carrying a numeric
//! code and a human-readable message, matching the wire format of error
//! payloads inside protocol messages. [`WavelinkError`] classifies them for
//! callers that want to match on the failure category.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known error codes.
///
/// 40160 and 90000 are wire-level codes the server also uses; the 800xx and
/// 90007 codes are synthesized client-side.
pub mod codes {
    /// Channel operation forbidden by the token's capability grants.
    pub const CAPABILITY_DENIED: u32 = 40160;
    /// Generic protocol or transport error.
    pub const PROTOCOL_ERROR: u32 = 90000;
    /// No confirmation arrived within the configured attach timeout.
    pub const ATTACH_TIMEOUT: u32 = 90007;
    /// Operation rejected because of the current connection state.
    pub const BAD_CONNECTION_STATE: u32 = 80002;
    /// Connection dropped before an in-flight operation was acknowledged.
    pub const CONNECTION_LOST: u32 = 80003;
}

/// A numeric error code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Capability/permission error (code 40160).
    pub fn capability_denied(message: impl Into<String>) -> Self {
        Self::new(codes::CAPABILITY_DENIED, message)
    }

    /// Generic protocol error (code 90000).
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(codes::PROTOCOL_ERROR, message)
    }

    /// Attach timeout error (code 90007).
    pub fn attach_timeout(message: impl Into<String>) -> Self {
        Self::new(codes::ATTACH_TIMEOUT, message)
    }

    /// Connection-state rejection (code 80002).
    pub fn bad_connection_state(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_CONNECTION_STATE, message)
    }

    /// Connection-lost error (code 80003).
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(codes::CONNECTION_LOST, message)
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Classified client errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WavelinkError {
    /// Insufficient permission for the attempted operation.
    #[error("capability error: {0}")]
    Capability(ErrorInfo),

    /// Malformed or unexpected message from the transport.
    #[error("protocol error: {0}")]
    Protocol(ErrorInfo),

    /// No confirmation within the configured bound.
    #[error("timeout: {0}")]
    Timeout(ErrorInfo),

    /// The connection dropped before an in-flight operation completed.
    #[error("connection lost: {0}")]
    ConnectionLost(ErrorInfo),

    /// Operation rejected because of the current connection state.
    #[error("invalid connection state: {0}")]
    ConnectivityState(ErrorInfo),
}

impl WavelinkError {
    /// The underlying code-bearing error record.
    pub fn error_info(&self) -> &ErrorInfo {
        match self {
            WavelinkError::Capability(e)
            | WavelinkError::Protocol(e)
            | WavelinkError::Timeout(e)
            | WavelinkError::ConnectionLost(e)
            | WavelinkError::ConnectivityState(e) => e,
        }
    }
}
