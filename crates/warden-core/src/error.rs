//! Error taxonomy for the capability proxy layer.
//!
//! Only [`ProxyError`] ever reaches callers. Load and call failures are
//! recovered inside the facade and survive only as [`ErrorDetail`]
//! diagnostics.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Native module absent or incompatible; demotes the handle for the process lifetime
    LoadFailure,
    /// One native call threw or returned unusable data; local to that call
    CallFailure,
    /// Operation name outside the dispatch table
    UnknownOperation,
    /// The fallback itself failed; there is no further degradation path
    FallbackFailure,
    /// The caller's request was rejected before dispatch
    InvalidRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::LoadFailure => "loadFailure",
            ErrorKind::CallFailure => "callFailure",
            ErrorKind::UnknownOperation => "unknownOperation",
            ErrorKind::FallbackFailure => "fallbackFailure",
            ErrorKind::InvalidRequest => "invalidRequest",
        };
        f.write_str(s)
    }
}

/// Diagnostic view of a failure. Never thrown across the facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    pub caused_fallback: bool,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>, caused_fallback: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            caused_fallback,
        }
    }

    pub fn load_failure(err: &LoadError) -> Self {
        Self::new(ErrorKind::LoadFailure, err.to_string(), true)
    }

    pub fn call_failure(err: &CallError) -> Self {
        Self::new(ErrorKind::CallFailure, err.to_string(), true)
    }
}

/// Serialization codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not well-formed JSON
    #[error("Malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Payload is JSON but does not match the expected shape
    #[error("Payload does not match shape of '{operation}': {source}")]
    Shape {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// A request or response enum is not tagged the way the codec expects
    #[error("Value is not an operation-tagged object")]
    NotTagged,

    #[error("Serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Native module failures surfaced by [`NativeModule::call`](crate::NativeModule::call).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NativeError {
    #[error("Native call '{method}' failed: {message}")]
    Failed { method: String, message: String },

    #[error("Native call '{0}' returned null without an error message")]
    NullResult(String),

    #[error("Native method not bound: {0}")]
    MissingMethod(String),

    #[error("Native call '{0}' returned invalid UTF-8")]
    InvalidUtf8(String),

    #[error("Payload for '{0}' contains an interior NUL byte")]
    InvalidPayload(String),
}

/// Reasons a native capability could not be activated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Native acceleration disabled: {0}")]
    Disabled(String),

    #[error("Native library not found: {0}")]
    NotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Incompatible ABI: expected {expected}, got {got}")]
    IncompatibleAbi { expected: u32, got: u32 },

    #[error("Domain mismatch: expected '{expected}', library provides '{got}'")]
    DomainMismatch { expected: String, got: String },

    #[error("Invalid native version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid init configuration: {0}")]
    InvalidConfig(String),

    #[error("Native self-check failed: {0}")]
    SelfCheckFailed(String),

    #[error("Loader panicked: {0}")]
    Panicked(String),
}

/// Failure of a single native invocation. Always recovered by fallback.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Encode failed: {0}")]
    Encode(#[source] CodecError),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error("Native call panicked: {0}")]
    Panicked(String),

    #[error("Native call exceeded {0:?}")]
    TimedOut(Duration),

    #[error("Decode failed: {0}")]
    Decode(#[source] CodecError),

    #[error("Response failed validation: {0}")]
    InvalidResponse(String),
}

/// Failure inside a fallback function.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FallbackError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Fallback bound to '{expected}' received a different request")]
    Mismatch { expected: &'static str },

    #[error("Fallback failed: {0}")]
    Failed(String),
}

/// Dispatch table construction errors. These are startup failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Operation '{operation}' of '{domain}' has no route")]
    Unbound { domain: String, operation: String },

    #[error("Operation '{operation}' of '{domain}' is bound twice")]
    Duplicate { domain: String, operation: String },

    #[error("Native method '{method}' of '{domain}' is not a valid symbol name")]
    InvalidMethod { domain: String, method: String },

    #[error("Native method '{method}' of '{domain}' is bound to more than one operation")]
    DuplicateMethod { domain: String, method: String },
}

/// Errors surfaced to facade callers.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Unknown operation '{operation}' for capability '{domain}'")]
    UnknownOperation { domain: String, operation: String },

    #[error("Invalid request for '{domain}.{operation}': {reason}")]
    InvalidRequest {
        domain: String,
        operation: String,
        reason: String,
    },

    #[error("Fallback for '{domain}.{operation}' failed: {source}")]
    FallbackFailure {
        domain: String,
        operation: String,
        #[source]
        source: FallbackError,
    },

    #[error("Response for '{domain}.{operation}' has an unexpected shape")]
    ResponseMismatch { domain: String, operation: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ProxyError {
    /// Diagnostic kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            ProxyError::InvalidRequest { .. } | ProxyError::Codec(_) => ErrorKind::InvalidRequest,
            ProxyError::FallbackFailure { .. } | ProxyError::ResponseMismatch { .. } => {
                ErrorKind::FallbackFailure
            }
        }
    }
}

/// Result type for facade calls.
pub type Result<T> = std::result::Result<T, ProxyError>;
