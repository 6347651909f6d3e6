use thiserror::Error;

use crate::codec::CodecError;

/// Stable, machine-readable error class reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAddress,
    InvalidRequest,
    NotFound,
    Duplicate,
    Unauthorized,
    InsufficientSamples,
    EmptyInput,
    IndexDrift,
    DispatchFailed,
    Genesis,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAddress => "INVALID_ADDRESS",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Duplicate => "DUPLICATE",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::InsufficientSamples => "INSUFFICIENT_SAMPLES",
            ErrorKind::EmptyInput => "EMPTY_INPUT",
            ErrorKind::IndexDrift => "INDEX_DRIFT",
            ErrorKind::DispatchFailed => "DISPATCH_FAILED",
            ErrorKind::Genesis => "GENESIS",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("{what} {id} already set")]
    Duplicate { what: &'static str, id: String },

    #[error("{principal} is not the creator of {what} {id}")]
    Unauthorized {
        what: &'static str,
        id: String,
        principal: String,
    },

    #[error("imo {imo}: {found} observations in window, need at least {required}")]
    InsufficientSamples {
        imo: String,
        found: usize,
        required: u32,
    },

    #[error("cannot compute {0} of an empty observation set")]
    EmptyInput(&'static str),

    #[error("index entry {0} has no observation")]
    IndexDrift(String),

    #[error("dispatch of report {id} on channel {channel} failed: {reason}")]
    DispatchFailed {
        id: String,
        channel: String,
        reason: String,
    },

    #[error("invalid genesis state: {0}")]
    Genesis(String),

    #[error("corrupt stored record: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OracleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OracleError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            OracleError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            OracleError::NotFound { .. } => ErrorKind::NotFound,
            OracleError::Duplicate { .. } => ErrorKind::Duplicate,
            OracleError::Unauthorized { .. } => ErrorKind::Unauthorized,
            OracleError::InsufficientSamples { .. } => ErrorKind::InsufficientSamples,
            OracleError::EmptyInput(_) => ErrorKind::EmptyInput,
            OracleError::IndexDrift(_) => ErrorKind::IndexDrift,
            OracleError::DispatchFailed { .. } => ErrorKind::DispatchFailed,
            OracleError::Genesis(_) => ErrorKind::Genesis,
            OracleError::Codec(_) | OracleError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
