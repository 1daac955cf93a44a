//! Error types for the CFHD codec engine.
//!
//! Every public entry point in the workspace returns [`Result`]. Each [`Error`]
//! maps onto one of the public [`ErrorCode`] values through [`Error::code`].

use crate::format::PixelFormat;
use thiserror::Error;

/// Public error codes reported at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ErrorCode {
    Okay = 0,
    InvalidArgument = 1,
    OutOfMemory = 2,
    BadSample = 3,
    BadFormat = 4,
    DecodeBufferSize = 5,
    MetadataEnd = 6,
    Unexpected = 7,
    Internal = 8,
}

impl ErrorCode {
    /// Numeric value of the code.
    pub fn value(self) -> u32 {
        self as u32
    }
}

/// Main error type for the codec engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument: empty buffers, zero sizes, out-of-range selectors.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation could not be satisfied.
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory { size: usize },

    /// The compressed sample is unparsable or missing required fields.
    #[error("Bad sample: {0}")]
    BadSample(String),

    /// Malformed or inconsistent format description.
    #[error("Bad format: {0}")]
    BadFormat(String),

    /// The requested pixel format is not offered for this sample or encoder.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(PixelFormat),

    /// The caller's output buffer cannot hold the decoded image.
    #[error("Decode buffer too small: need {needed} bytes, have {available}")]
    DecodeBufferSize { needed: usize, available: usize },

    /// No more metadata records.
    #[error("End of metadata")]
    MetadataEnd,

    /// Operation attempted on a session after `close`.
    #[error("Session used after close")]
    SessionClosed,

    /// Operation not valid in the current lifecycle state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Non-blocking submit on a full job queue.
    #[error("Encoder pool queue full ({capacity} jobs)")]
    PoolFull { capacity: usize },

    /// The pool was stopped, or nothing is left to wait for.
    #[error("Encoder pool stopped")]
    PoolStopped,

    /// A pooled encode job failed.
    #[error("Encoding frame {frame_number} failed: {source}")]
    Encode {
        frame_number: u64,
        #[source]
        source: Box<Error>,
    },

    /// Unexpected condition that is not the caller's fault.
    #[error("Unexpected: {0}")]
    Unexpected(String),

    /// Internal failure inside the transform or the engine.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a bad sample error.
    pub fn bad_sample(msg: impl Into<String>) -> Self {
        Error::BadSample(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Public code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) | Error::SessionClosed => ErrorCode::InvalidArgument,
            Error::OutOfMemory { .. } | Error::PoolFull { .. } => ErrorCode::OutOfMemory,
            Error::BadSample(_) => ErrorCode::BadSample,
            Error::BadFormat(_) | Error::UnsupportedFormat(_) => ErrorCode::BadFormat,
            Error::DecodeBufferSize { .. } => ErrorCode::DecodeBufferSize,
            Error::MetadataEnd => ErrorCode::MetadataEnd,
            Error::InvalidState { .. } | Error::PoolStopped | Error::Unexpected(_) => {
                ErrorCode::Unexpected
            }
            Error::Encode { source, .. } => source.code(),
            Error::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Check if this is the end-of-metadata sentinel.
    #[must_use]
    pub fn is_metadata_end(&self) -> bool {
        matches!(self, Error::MetadataEnd)
    }
}
