//! Error types for the repository layer
//!
//! A single error enum covers every failure a caller can observe. Not-found
//! conditions on reads are never errors at the repository surface: they are
//! returned as `None` or an empty result. Inside the store contract, a missing
//! record is reported as a [`BackendFault`] with [`BackendStatus::NotFound`] so
//! the repository can translate it.

use thiserror::Error;

/// Result type alias for repository operations
pub type RepoResult<T> = std::result::Result<T, RepoError>;

// =============================================================================
// Backend Faults
// =============================================================================

/// Status class of a fault reported by the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendStatus {
    /// Record or container does not exist
    NotFound,
    /// Record with the same identity already exists
    Conflict,
    /// Optimistic concurrency check failed
    PreconditionFailed,
    /// Request was malformed (bad patch path, bad cursor, missing id)
    BadRequest,
    /// Request rate exceeded
    TooManyRequests,
    /// Store could not be reached
    Unavailable,
    /// Anything else
    Other,
}

impl BackendStatus {
    /// Short lowercase label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::NotFound => "not_found",
            BackendStatus::Conflict => "conflict",
            BackendStatus::PreconditionFailed => "precondition_failed",
            BackendStatus::BadRequest => "bad_request",
            BackendStatus::TooManyRequests => "too_many_requests",
            BackendStatus::Unavailable => "unavailable",
            BackendStatus::Other => "other",
        }
    }
}

/// A fault raised by the document store client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({message})", status.as_str())]
pub struct BackendFault {
    /// Status class
    pub status: BackendStatus,
    /// Store-provided detail
    pub message: String,
}

impl BackendFault {
    /// Create a fault with the given status
    pub fn new(status: BackendStatus, message: impl Into<String>) -> Self {
        BackendFault {
            status,
            message: message.into(),
        }
    }

    /// Create a not-found fault
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendStatus::NotFound, message)
    }
}

// =============================================================================
// RepoError
// =============================================================================

/// Error types for the repository layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepoError {
    /// Fault reported by the document store, propagated without retry
    #[error("backend fault: {0}")]
    Backend(#[from] BackendFault),

    /// Field selector shape cannot be compiled to a wire path
    #[error("cannot compile selector: unsupported {shape}")]
    Compilation {
        /// Description of the offending selector shape
        shape: String,
    },

    /// Patch dialect cannot represent the requested operation
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The same path was set twice in one patch request
    #[error("the path '{path}' has already been set in this patch request")]
    DuplicatePath {
        /// Offending wire path
        path: String,
    },

    /// A patch operation was rendered to a representation it does not support
    #[error("cannot render {from} operation as {to}")]
    Cast {
        /// Native representation of the operation
        from: &'static str,
        /// Requested representation
        to: &'static str,
    },

    /// Startup configuration is missing or inconsistent
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Entity or payload (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Caller supplied an invalid argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Inbound continuation token could not be decoded
    #[error("invalid continuation token: {0}")]
    InvalidContinuationToken(String),

    /// A single-result lookup matched more than one record
    #[error("expected at most one result, found {count}")]
    NotUnique {
        /// Number of matches seen
        count: usize,
    },

    /// Cache collaborator failed
    #[error("cache error: {0}")]
    Cache(String),
}

impl RepoError {
    /// Create a backend fault error
    pub fn backend(status: BackendStatus, message: impl Into<String>) -> Self {
        RepoError::Backend(BackendFault::new(status, message))
    }

    /// Create a compilation error for an unsupported selector shape
    pub fn compilation(shape: impl Into<String>) -> Self {
        RepoError::Compilation {
            shape: shape.into(),
        }
    }

    /// Check whether this is a backend not-found fault
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::Backend(BackendFault {
                status: BackendStatus::NotFound,
                ..
            })
        )
    }

    /// Backend status, if this error came from the store
    pub fn backend_status(&self) -> Option<BackendStatus> {
        match self {
            RepoError::Backend(fault) => Some(fault.status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}
