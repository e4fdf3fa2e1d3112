//! Error types for the XtreemFS client core

use thiserror::Error;

use crate::policy::StripingPolicyType;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while translating I/O or enumerating directories
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument passed by the caller (alignment, sizes, bitsets)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Striping Errors
    // =========================================================================
    /// Invalid striping policy
    #[error("Invalid striping policy: {0}")]
    InvalidPolicy(String),

    /// No translator is registered for the policy type
    #[error("No stripe translator registered for policy type: {0}")]
    UnknownPolicyType(StripingPolicyType),

    /// A read failed on a layout without redundancy
    #[error("Object {object_number} on OSD slot {osd_offset} could not be read")]
    ObjectUnavailable { object_number: u64, osd_offset: usize },

    // =========================================================================
    // Erasure Coding Errors
    // =========================================================================
    /// EC encoding failed
    #[error("EC encoding failed: {0}")]
    EcEncodingFailed(String),

    /// EC reconstruction failed
    #[error("EC reconstruction failed: {0}")]
    EcReconstructionFailed(String),

    /// Invalid EC configuration
    #[error("Invalid EC configuration: {0}")]
    InvalidEcConfig(String),

    /// Insufficient shards for reconstruction
    #[error("Insufficient shards for reconstruction: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    /// A line lost more stripes than it has parity
    #[error("Line {line} is unrecoverable: {erasures} erasures exceed parity width {parity_width}")]
    TooManyErasures {
        line: u64,
        erasures: usize,
        parity_width: usize,
    },

    // =========================================================================
    // Collaborator / Directory Errors
    // =========================================================================
    /// POSIX error reported by the metadata or object servers
    #[error("POSIX error {errno}: {message}")]
    Posix { errno: i32, message: String },

    /// readdir/releasedir on a handle that was never opened
    #[error("Directory handle {0} is not open")]
    UnknownDirectoryHandle(u64),
}

impl Error {
    /// Build a POSIX error from an errno value.
    pub fn posix(errno: i32, message: impl Into<String>) -> Self {
        Error::Posix {
            errno,
            message: message.into(),
        }
    }

    /// The errno an OS adapter should report for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::Posix { errno, .. } => *errno,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            Error::InvalidArgument(_) | Error::InvalidPolicy(_) | Error::InvalidEcConfig(_) => {
                libc::EINVAL
            }
            Error::UnknownDirectoryHandle(_) => libc::EBADF,
            _ => libc::EIO,
        }
    }
}
