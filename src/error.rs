//! Error types for chunkstore

use std::fmt;

/// Result type alias for chunkstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chunkstore
#[derive(Debug)]
pub enum Error {
    /// External key could not be parsed (bad field count, bad number)
    MalformedKey(String),
    /// Identity fields (tenant, fingerprint, time range) disagree with the
    /// descriptor the caller expected
    WrongMetadata,
    /// Payload checksum does not match
    InvalidChecksum,
    /// Encoding tag not known to this build
    UnknownEncoding(u8),
    /// Samples handed to an encoder were not sorted by timestamp
    UnsortedSamples,
    /// Descriptor with `from > through`
    InvalidTimeRange { from: i64, through: i64 },
    /// Serialization errors (truncated or structurally invalid buffers)
    Serialization(String),
    /// IO errors
    Io(std::io::Error),
    /// Remote cache transport errors
    Cache(String),
    /// Deadline expired
    Timeout,
    /// Request context was cancelled
    Cancelled,
    /// Configuration errors
    Config(String),
    /// Internal error
    Internal(String),
}

impl Error {
    /// True for failures that mean "these bytes are unusable": the entry is
    /// corrupt or belongs to another key, and refetching the same bytes will
    /// fail the same way.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::WrongMetadata
                | Error::InvalidChecksum
                | Error::UnknownEncoding(_)
                | Error::Serialization(_)
                | Error::UnsortedSamples
        )
    }

    /// True for failures that may succeed if the same call is repeated.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Cache(_) | Error::Timeout | Error::Io(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedKey(msg) => write!(f, "Malformed external key: {}", msg),
            Error::WrongMetadata => write!(f, "Wrong chunk metadata"),
            Error::InvalidChecksum => write!(f, "Invalid chunk checksum"),
            Error::UnknownEncoding(tag) => write!(f, "Unknown chunk encoding: {}", tag),
            Error::UnsortedSamples => write!(f, "Samples are not sorted by timestamp"),
            Error::InvalidTimeRange { from, through } => {
                write!(f, "Invalid time range: from {} is after through {}", from, through)
            }
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Cache(msg) => write!(f, "Cache error: {}", msg),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::MalformedKey(e.to_string())
    }
}
