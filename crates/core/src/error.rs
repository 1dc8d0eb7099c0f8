//! Unified error types for the harvester.
//!
//! Error codes:
//! - FETCH_001-002: Source adapter errors
//! - DATA_001: Normalization errors
//! - STORE_001-002: Partitioned store errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fetch error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorCode {
    /// FETCH_001: Network failure, timeout, or 5xx from the source
    Transient,
    /// FETCH_002: Malformed request or unsupported source
    Fatal,
}

impl FetchErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient => "FETCH_001",
            Self::Fatal => "FETCH_002",
        }
    }
}

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Partition DDL failed for a reason other than "already exists"
    PartitionCreation,
    /// STORE_002: Batch insert failed
    Write,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PartitionCreation => "STORE_001",
            Self::Write => "STORE_002",
        }
    }
}

/// Unified error type for the harvester.
#[derive(Debug, Error)]
pub enum Error {
    /// Network/5xx-class failure from a source adapter. Retryable.
    #[error("[FETCH_001] transient fetch error: {0}")]
    TransientFetch(String),

    /// Malformed request or unsupported source. Never retried.
    #[error("[FETCH_002] fatal fetch error: {0}")]
    FatalFetch(String),

    /// A record is missing a required field or carries an unparsable value.
    #[error("[DATA_001] malformed data: {0}")]
    MalformedData(String),

    #[error("[STORE_001] partition creation failed: {0}")]
    PartitionCreation(String),

    /// Batch insert failed. Retryable at batch granularity.
    #[error("[STORE_002] store write failed: {0}")]
    StoreWrite(String),

    /// A retryable operation ran out of attempts.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn transient_fetch(msg: impl Into<String>) -> Self {
        Self::TransientFetch(msg.into())
    }

    pub fn fatal_fetch(msg: impl Into<String>) -> Self {
        Self::FatalFetch(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedData(msg.into())
    }

    /// Create a malformed-data error for a missing required field.
    pub fn missing_field(record: &str, field: &str) -> Self {
        Self::MalformedData(format!("{} is missing required field '{}'", record, field))
    }

    pub fn partition_creation(msg: impl Into<String>) -> Self {
        Self::PartitionCreation(msg.into())
    }

    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the failed operation may succeed if attempted again.
    ///
    /// Retryability is a property of the error value; the retry combinator
    /// consults this and nothing else.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::StoreWrite(_))
    }

    /// Get the error code if this is a coded error.
    ///
    /// Exhausted retries report the code of the final underlying failure.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::TransientFetch(_) => Some(FetchErrorCode::Transient.code()),
            Self::FatalFetch(_) => Some(FetchErrorCode::Fatal.code()),
            Self::MalformedData(_) => Some("DATA_001"),
            Self::PartitionCreation(_) => Some(StoreErrorCode::PartitionCreation.code()),
            Self::StoreWrite(_) => Some(StoreErrorCode::Write.code()),
            Self::RetriesExhausted { last, .. } => last.error_code(),
            _ => None,
        }
    }
}
