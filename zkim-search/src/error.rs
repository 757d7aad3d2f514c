//! Error types for the search index.

use std::fmt;

// ---------------------------------------------------------------------------
// Top-level search error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum SearchError {
    ServiceInitialization(String),
    SingletonInstantiation(String),
    RateLimitExceeded,
    OprfKeyMissing,
    Decryption(String),
    Integrity(String),
    Corruption(String),
    KeyRotationDisabled,
    NotFound(String),
    Serialization(String),
    SearchFailed(String),
    StatisticsFailed(String),
}

impl SearchError {
    /// Stable machine-readable code, mirrored in `details` maps handed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ServiceInitialization(_) => "SERVICE_INITIALIZATION_ERROR",
            Self::SingletonInstantiation(_) => "SINGLETON_INSTANTIATION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::OprfKeyMissing => "OPRF_KEY_MISSING",
            Self::Decryption(_) => "DECRYPTION_ERROR",
            Self::Integrity(_) => "INTEGRITY_ERROR",
            Self::Corruption(_) => "CORRUPTION_ERROR",
            Self::KeyRotationDisabled => "KEY_ROTATION_DISABLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::SearchFailed(_) => "SEARCH_FAILED",
            Self::StatisticsFailed(_) => "STATISTICS_FAILED",
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceInitialization(msg) => write!(f, "service initialization failed: {}", msg),
            Self::SingletonInstantiation(msg) => write!(f, "singleton instantiation failed: {}", msg),
            Self::RateLimitExceeded => write!(f, "rate limit exceeded"),
            Self::OprfKeyMissing => write!(f, "OPRF secret key unavailable"),
            Self::Decryption(msg) => write!(f, "decryption error: {}", msg),
            Self::Integrity(msg) => write!(f, "integrity error: {}", msg),
            Self::Corruption(msg) => write!(f, "corruption error: {}", msg),
            Self::KeyRotationDisabled => write!(f, "key rotation disabled"),
            Self::NotFound(what) => write!(f, "not found: {}", what),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::SearchFailed(msg) => write!(f, "search failed: {}", msg),
            Self::StatisticsFailed(msg) => write!(f, "statistics failed: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<zkim_crypto::error::EnvelopeError> for SearchError {
    fn from(e: zkim_crypto::error::EnvelopeError) -> Self {
        use zkim_crypto::error::EnvelopeError as E;
        match e {
            E::Decryption => Self::Decryption(e.to_string()),
            E::Integrity => Self::Integrity(e.to_string()),
            E::Corruption => Self::Corruption(e.to_string()),
            E::KeyRotationDisabled => Self::KeyRotationDisabled,
            E::NotFound => Self::NotFound("zkim object".into()),
            E::Serialization(msg) => Self::Serialization(msg),
            E::Storage(msg) => Self::SearchFailed(msg),
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Service-wrapper envelope
// ---------------------------------------------------------------------------

/// Error surfaced across the service boundary (C4). Internal operations
/// return `Result<T, SearchError>`; the public method converts a failure
/// into this type via `.map_err(ServiceError::from)` before raising it.
#[derive(Debug)]
pub struct ServiceError {
    pub code: &'static str,
    pub message: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<SearchError> for ServiceError {
    fn from(e: SearchError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Specific operation errors (type-safe, per operation)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct IndexError(pub SearchError);
impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::error::Error for IndexError {}
impl From<SearchError> for IndexError {
    fn from(e: SearchError) -> Self {
        Self(e)
    }
}

#[derive(Debug)]
pub struct QueryError(pub SearchError);
impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::error::Error for QueryError {}
impl From<SearchError> for QueryError {
    fn from(e: SearchError) -> Self {
        Self(e)
    }
}
