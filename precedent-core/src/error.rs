//! Error types for precedent-core.

use thiserror::Error;

/// Result type alias using precedent-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error kind. Callers branch on this, never on the
/// display message — the message is for logs, the kind is for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigMissing,
    RateLimited,
    Challenged,
    Timeout,
    ParseEmpty,
    ReasonerError,
    HybridFallbackMiss,
    Network,
    Cache,
    Internal,
    Fatal,
}

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A required model id, region, or credential was not configured.
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    /// Upstream returned HTTP 429.
    #[error("rate limited by {source_tag}, retry after {retry_after_secs:?}s")]
    RateLimited {
        source_tag: String,
        retry_after_secs: Option<u64>,
    },

    /// Upstream served an anti-bot challenge page.
    #[error("challenged by {source_tag} (cloudflare or equivalent)")]
    Challenged { source_tag: String },

    /// An operation exceeded its deadline.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A page or response was fetched but contained no usable evidence.
    #[error("no usable evidence in response from {source_tag}")]
    ParseEmpty { source_tag: String },

    /// Reasoner-stage failure (empty response, unparseable JSON, unusable
    /// plan, max-tokens cutoff, sketch validation failure).
    #[error("reasoner error ({stage}): {message}")]
    ReasonerError { stage: String, message: String },

    /// Hint-based alternate URL resolution found no matching document.
    #[error("hybrid fallback miss for {url}")]
    HybridFallbackMiss { url: String },

    /// Transport/network failure underneath an HTTP call.
    #[error("network error: {0}")]
    Network(String),

    /// Cache backend failure (remote KV unreachable, sqlite I/O, etc).
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else recoverable but not worth its own variant.
    #[error("internal error: {0}")]
    Internal(String),

    /// Unexpected exception reaching the finalize path. Should be rare.
    #[error("fatal error for request {request_id}: {message}")]
    Fatal { request_id: String, message: String },
}

impl Error {
    /// The machine-readable kind of this error, for branching logic.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Challenged { .. } => ErrorKind::Challenged,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ParseEmpty { .. } => ErrorKind::ParseEmpty,
            Self::ReasonerError { .. } => ErrorKind::ReasonerError,
            Self::HybridFallbackMiss { .. } => ErrorKind::HybridFallbackMiss,
            Self::Network(_) => ErrorKind::Network,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Serialization(_) => ErrorKind::Internal,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Fatal { .. } => ErrorKind::Fatal,
        }
    }

    /// Whether a detail-hydration failure of this kind is cacheable
    /// (invariant 4 in spec §3: only {http_403, http_429, parse_empty}).
    pub fn is_cacheable_detail_failure(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ParseEmpty { .. }
        ) || matches!(self, Self::Network(msg) if msg.contains("403"))
    }

    pub fn config_missing(what: impl Into<String>) -> Self {
        Self::ConfigMissing(what.into())
    }

    pub fn rate_limited(source_tag: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimited {
            source_tag: source_tag.into(),
            retry_after_secs,
        }
    }

    pub fn challenged(source_tag: impl Into<String>) -> Self {
        Self::Challenged {
            source_tag: source_tag.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn parse_empty(source_tag: impl Into<String>) -> Self {
        Self::ParseEmpty {
            source_tag: source_tag.into(),
        }
    }

    pub fn reasoner_error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReasonerError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn hybrid_fallback_miss(url: impl Into<String>) -> Self {
        Self::HybridFallbackMiss { url: url.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn fatal(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            request_id: request_id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Error::config_missing("GATEWAY_MODEL").kind(), ErrorKind::ConfigMissing);
        assert_eq!(
            Error::rate_limited("indiankanoon", Some(2)).kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(Error::challenged("indiankanoon").kind(), ErrorKind::Challenged);
    }

    #[test]
    fn detail_failure_cacheability() {
        assert!(Error::rate_limited("x", None).is_cacheable_detail_failure());
        assert!(Error::parse_empty("x").is_cacheable_detail_failure());
        assert!(!Error::timeout(100).is_cacheable_detail_failure());
    }
}
