//! Error type definitions for the asset service
//!
//! The resolution path is fail-soft: per-source failures are recovered by
//! trying the next source, and callers of `resolve()` never observe an
//! error for a missing asset. The variants here exist so the locator, sync
//! tooling, and health tracker can tell the failure modes apart.

use thiserror::Error;

/// Top-level application error type
///
/// Used at the binary and web boundaries. Subsystem errors convert into it
/// via `#[from]` so `?` composes across layers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Asset resolution errors (only surfaced by bulk tooling, never by
    /// the resolve path itself)
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Bulk sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Per-source failure modes seen while resolving or downloading one asset.
///
/// `ALL_SOURCES_EXHAUSTED` has no variant on purpose: exhaustion is always
/// resolved internally to the bundled fallback and never escapes.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Timeout or connection refused
    #[error("Source unreachable: {url}")]
    SourceUnreachable { url: String },

    /// Non-2xx response
    #[error("Source rejected request: {url} (HTTP {status})")]
    SourceRejected { url: String, status: u16 },

    /// Payload failed the integrity check (too small, or wrong magic bytes)
    #[error("Invalid payload from {url}: {reason}")]
    PayloadInvalid { url: String, reason: String },
}

/// Bulk sync specific errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// The unit catalog could not be fetched or parsed
    #[error("Catalog unavailable: {message}")]
    Catalog { message: String },

    /// Manifest write failure. Fatal for the run: a corrupted manifest is
    /// worse than a stale one.
    #[error("Manifest write failed: {path}: {source}")]
    ManifestWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Validation report write failure
    #[error("Report write failed: {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ResolveError {
    /// Create an unreachable error
    pub fn unreachable<U: Into<String>>(url: U) -> Self {
        Self::SourceUnreachable { url: url.into() }
    }

    /// Create a rejection error from an HTTP status
    pub fn rejected<U: Into<String>>(url: U, status: u16) -> Self {
        Self::SourceRejected {
            url: url.into(),
            status,
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::PayloadInvalid {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl SyncError {
    /// Create a catalog error
    pub fn catalog<M: Into<String>>(message: M) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }
}
