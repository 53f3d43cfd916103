//! Typed error taxonomy for the capability layer.
//!
//! Every failure raised anywhere in Polyglot is a `ServiceError` with exactly
//! one `ErrorKind`. The kind decides retry eligibility: validation, config and
//! auth failures are terminal; rate limits, resource and provider failures are
//! retried and then trigger provider fallback.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ServiceError>;

// ─────────────────────────────────────────────
// ErrorKind
// ─────────────────────────────────────────────

/// Classification of a `ServiceError`.
///
/// Exactly one kind per error. `is_retryable()` on the error is derived
/// entirely from this kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or empty caller input. Raised before any network I/O.
    Validation,
    /// No usable provider credentials for the requested capability.
    Configuration,
    /// The provider rejected our credentials.
    Authentication,
    /// The provider signalled throttling or quota exhaustion.
    RateLimit,
    /// A local resource (temp file, cache file) was unavailable.
    Resource,
    /// Any other provider-specific failure.
    Provider,
    /// Generic wrapper for failures that fit no narrower kind.
    Service,
}

impl ErrorKind {
    /// Whether an error of this kind may succeed on retry.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            ErrorKind::Validation | ErrorKind::Configuration | ErrorKind::Authentication
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Resource => "resource",
            ErrorKind::Provider => "provider",
            ErrorKind::Service => "service",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────
// ServiceError
// ─────────────────────────────────────────────

/// A classified failure with structured detail payload.
///
/// Created at the failure site and propagated up the call stack only — never
/// stored. The web-handler boundary (out of scope here) maps `kind` to an
/// HTTP status.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind} error{}: {message}", self.provider_suffix())]
pub struct ServiceError {
    kind: ErrorKind,
    message: String,
    details: HashMap<String, serde_json::Value>,
    provider: Option<String>,
}

impl ServiceError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServiceError {
            kind,
            message: message.into(),
            details: HashMap::new(),
            provider: None,
        }
    }

    /// Malformed caller input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Missing or unusable configuration.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Rejected credentials.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Throttling or quota exhaustion.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Local resource failure (temp file, cache file).
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }

    /// Provider-specific failure that fits no narrower kind.
    pub fn provider_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    /// Generic service failure.
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message)
    }

    /// Attach the provider this error originated from.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach a structured detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn details(&self) -> &HashMap<String, serde_json::Value> {
        &self.details
    }

    /// Whether this error may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn provider_suffix(&self) -> String {
        match &self.provider {
            Some(p) => format!(" ({p})"),
            None => String::new(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
