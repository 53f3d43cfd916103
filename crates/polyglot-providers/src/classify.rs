//! Classification of provider failures into the error taxonomy.
//!
//! HTTP status codes are the primary signal: 401/403 → authentication, 429 →
//! rate limit, 404 → provider error naming the missing model. For
//! transport-level failures with no status, a lowercased-substring match on
//! the message is retained as a last-resort heuristic; the substrings are
//! fixed and covered by fixture tests below.

use polyglot_core::{ErrorKind, ServiceError};
use reqwest::StatusCode;

/// Classify a non-success HTTP response from a provider.
///
/// `body` is the raw error body (often JSON); it is carried in the message so
/// the caller sees the provider's own wording.
pub fn classify_status(
    provider: &str,
    status: StatusCode,
    body: &str,
    model: &str,
) -> ServiceError {
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ServiceError::authentication(format!("{provider} rejected credentials: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ServiceError::rate_limit(format!("{provider} rate limit: {body}"))
        }
        StatusCode::NOT_FOUND => {
            ServiceError::provider_error(format!("model '{model}' not found on {provider}"))
                .with_detail("model", model)
        }
        _ => classify_message(provider, body)
            .with_detail("status", status.as_u16()),
    };
    err.with_provider(provider)
}

/// Classify a failure by its message alone.
///
/// Last-resort heuristic for errors that carry no HTTP status (connect
/// failures, SDK-level errors). Substring table:
/// `"authentication"`/`"api key"` → authentication, `"rate limit"`/`"quota"`
/// → rate limit, `"not found"` → provider error.
pub fn classify_message(provider: &str, message: &str) -> ServiceError {
    let lower = message.to_lowercase();

    let err = if lower.contains("authentication") || lower.contains("api key") {
        ServiceError::authentication(format!("{provider}: {message}"))
    } else if lower.contains("rate limit") || lower.contains("quota") {
        ServiceError::rate_limit(format!("{provider}: {message}"))
    } else if lower.contains("not found") {
        ServiceError::provider_error(format!("{provider}: {message}"))
    } else {
        ServiceError::provider_error(format!("{provider}: {message}"))
    };
    err.with_provider(provider)
}

/// Map a `reqwest` transport error (no HTTP status reached us).
pub fn classify_transport(provider: &str, err: &reqwest::Error) -> ServiceError {
    classify_message(provider, &err.to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_401_is_authentication() {
        let err = classify_status("gemini", StatusCode::UNAUTHORIZED, "bad key", "m");
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.provider(), Some("gemini"));
    }

    #[test]
    fn test_status_403_is_authentication() {
        let err = classify_status("openai", StatusCode::FORBIDDEN, "forbidden", "m");
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_status_429_is_rate_limit() {
        let err = classify_status("openai", StatusCode::TOO_MANY_REQUESTS, "slow down", "m");
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_status_404_names_the_model() {
        let err = classify_status("gemini", StatusCode::NOT_FOUND, "", "gemini-9-ultra");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.message().contains("gemini-9-ultra"));
        assert_eq!(err.details()["model"], serde_json::json!("gemini-9-ultra"));
    }

    #[test]
    fn test_status_500_is_generic_provider_with_status_detail() {
        let err = classify_status(
            "gemini",
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error",
            "m",
        );
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.details()["status"], serde_json::json!(500));
    }

    // Fixture strings for the substring heuristic.

    #[test]
    fn test_message_authentication_fixtures() {
        for msg in ["Authentication failed", "invalid API key provided"] {
            assert_eq!(
                classify_message("p", msg).kind(),
                ErrorKind::Authentication,
                "{msg}"
            );
        }
    }

    #[test]
    fn test_message_rate_limit_fixtures() {
        for msg in ["Rate limit exceeded", "You exceeded your current quota"] {
            assert_eq!(classify_message("p", msg).kind(), ErrorKind::RateLimit, "{msg}");
        }
    }

    #[test]
    fn test_message_not_found_fixture() {
        let err = classify_message("p", "model gemini-x not found");
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn test_message_unknown_is_generic_provider() {
        let err = classify_message("p", "connection reset by peer");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.is_retryable());
    }
}
