//! Shared upstream-error classification
//!
//! Every destination adapter funnels its raw failures through this module so
//! one consistent taxonomy surfaces to callers regardless of which
//! destination failed. Classification prefers the nested provider error
//! message over the generic transport message, and is a pure function of its
//! inputs.

use reqwest::StatusCode;

use crate::error::PublishError;

/// Classify a non-success HTTP response.
///
/// * `context` - short operation description, e.g. "twitter media upload"
/// * `status` - the HTTP status code
/// * `body` - the raw response body, inspected for a provider error message
/// * `retry_after` - parsed `Retry-After` header, seconds, if present
pub fn classify_response(
    context: &str,
    status: StatusCode,
    body: &str,
    retry_after: Option<u64>,
) -> PublishError {
    let detail = provider_message(body).unwrap_or_else(|| truncate(body, 200));

    match status.as_u16() {
        401 => PublishError::auth(format!(
            "{} failed: {}. Reconnect the account to refresh its token.",
            context, detail
        )),
        403 => PublishError::permission(format!(
            "{} failed: {}. The connected account lacks the required permission.",
            context, detail
        )),
        429 => {
            let hint = match retry_after {
                Some(secs) => format!(", retry after {}s", secs),
                None => String::new(),
            };
            PublishError::rate_limit(
                format!("{} was rate limited: {}{}", context, detail, hint),
                retry_after,
            )
        }
        400 | 422 => PublishError::validation(format!("{} rejected: {}", context, detail)),
        500..=599 => PublishError::upstream_invalid(format!(
            "{} failed upstream ({}): {}",
            context,
            status.as_u16(),
            detail
        )),
        code => PublishError::unknown(format!("{} failed ({}): {}", context, code, detail)),
    }
}

/// Classify a transport-level failure (no structured error body available).
pub fn classify_transport(context: &str, error: &reqwest::Error) -> PublishError {
    if error.is_timeout() {
        PublishError::timeout(format!("{} timed out: {}", context, error))
    } else if error.is_connect() {
        PublishError::unknown(format!("{} could not connect: {}", context, error))
    } else if error.is_decode() {
        PublishError::upstream_invalid(format!("{} returned an unreadable body: {}", context, error))
    } else {
        PublishError::unknown(format!("{} failed: {}", context, error))
    }
}

/// Classify a success response whose body did not have the documented shape.
pub fn invalid_body(context: &str, body: &str) -> PublishError {
    PublishError::upstream_invalid(format!(
        "{} returned an unexpected response: {}",
        context,
        truncate(body, 200)
    ))
}

/// Consume a non-success response into a classified error.
///
/// Reads the `Retry-After` header and the body, then defers to
/// [`classify_response`].
pub async fn from_response(context: &str, response: reqwest::Response) -> PublishError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    classify_response(context, status, &body, retry_after)
}

/// Extract the most specific error message a provider body offers.
///
/// The destinations nest their messages differently: `error.message`
/// (facebook, instagram), `errors[0].message` or `errors[0].detail`
/// (twitter), a bare `message` (linkedin), or `error_description` (OAuth
/// layers). The first match wins.
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let candidates = [
        value.pointer("/error/error_user_msg"),
        value.pointer("/error/message"),
        value.pointer("/errors/0/message"),
        value.pointer("/errors/0/detail"),
        value.pointer("/message"),
        value.pointer("/error_description"),
        value.pointer("/detail"),
    ];

    let result = candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(|s| s.to_string());
    result
}

fn truncate(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_classify_401_as_auth() {
        let err = classify_response(
            "twitter publish",
            StatusCode::UNAUTHORIZED,
            r#"{"errors":[{"message":"Invalid or expired token"}]}"#,
            None,
        );
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.message.contains("Invalid or expired token"));
        assert!(err.message.contains("Reconnect"));
    }

    #[test]
    fn test_classify_403_as_permission() {
        let err = classify_response(
            "facebook publish",
            StatusCode::FORBIDDEN,
            r#"{"error":{"message":"(#200) Requires pages_manage_posts"}}"#,
            None,
        );
        assert_eq!(err.kind, ErrorKind::Permission);
        assert!(err.message.contains("pages_manage_posts"));
    }

    #[test]
    fn test_classify_429_carries_retry_after() {
        let err = classify_response(
            "instagram container",
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Application request limit reached"}}"#,
            Some(120),
        );
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(120));
        assert!(err.message.contains("retry after 120s"));
    }

    #[test]
    fn test_classify_429_without_header() {
        let err = classify_response(
            "twitter publish",
            StatusCode::TOO_MANY_REQUESTS,
            "",
            None,
        );
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.retry_after, None);
    }

    #[test]
    fn test_classify_5xx_as_upstream_invalid() {
        let err = classify_response(
            "linkedin register",
            StatusCode::BAD_GATEWAY,
            "<html>Bad Gateway</html>",
            None,
        );
        assert_eq!(err.kind, ErrorKind::UpstreamInvalid);
        assert!(err.message.contains("502"));
    }

    #[test]
    fn test_classify_400_as_validation() {
        let err = classify_response(
            "facebook album",
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Invalid parameter"}}"#,
            None,
        );
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("Invalid parameter"));
    }

    #[test]
    fn test_unexpected_status_is_unknown() {
        let err = classify_response("twitter publish", StatusCode::CONFLICT, "", None);
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_provider_message_preferred_over_raw_body() {
        let body = r#"{"error":{"message":"Session has expired","code":190},"trace":"xyz"}"#;
        let err = classify_response("facebook publish", StatusCode::UNAUTHORIZED, body, None);
        assert!(err.message.contains("Session has expired"));
        assert!(!err.message.contains("trace"));
    }

    #[test]
    fn test_provider_message_variants() {
        assert_eq!(
            provider_message(r#"{"error":{"message":"a"}}"#).as_deref(),
            Some("a")
        );
        assert_eq!(
            provider_message(r#"{"errors":[{"message":"b"}]}"#).as_deref(),
            Some("b")
        );
        assert_eq!(
            provider_message(r#"{"errors":[{"detail":"c"}]}"#).as_deref(),
            Some("c")
        );
        assert_eq!(provider_message(r#"{"message":"d"}"#).as_deref(), Some("d"));
        assert_eq!(
            provider_message(r#"{"error_description":"e"}"#).as_deref(),
            Some("e")
        );
        assert_eq!(
            provider_message(r#"{"error":{"error_user_msg":"f","message":"g"}}"#).as_deref(),
            Some("f")
        );
        assert_eq!(provider_message("not json"), None);
        assert_eq!(provider_message(r#"{"ok":true}"#), None);
    }

    #[test]
    fn test_classification_is_pure() {
        // Same input always yields the same (kind, message, retry_after).
        let run = || {
            classify_response(
                "twitter publish",
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"errors":[{"message":"Rate limit exceeded"}]}"#,
                Some(30),
            )
        };
        let (a, b) = (run(), run());
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.message, b.message);
        assert_eq!(a.retry_after, b.retry_after);
    }

    #[test]
    fn test_invalid_body_classification() {
        let err = invalid_body("twitter publish", r#"{"unexpected":"shape"}"#);
        assert_eq!(err.kind, ErrorKind::UpstreamInvalid);
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn test_empty_body_detail() {
        let err = classify_response("linkedin upload", StatusCode::BAD_GATEWAY, "   ", None);
        assert!(err.message.contains("no response body"));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(500);
        let err = classify_response(
            "twitter publish",
            StatusCode::INTERNAL_SERVER_ERROR,
            &body,
            None,
        );
        assert!(err.message.len() < 300);
        assert!(err.message.contains("..."));
    }
}
