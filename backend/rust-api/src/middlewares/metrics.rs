use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per normalized path.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Segments that are always followed by a session join code.
const CODE_PARENTS: &[&str] = &["code", "join", "join-status", "submit", "questions"];

/// Segments that are always followed by a user id.
const USER_PARENTS: &[&str] = &["weekly", "monthly-time", "evaluation"];

/// Normalize URL path to avoid cardinality explosion.
/// Replaces UUIDs, numeric ids, join codes and user ids with placeholders.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized: Vec<&str> = Vec::with_capacity(segments.len());

    for (idx, segment) in segments.iter().enumerate() {
        let parent = idx.checked_sub(1).map(|p| segments[p]);
        let grandparent = idx.checked_sub(2).map(|p| segments[p]);

        let placeholder = if segment.is_empty() {
            None
        } else if is_uuid_like(segment) || is_numeric_id(segment) {
            Some("{id}")
        } else if parent.is_some_and(|p| CODE_PARENTS.contains(&p)) {
            Some("{code}")
        } else if parent.is_some_and(|p| USER_PARENTS.contains(&p))
            || grandparent == Some("join-status")
        {
            Some("{id}")
        } else {
            None
        };

        normalized.push(placeholder.unwrap_or(*segment));
    }

    normalized.join("/")
}

/// Check if string looks like a UUID
fn is_uuid_like(s: &str) -> bool {
    // UUID format: 8-4-4-4-12 hex characters
    if s.len() != 36 {
        return false;
    }
    s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Check if string is a numeric ID
fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/sessions/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/sessions/{id}"
        );
        assert_eq!(
            normalize_path("/api/v1/sessions/123/answers"),
            "/api/v1/sessions/{id}/answers"
        );
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(
            normalize_path("/api/v1/sessions/submit/Ab3xYz"),
            "/api/v1/sessions/submit/{code}"
        );
        assert_eq!(
            normalize_path("/api/v1/sessions/code/Ab3xYz/events"),
            "/api/v1/sessions/code/{code}/events"
        );
        assert_eq!(
            normalize_path("/api/v1/sessions/join-status/Ab3xYz/student-7"),
            "/api/v1/sessions/join-status/{code}/{id}"
        );
        assert_eq!(
            normalize_path("/api/v1/analytics/weekly/student-7"),
            "/api/v1/analytics/weekly/{id}"
        );
        assert_eq!(
            normalize_path("/api/v1/analytics/evaluation/student-7"),
            "/api/v1/analytics/evaluation/{id}"
        );
        assert_eq!(
            normalize_path("/api/v1/sessions/student/activation-sessions"),
            "/api/v1/sessions/student/activation-sessions"
        );
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_is_uuid_like() {
        assert!(is_uuid_like("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid_like("not-a-uuid"));
        assert!(!is_uuid_like("12345"));
    }

    #[test]
    fn test_is_numeric_id() {
        assert!(is_numeric_id("123"));
        assert!(is_numeric_id("999999"));
        assert!(!is_numeric_id("abc"));
        assert!(!is_numeric_id(""));
    }
}
