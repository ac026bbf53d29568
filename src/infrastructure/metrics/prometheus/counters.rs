use metrics::{counter, histogram, Label};
use std::time::Instant;

/// Track HTTP request count and latency, labelled by route, method and status.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let labels = vec![
        Label::new("path", path.to_string()),
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
    ];

    counter!("http_requests_total", labels.clone()).increment(1);
    histogram!("http_request_duration_seconds", labels).record(start.elapsed());
}

/// Count password logins by outcome.
pub fn increment_login(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("auth_logins_total", "outcome" => outcome).increment(1);
}

/// Count requests rejected by the identity stage.
pub fn increment_auth_rejection(reason: &'static str) {
    counter!("auth_rejections_total", "reason" => reason).increment(1);
}
