//! Cross-cutting request layers: logging, panic recovery and CORS.
//!
//! The identity stage lives in [`crate::auth::authenticate`]; the order in which these
//! layers wrap the router is fixed in [`crate::build_router`].

use crate::app_state::AppState;
use crate::config::CorsConfig;
use crate::error::internal_error_response;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use std::any::Any;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

/// One span per request carrying a fresh request id, method, URI and host, so every
/// log line emitted while handling the request (including 500s) has that context.
/// Records request metrics on the way out.
pub async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // ---
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    // Label by route template, not raw path, to keep metric cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        uri = %uri,
        host = %host,
    );

    async move {
        let response = next.run(request).await;
        let status = response.status();

        state
            .metrics()
            .record_http_request(start, &route, method.as_str(), status.as_u16());

        tracing::info!(
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );

        response
    }
    .instrument(span)
    .await
}

/// Panic handler for `CatchPanicLayer`: log the payload, answer with the opaque 500.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    // ---
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    tracing::error!(panic = detail, "handler panicked");
    internal_error_response()
}

/// CORS for the configured trusted origins. With none configured no origin is
/// allowed and browsers fall back to same-origin.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    // ---
    let origins: Vec<HeaderValue> = config
        .trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panic_payloads_become_opaque_500s() {
        // ---
        for payload in [
            Box::new("boom") as Box<dyn Any + Send>,
            Box::new(String::from("kaboom")) as Box<dyn Any + Send>,
            Box::new(42_u8) as Box<dyn Any + Send>,
        ] {
            let response = handle_panic(payload);
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
