//! CORS layer built from `[web] cors_origins`.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Parse configured origins, skipping unparsable entries.
fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins.iter().filter_map(|o| o.parse().ok()).collect()
}

/// Explicit origins get credentialed CORS; no usable origin means any
/// origin without credentials.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed = parse_origins(origins);

    if parsed.is_empty() {
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
            .allow_credentials(true)
            .allow_origin(parsed)
    }
}
