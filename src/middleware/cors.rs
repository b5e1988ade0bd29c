//! CORS policy for browser clients.
//!
//! Policy:
//! - Development: Allow-Origin: *, WITHOUT credentials.
//! - Production: allowlist origins from Config, WITHOUT credentials.
//!   An empty allowlist allows no origin.
//!
//! Bearer tokens travel in the Authorization header, so credentials mode is never needed.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::middleware::http::CORRELATION_ID_HEADER;

pub fn apply(router: Router, config: &Config) -> Router {
    let cors = if config.app_env.is_production() {
        let allowed: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.iter().any(|v| v == origin)
        });

        CorsLayer::new().allow_origin(allow_origin)
    } else {
        CorsLayer::new().allow_origin(Any)
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static(CORRELATION_ID_HEADER),
    ])
    .expose_headers([HeaderName::from_static(CORRELATION_ID_HEADER)])
    .max_age(Duration::from_secs(60 * 10));

    router.layer(cors)
}
