//! Contact form relay service
//!
//! Accepts contact submissions on `POST /`, sanitizes and validates them and
//! forwards them to the site owner through SparkPost.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod observability;
pub mod rate_limit;
pub mod relay;
pub mod routes;
pub mod state;
pub mod validation;

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{AppConfig, ConfigError, CorsOrigin};
use crate::rate_limit::{
    RateLimitState, HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
};
use crate::state::AppState;

const CORS_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24);

/// Assemble the router with its middleware stack. From the outside in:
/// request logging, `nosniff`, CORS, then rate limiting, so preflight
/// requests are answered without consuming the caller's quota.
pub fn build_app(state: AppState, config: &AppConfig) -> Result<Router, ConfigError> {
    let rate_limit_state = RateLimitState::new(config.rate_limit.clone());

    let app = Router::new()
        .merge(routes::contact_routes())
        .fallback(handlers::route_not_found)
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit::rate_limit_middleware,
        ))
        .layer(cors_layer(&config.cors)?)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(middleware::from_fn(request_logger))
        .with_state(state);

    Ok(app)
}

fn cors_layer(origin: &CorsOrigin) -> Result<CorsLayer, ConfigError> {
    let allow_origin = match origin {
        CorsOrigin::Any => AllowOrigin::any(),
        CorsOrigin::Exact(origin) => {
            AllowOrigin::exact(HeaderValue::from_str(origin).map_err(|e| {
                ConfigError::InvalidConfig(format!("Invalid CORS origin `{}`: {}", origin, e))
            })?)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::OPTIONS, Method::POST])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            HEADER_RATE_LIMIT_LIMIT,
            HEADER_RATE_LIMIT_REMAINING,
            HEADER_RATE_LIMIT_RESET,
        ])
        .max_age(CORS_MAX_AGE))
}

async fn request_logger(
    req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_millis();
    let status = response.status().as_u16();

    tracing::info!("{method} {uri} {status} {elapsed}ms");

    response
}
