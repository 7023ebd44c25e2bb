use std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::RateLimitConfig;
use crate::error::StatusBody;

pub const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_RATE_LIMIT_REMAINING: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Client tables are swept for idle entries once they grow past this size,
/// at most once per window.
const SWEEP_THRESHOLD: usize = 1_024;

/// Sliding-window limiter keyed by client IP.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    clients: Arc<Mutex<ClientTable>>,
}

struct ClientTable {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl ClientTable {
    fn sweep_if_due(&mut self, now: Instant, window: Duration) {
        if self.hits.len() <= SWEEP_THRESHOLD
            || now.saturating_duration_since(self.last_sweep) < window
        {
            return;
        }
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        self.last_sweep = now;
        tracing::debug!(clients = self.hits.len(), "Swept idle rate-limit entries");
    }
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        tracing::info!(
            limit = config.limit,
            window_secs = config.window.as_secs(),
            "Rate limiter configured"
        );
        Self {
            config: Arc::new(config),
            clients: Arc::new(Mutex::new(ClientTable {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    fn check_request<B>(&self, request: &Request<B>) -> RateLimitDecision {
        self.check_client(extract_client_ip(request), Instant::now())
    }

    /// Admit the request if fewer than `limit` requests from this client
    /// fall inside the trailing window ending at `now`.
    fn check_client(&self, client: String, now: Instant) -> RateLimitDecision {
        let limit = self.config.limit;
        let window = self.config.window;

        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        clients.sweep_if_due(now, window);

        let hits = clients.hits.entry(client).or_default();
        while hits
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            hits.pop_front();
        }

        let allowed = (hits.len() as u32) < limit;
        if allowed {
            hits.push_back(now);
        }

        let remaining = limit.saturating_sub(hits.len() as u32);
        let reset_after = hits
            .front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_seconds: ceil_duration_to_seconds(reset_after).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RateLimitDecision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = rate_limiter.check_request(&request);

    if !decision.allowed {
        tracing::warn!(
            limit = decision.limit,
            reset_seconds = decision.reset_seconds,
            "Rate limit exceeded"
        );
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(StatusBody::code("RATE_LIMIT_EXCEEDED")),
        )
            .into_response();
        attach_rate_limit_headers(&mut response, &decision);
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from_str(&decision.reset_seconds.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("1")),
        );
        return response;
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_LIMIT,
        HeaderValue::from_str(&decision.limit.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_REMAINING,
        HeaderValue::from_str(&decision.remaining.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_RESET,
        HeaderValue::from_str(&decision.reset_seconds.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("1")),
    );
}

fn extract_client_ip<B>(request: &Request<B>) -> String {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_x_forwarded_for)
    {
        return ip.to_string();
    }

    if let Some(ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_ip_addr)
    {
        return ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

fn parse_x_forwarded_for(raw: &str) -> Option<IpAddr> {
    raw.split(',').map(str::trim).find_map(parse_ip_addr)
}

fn parse_ip_addr(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn ceil_duration_to_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
