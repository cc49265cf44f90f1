//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for `/api/auth` (~10/min)
//! - `api_rate_limiter`: relaxed limits for the rest of `/api` (~100/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Best-effort client IP.
///
/// Proxy headers win over the socket peer so the limiter and VNPay see the
/// customer rather than the load balancer.
#[must_use]
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

/// Key extractor over [`client_ip`].
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers(), req.extensions()).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Render limiter rejections as `{"message": ...}` like every other error.
///
/// A 429 carries `Retry-After` in seconds.
#[must_use]
pub fn rate_limit_response(error: GovernorError) -> Response {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut response = AppError::RateLimited.into_response();
            let response_headers = response.headers_mut();
            if let Some(headers) = headers {
                response_headers.extend(headers);
            }
            response_headers.insert(header::RETRY_AFTER, HeaderValue::from(wait_time));
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("rate limiter could not determine client IP".to_string())
                .into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Internal(msg.unwrap_or_else(|| "rate limiter error".to_string()))
                .into_response()
        }
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for auth endpoints: 1 token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Does not panic: both settings are non-zero constants, which
/// `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rate_limit_response)
}

/// Rate limiter for the general API: 1 token per second, burst of 50.
///
/// # Panics
///
/// Does not panic: both settings are non-zero constants, which
/// `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rate_limit_response)
}
