//! # Authentication Module
//!
//! Optional API key check for the Circa HTTP API.
//!
//! ## Configuration
//!
//! - `CIRCA_API_KEY`: when set and non-empty, every route except `/health`
//!   requires the key
//!
//! The key is sent as `Authorization: Bearer <key>` or as the bare key.
//! Browser websocket clients cannot set headers, so the live channel
//! also accepts `?api_key=<key>`.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CIRCA_API_KEY";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Read the API key. `None` (unset or empty) disables authentication.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Compare two keys in constant time over the longer length.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let len = provided.len().max(expected.len());
    let mut left = vec![0u8; len];
    let mut right = vec![0u8; len];
    left[..provided.len()].copy_from_slice(provided);
    right[..expected.len()].copy_from_slice(expected);

    let same_bytes: bool = left.ct_eq(&right).into();
    same_bytes && provided.len() == expected.len()
}

/// Key from the `Authorization` header, or from `api_key` on socket routes.
fn provided_key(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return Some(value.strip_prefix("Bearer ").unwrap_or(value).to_string());
    }

    if !request.uri().path().starts_with("/socket/") {
        return None;
    }
    request.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == "api_key")
            .map(|(_, value)| value.to_string())
    })
}

/// API key authentication middleware.
///
/// Lets every request through when no key is configured. `/health` is
/// always open for load balancer checks.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    match provided_key(&request) {
        Some(key) if keys_match(&key, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                path = request.uri().path(),
                "Authentication failed: invalid API key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_credentials",
                path = request.uri().path(),
                "Authentication failed: no API key supplied"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
