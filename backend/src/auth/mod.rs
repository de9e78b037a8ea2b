//! Authentication module.
//!
//! Two boundaries: the identity provider's back-channel is guarded by a
//! pre-shared key, and user requests carry a session token issued through it.
//! Key comparison is constant-time to mitigate timing attacks.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorDetails, ErrorResponse};
use crate::models::CurrentUser;
use crate::AppState;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying a session token where headers cannot be set.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    // Get the API key from the request header
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            // Constant-time comparison to prevent timing attacks
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => match bearer_token(&request) {
            Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                next.run(request).await
            }
            _ => unauthorized_response("Missing or invalid API key"),
        },
    }
}

/// Session authentication layer: resolves the caller and stores a [`CurrentUser`].
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .or_else(|| query_token(&request))
        .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;

    let session = state
        .repo
        .find_session(&token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(CurrentUser {
        user_id: session.user_id,
        token,
    });

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn query_token(request: &Request) -> Option<String> {
    request
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[test]
    fn test_token_extraction() {
        let request = Request::builder()
            .uri("/api/chat/u2/ws?foo=1&access_token=abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(query_token(&request).as_deref(), Some("abc123"));
        assert_eq!(bearer_token(&request), None);

        let request = Request::builder()
            .uri("/api/profiles/me")
            .header(header::AUTHORIZATION, "Bearer tok")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request).as_deref(), Some("tok"));
        assert_eq!(query_token(&request), None);

        let request = Request::builder()
            .uri("/api/profiles/me?access_token=")
            .header(header::AUTHORIZATION, "Basic xyz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);
        assert_eq!(query_token(&request), None);
    }
}
