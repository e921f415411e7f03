//! Request authentication and user identification.
//!
//! Authentication proper happens upstream. A trusted proxy names the user in
//! the `X-Remote-User` header; requests without it are anonymous.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::models::User;

use super::AppState;

pub const REMOTE_USER_HEADER: &str = "X-Remote-User";

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// API key for authentication (from FEATURES_API_KEY)
    pub api_key: Option<String>,
    /// Allowed CORS origins (from FEATURES_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    /// Load security configuration from environment variables.
    pub fn from_env() -> Self {
        let api_key = std::env::var("FEATURES_API_KEY").ok();

        let cors_origins = std::env::var("FEATURES_CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect());

        Self {
            api_key,
            cors_origins,
        }
    }

    /// Create a config with no authentication (for local development/testing).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a config with authentication enabled (for testing).
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            cors_origins: None,
        }
    }
}

/// The user a request acts as, inserted by [`identify_user`].
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Authentication middleware that checks for a valid API key.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected_key = match &config.api_key {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Resolve `X-Remote-User` to a stored user and attach it as [`CurrentUser`].
///
/// Unknown usernames are rejected rather than downgraded to anonymous.
pub async fn identify_user(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let username = request
        .headers()
        .get(REMOTE_USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let user = match username {
        None => User::anonymous(),
        Some(name) => match state.store.get_user_by_name(&name) {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!("Unknown remote user {}", name);
                return Err(StatusCode::UNAUTHORIZED);
            }
            Err(e) => {
                tracing::error!("Failed to load user {}: {}", name, e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
