/**
 * Authentication Middleware
 *
 * This module provides middleware for protecting routes that require an
 * authenticated principal. It extracts and verifies the bearer token from the
 * Authorization header and provides the principal to handlers.
 */

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::backend::auth::{AuthError, PrincipalAuthenticator};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::Principal;

/// Principal extracted from a verified bearer token
#[derive(Clone, Debug)]
pub struct AuthenticatedPrincipal {
    pub principal: Principal,
    /// The raw token, kept so logout can revoke it
    pub token: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::Missing)?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Invalid("expected a Bearer token".to_string()))
}

/// Authentication middleware
///
/// This middleware:
/// 1. Extracts the bearer token from the Authorization header
/// 2. Verifies it with the application's authenticator
/// 3. Attaches the principal to request extensions for use in handlers
///
/// Returns 401 Unauthorized if the token is missing, invalid, expired or
/// revoked.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = bearer_token(header)
        .inspect_err(|e| tracing::warn!("[Auth] Rejected request: {}", e))?
        .to_string();

    let principal = app_state
        .authenticator
        .authenticate(&token)
        .await
        .inspect_err(|e| tracing::warn!("[Auth] Rejected request: {}", e))?;

    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal { principal, token });

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated principal
///
/// This can be used as a parameter in handlers behind [`auth_middleware`].
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedPrincipal);

impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("[Auth] AuthenticatedPrincipal not found in request extensions");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn test_bearer_token_missing() {
        assert_matches!(bearer_token(None), Err(AuthError::Missing));
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        assert_matches!(bearer_token(Some("Basic dTpw")), Err(AuthError::Invalid(_)));
        assert_matches!(bearer_token(Some("Bearer ")), Err(AuthError::Invalid(_)));
    }
}
