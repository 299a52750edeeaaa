/**
 * Session Tokens
 *
 * This module handles JWT token generation and validation for principals,
 * plus an in-memory revocation cache used by logout.
 *
 * Tokens are HS256-signed and carry `{sub, role, exp, iat}`. A revoked token
 * stays in the cache only until its own expiry, after which signature
 * validation rejects it anyway.
 */

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::shared::{Principal, Role};

/// Default token lifetime: 30 days
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Principal ID
    pub sub: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Credential verification failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("Missing credential")]
    Missing,

    #[error("Invalid credential: {0}")]
    Invalid(String),

    #[error("Credential expired")]
    Expired,

    #[error("Credential revoked")]
    Revoked,
}

/// Turns a presented credential into a principal
#[async_trait]
pub trait PrincipalAuthenticator: Send + Sync + 'static {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Tokens invalidated before their expiry
#[derive(Debug, Clone, Default)]
pub struct RevokedTokens {
    /// token -> exp
    entries: Arc<RwLock<HashMap<String, u64>>>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn revoke(&self, token: &str, exp: u64) {
        self.entries.write().await.insert(token.to_string(), exp);
    }

    pub async fn is_revoked(&self, token: &str) -> bool {
        self.entries.read().await.contains_key(token)
    }

    /// Drop entries whose token has expired on its own
    ///
    /// # Returns
    ///
    /// Number of entries removed
    pub async fn purge_expired(&self) -> usize {
        let now = unix_now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// HS256 bearer-token authenticator
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    revoked: RevokedTokens,
    lifetime: Duration,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            revoked: RevokedTokens::new(),
            lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    pub fn revoked(&self) -> &RevokedTokens {
        &self.revoked
    }

    /// Create a JWT token for a principal
    ///
    /// # Arguments
    /// * `principal_id` - Principal ID
    /// * `role` - Role recorded in the token
    ///
    /// # Returns
    /// JWT token string
    pub fn create_token(&self, principal_id: &str, role: Role) -> Result<String, AuthError> {
        let now = unix_now();
        self.encode_claims(&Claims {
            sub: principal_id.to_string(),
            role,
            exp: now + self.lifetime.as_secs(),
            iat: now,
        })
    }

    /// Sign arbitrary claims
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Invalid(e.to_string()))
    }

    /// Verify signature and expiry, then consult the revocation cache
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })?;

        if self.revoked.is_revoked(token).await {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    /// Revoke a token until it expires
    pub async fn revoke(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify_token(token).await?;
        self.revoked.revoke(token, claims.exp).await;
        tracing::info!(principal_id = %claims.sub, "[Auth] Token revoked");
        Ok(claims)
    }
}

#[async_trait]
impl PrincipalAuthenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verify_token(token).await?;
        Ok(Principal::new(claims.sub, claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn authenticator() -> JwtAuthenticator {
        JwtAuthenticator::new("test-secret")
    }

    #[tokio::test]
    async fn test_verify_token() {
        let auth = authenticator();
        let token = auth.create_token("student-1", Role::Student).unwrap();
        assert!(!token.is_empty());

        let claims = auth.verify_token(&token).await.unwrap();
        assert_eq!(claims.sub, "student-1");
        assert_eq!(claims.role, Role::Student);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_authenticate_returns_principal() {
        let auth = authenticator();
        let token = auth.create_token("teacher-9", Role::Teacher).unwrap();
        let principal = auth.authenticate(&token).await.unwrap();
        assert_eq!(principal, Principal::new("teacher-9", Role::Teacher));
    }

    #[tokio::test]
    async fn test_verify_invalid_token() {
        let auth = authenticator();
        assert_matches!(
            auth.verify_token("invalid.token.here").await,
            Err(AuthError::Invalid(_))
        );
        assert_matches!(auth.verify_token("").await, Err(AuthError::Missing));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let token = JwtAuthenticator::new("other")
            .create_token("u1", Role::Admin)
            .unwrap();
        assert_matches!(
            authenticator().verify_token(&token).await,
            Err(AuthError::Invalid(_))
        );
    }

    #[tokio::test]
    async fn test_expired_token() {
        let auth = authenticator();
        let now = unix_now();
        let token = auth
            .encode_claims(&Claims {
                sub: "u1".to_string(),
                role: Role::Parent,
                exp: now - 3600,
                iat: now - 7200,
            })
            .unwrap();
        assert_matches!(auth.verify_token(&token).await, Err(AuthError::Expired));
    }

    #[tokio::test]
    async fn test_revoked_token() {
        let auth = authenticator();
        let token = auth.create_token("u1", Role::Student).unwrap();
        auth.revoke(&token).await.unwrap();

        assert_matches!(auth.authenticate(&token).await, Err(AuthError::Revoked));
        // unexpired entries survive a purge
        assert_eq!(auth.revoked().purge_expired().await, 0);
        assert_eq!(auth.revoked().len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_entries() {
        let revoked = RevokedTokens::new();
        revoked.revoke("old", unix_now() - 1).await;
        revoked.revoke("fresh", unix_now() + 3600).await;

        assert_eq!(revoked.purge_expired().await, 1);
        assert!(!revoked.is_revoked("old").await);
        assert!(revoked.is_revoked("fresh").await);
    }
}
