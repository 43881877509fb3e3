//! Verification of identity-provider ID tokens.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::config::{AuthKey, AuthSettings};

pub const ANONYMOUS_NAME: &str = "Anonymous Chef";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("invalid verification key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub display_name: String,
    pub email: Option<String>,
    /// Name claim as issued, before any fallback.
    pub name: Option<String>,
}

impl From<IdTokenClaims> for AuthUser {
    fn from(claims: IdTokenClaims) -> Self {
        let name = claims.name.filter(|n| !n.trim().is_empty());
        let email = claims.email.filter(|e| !e.trim().is_empty());
        let display_name = name
            .clone()
            .or_else(|| email.clone())
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
        Self {
            uid: claims.sub,
            display_name,
            email,
            name,
        }
    }
}

#[derive(Clone)]
pub struct IdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl IdentityVerifier {
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, IdentityError> {
        let (key, algorithm) = match &settings.key {
            AuthKey::Hs256(secret) => (
                DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            ),
            AuthKey::Rs256 { public_key_pem } => (
                DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| IdentityError::InvalidKey(e.to_string()))?,
                Algorithm::RS256,
            ),
        };
        Ok(Self::with_key(
            key,
            algorithm,
            settings.issuer.as_deref(),
            settings.audience.as_deref(),
        ))
    }

    /// Shared-secret verifier without issuer or audience checks.
    pub fn hs256(secret: &str) -> Self {
        Self::with_key(
            DecodingKey::from_secret(secret.as_bytes()),
            Algorithm::HS256,
            None,
            None,
        )
    }

    fn with_key(
        key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, IdentityError> {
        let data = decode::<IdTokenClaims>(token, &self.key, &self.validation)?;
        debug!(uid = %data.claims.sub, "Verified id token");
        Ok(data.claims.into())
    }

    /// Verify the value of an `Authorization` header.
    pub fn verify_header(&self, header: Option<&str>) -> Result<AuthUser, IdentityError> {
        let token = header
            .and_then(|h| {
                h.strip_prefix("Bearer ")
                    .or_else(|| h.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::MissingToken)?;
        self.verify(token)
    }
}
