//! JWT Token Management for WebSocket Authentication
//!
//! Tokens are extracted from the `Authorization` header using the Bearer
//! scheme, or from the `access_token` query parameter for browsers that
//! cannot set headers on a WebSocket upgrade.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use beacon_server_domain::realtime::Principal;

/// Role granting platform administrator visibility
pub const ROLE_PLATFORM_ADMIN: &str = "platform_admin";
/// Role granting platform owner visibility
pub const ROLE_PLATFORM_OWNER: &str = "platform_owner";

/// JWT claims accepted by the realtime gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User identifier
    #[serde(rename = "sub")]
    pub subject: String,
    /// User roles/permissions
    #[serde(default)]
    pub roles: Vec<String>,
    /// Token expiration timestamp (Unix seconds)
    #[serde(default)]
    pub exp: Option<u64>,
    /// Token issued at timestamp (Unix seconds)
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl JwtClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.trim().eq_ignore_ascii_case(role))
    }

    pub fn to_principal(&self) -> Principal {
        Principal {
            user_id: self.subject.trim().to_string(),
            is_platform_admin: self.has_role(ROLE_PLATFORM_ADMIN),
            is_platform_owner: self.has_role(ROLE_PLATFORM_OWNER),
        }
    }
}

/// Errors that can occur during JWT validation
#[derive(Debug, Error, PartialEq)]
pub enum JwtError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid Authorization header format")]
    InvalidHeaderFormat,

    #[error("Invalid token scheme (expected Bearer)")]
    InvalidScheme,

    #[error("Token validation failed: {0}")]
    ValidationFailed(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token issuer")]
    InvalidIssuer,

    #[error("Token has no subject")]
    MissingSubject,

    #[error("Token decoding failed: {0}")]
    DecodeError(String),
}

/// JWT configuration for token validation
#[derive(Clone)]
pub struct JwtConfig {
    secret: Vec<u8>,
    issuer: Option<String>,
    algorithms: Vec<Algorithm>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("issuer", &self.issuer)
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer,
            algorithms: vec![Algorithm::HS256],
        }
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let header = decode_header(token)
            .map_err(|e| JwtError::DecodeError(format!("Failed to decode header: {}", e)))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(JwtError::ValidationFailed(format!(
                "Unsupported algorithm: {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let decoding_key = DecodingKey::from_secret(&self.secret);

        let claims = decode::<JwtClaims>(token, &decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
                _ => {
                    let message = e.to_string();
                    warn!(error = %message, "Token validation failed");
                    JwtError::ValidationFailed(message)
                }
            })?;

        if claims.subject.trim().is_empty() {
            return Err(JwtError::MissingSubject);
        }

        debug!(subject = %claims.subject, "Token validated successfully");
        Ok(claims)
    }
}

/// Extract JWT token from Authorization header
pub fn extract_token_from_header(auth_header: &str) -> Result<&str, JwtError> {
    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(JwtError::InvalidScheme);
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(JwtError::InvalidHeaderFormat);
    }

    Ok(token)
}
