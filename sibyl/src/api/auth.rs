//! JWT issuance and validation for the transport boundary
//!
//! The core treats the authenticated principal as an opaque string; this
//! module only mints and checks the tokens carrying it.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SibylError};

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque principal identifier
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// HS256 signer/verifier for session tokens
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a token for the principal, valid for `valid_for`.
    pub fn issue(&self, principal: &str, valid_for: chrono::Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.to_string(),
            iat: now.timestamp(),
            exp: (now + valid_for).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| SibylError::Auth(format!("failed to issue token: {}", err)))
    }

    /// Check a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| SibylError::Auth(format!("invalid token: {}", err)))
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Result<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| SibylError::Auth("authorization header is not a bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(SibylError::Auth("empty bearer token".to_string()));
    }

    Ok(token)
}
