//! Bearer token verification.
//!
//! Token issuance (accounts, passwords, login) belongs to an external
//! identity service; this module only verifies what it hands out.
//!
//! # Token format
//!
//! ```text
//! base64url(claims JSON) "." hex(sha256(secret "." base64url(claims JSON)))
//! ```
//!
//! Claims carry the subject, a display username, a role and an expiry in
//! Unix seconds. Both halves share one secret, so `sign` is available for
//! tooling and tests.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    MissingToken,
    #[error("Invalid token format: {0}")]
    Malformed(String),
    #[error("Token is not valid.")]
    BadSignature,
    #[error("Token has expired.")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Researcher,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn signature(&self, payload: &str) -> String {
        let digest = Sha256::new()
            .chain_update(self.secret.as_bytes())
            .chain_update(b".")
            .chain_update(payload.as_bytes())
            .finalize();
        hex::encode(digest)
    }

    pub fn sign(&self, claims: &Claims) -> String {
        // Serializing a plain struct of strings and integers cannot fail.
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.signature(&payload);
        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| AuthError::Malformed("missing signature".into()))?;

        if !constant_time_eq(self.signature(payload).as_bytes(), signature.as_bytes()) {
            return Err(AuthError::BadSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&json).map_err(|e| AuthError::Malformed(e.to_string()))?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Verifies an `Authorization` header value of the form `Bearer <token>`.
    pub fn verify_header(&self, header: Option<&str>, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let header = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("expected 'Bearer <token>'".into()))?;
        self.verify(token, now)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
