//! JWT token encoding and decoding using HS256.
//!
//! Tokens carry the numeric user id and are accepted from the
//! `x-access-token` header, the `token` query parameter or a JSON body
//! field (see the `middleware` submodule).

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

/// Fallback token lifetime: 14 days.
pub const DEFAULT_EXPIRY_SECS: u64 = 14 * 24 * 3600;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — numeric user id
    pub sub: i64,
    /// User email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp, equals iat)
    pub nbf: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Encode a token for the given user.
///
/// Uses HS256 signing with the provided secret.
pub fn encode_token(user_id: i64, email: &str, secret: &str, expiry_secs: u64) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now,
        nbf: now,
        exp: now + expiry_secs as i64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")
}

/// Decode and validate a token.
///
/// Returns the claims if the token is signed with the correct secret,
/// not expired, and past its not-before instant.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_nbf = true;
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .context("Failed to decode JWT")?;

    Ok(token_data.claims)
}

// ============================================================================
// Tests
// ============================================================================
