use std::collections::HashSet;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use guildgate_core::UserId;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,

    /// Issuer label.
    pub iss: String,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,

    /// Random per-token id; two tokens for the same user in the same second
    /// still differ.
    pub jti: Uuid,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret is empty")]
    EmptySecret,

    #[error("token expiry must be positive")]
    InvalidExpiry,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("token rejected: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// HS256 signer/verifier bound to one secret and issuer.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, expiry: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if expiry <= Duration::zero() {
            return Err(TokenError::InvalidExpiry);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            expiry,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Sign a token for `user_id` issued at `now`.
    ///
    /// `now` is truncated to whole seconds, the resolution of the encoded claims.
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(String, TokenClaims), TokenError> {
        let now = now.trunc_subsecs(0);
        let exp = now.checked_add_signed(self.expiry).ok_or(TokenError::InvalidExpiry)?;
        let claims = TokenClaims {
            user_id,
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: Uuid::now_v7(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, claims))
    }

    /// Check signature and issuer, then the time window against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks happen in validate_claims so `now` is injectable.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "iss".to_string()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
