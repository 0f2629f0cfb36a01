//! JWT session token management
//!
//! Access and refresh tokens are signed with two distinct HS256 secrets, so a
//! token of one kind never verifies as the other.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::types::{SessionClaims, SessionIdentity, TOKEN_ISSUER, TokenKind};
use crate::config::SecurityConfig;

/// Token service errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is missing")]
    Missing,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Fixed caller-facing reason; decoder details stay in `Display`
    #[must_use]
    pub const fn public_reason(&self) -> &'static str {
        match self {
            Self::Missing => "session required",
            Self::Expired => "session expired",
            Self::InvalidSignature | Self::Malformed(_) => "invalid session",
            Self::Encoding(_) => "session could not be issued",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Keys and validation rules for one token kind
struct SigningKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl SigningKeys {
    fn new(secret: &str, kind: TokenKind, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[kind.audience()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "aud", "iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        }
    }
}

/// Session token service
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_seconds", &self.access.ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh.ttl_seconds)
            .finish_non_exhaustive()
    }
}

/// Token pair issued on login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}

impl TokenService {
    /// Create a token service from two signing secrets and lifetimes
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Self {
        Self {
            access: SigningKeys::new(access_secret, TokenKind::Access, access_ttl_seconds),
            refresh: SigningKeys::new(refresh_secret, TokenKind::Refresh, refresh_ttl_seconds),
        }
    }

    /// Create a token service from validated security settings
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.access_token_secret(),
            config.refresh_token_secret(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    const fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access.ttl_seconds
    }

    /// Refresh token lifetime in seconds
    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh.ttl_seconds
    }

    fn sign(
        &self,
        identity: &SessionIdentity,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = SessionClaims::new(identity, kind, now, keys.ttl_seconds);
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<SessionClaims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Missing);
        }
        let keys = self.keys(kind);
        let data = decode::<SessionClaims>(token, &keys.decoding_key, &keys.validation)?;
        Ok(data.claims)
    }

    /// Issue an access and refresh token for the identity
    pub fn issue(&self, identity: &SessionIdentity) -> Result<TokenPair, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue both tokens as if the current time were `now`
    pub fn issue_at(
        &self,
        identity: &SessionIdentity,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(identity, TokenKind::Access, now)?,
            refresh_token: self.sign(identity, TokenKind::Refresh, now)?,
            access_expires_in: self.access.ttl_seconds,
            refresh_expires_in: self.refresh.ttl_seconds,
        })
    }

    /// Verify an access token
    pub fn verify_access(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Claims are copied from the refresh token, so role or name changes made
    /// after login only show up on the next login.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenError> {
        self.refresh_at(refresh_token, Utc::now())
    }

    /// Same as [`Self::refresh`] with an explicit issue time
    pub fn refresh_at(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = self.verify_refresh(refresh_token)?;
        self.sign(&claims.identity(), TokenKind::Access, now)
    }
}
