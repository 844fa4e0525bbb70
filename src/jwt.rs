//! JWT token generation and validation.
//!
//! Dual-token scheme: short-lived access tokens carrying the public account
//! claims, and long-lived refresh tokens carrying only the account uuid.
//! The two kinds are signed with separate secrets, so neither can stand in
//! for the other even before the `typ` claim is checked.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::User;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, authorizes individual requests
    Access,
    /// Long-lived refresh token - tracked as the single active session value
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account uuid)
    pub sub: String,
    /// Username
    pub username: String,
    /// Email
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens. Only the account uuid - everything else
/// is re-read from storage when the token is exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (account uuid)
    pub sub: String,
    /// Unique token id. Rotation compares tokens by exact value, so two
    /// tokens issued within the same second must still differ.
    pub jti: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token duration: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 10 days
pub const DEFAULT_REFRESH_TOKEN_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Signing secrets and lifetimes, injected at construction.
#[derive(Clone)]
pub struct JwtSettings {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_duration_secs: u64,
    pub refresh_duration_secs: u64,
}

impl JwtSettings {
    /// Settings with default lifetimes.
    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_duration_secs: DEFAULT_ACCESS_TOKEN_DURATION_SECS,
            refresh_duration_secs: DEFAULT_REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_duration_secs: u64,
    refresh_duration_secs: u64,
}

/// A generated token together with its lifetime in seconds (used for the
/// cookie Max-Age).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub duration: u64,
}

impl JwtConfig {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(&settings.access_secret),
            access_decoding: DecodingKey::from_secret(&settings.access_secret),
            refresh_encoding: EncodingKey::from_secret(&settings.refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&settings.refresh_secret),
            access_duration_secs: settings.access_duration_secs,
            refresh_duration_secs: settings.refresh_duration_secs,
        }
    }

    pub fn access_duration_secs(&self) -> u64 {
        self.access_duration_secs
    }

    pub fn refresh_duration_secs(&self) -> u64 {
        self.refresh_duration_secs
    }

    /// Generate an access token for an account.
    pub fn generate_access_token(&self, user: &User) -> Result<IssuedToken, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            sub: user.uuid.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + self.access_duration_secs,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            duration: self.access_duration_secs,
        })
    }

    /// Generate a refresh token for an account uuid.
    pub fn generate_refresh_token(&self, uuid: &str) -> Result<IssuedToken, JwtError> {
        let now = unix_now()?;

        let claims = RefreshClaims {
            sub: uuid.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + self.refresh_duration_secs,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            duration: self.refresh_duration_secs,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: AccessClaims = decode(token, &self.access_decoding)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: RefreshClaims = decode(token, &self.refresh_decoding)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }
}

fn decode<C: serde::de::DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<C, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<C>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::Malformed,
            }
        })
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token expiry has passed
    Expired,
    /// Signature does not match the configured secret
    InvalidSignature,
    /// Not a structurally valid token of the expected shape
    Malformed,
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using a refresh token as an access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Expired => write!(f, "Token has expired"),
            JwtError::InvalidSignature => write!(f, "Token signature is invalid"),
            JwtError::Malformed => write!(f, "Token is malformed"),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
