//! JWT token generation and validation
//!
//! Implements access and refresh tokens with HMAC-SHA256 signing.
//! Both kinds share one secret and are told apart by the `typ` claim, so a
//! refresh token is never accepted where an access token is expected.

use allince_core::{AuthConfig, Identity};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token kind carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// Role tier at issuance
    pub role_id: i32,
    pub typ: TokenKind,
    /// JWT ID - unique token identifier
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl AccessClaims {
    pub fn identity(&self) -> Result<Identity, JwtError> {
        let user_id = self.sub.parse().map_err(|_| JwtError::InvalidToken)?;
        Ok(Identity::new(user_id, self.role_id))
    }
}

/// Refresh token claims
///
/// Carries no identity; the session row it maps to holds the user and role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iss: String,
    pub typ: TokenKind,
    /// Random ID that keeps concurrently issued refresh tokens distinct
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Wrong token type")]
    WrongTokenType,

    #[error("Token lifetime of {0}s is out of range")]
    LifetimeOutOfRange(u64),
}

/// JWT Configuration
///
/// Contains settings for token generation and validation
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token expiration time in seconds
    pub access_expiration_secs: u64,
    /// Refresh token expiration time in seconds
    pub refresh_expiration_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_expiration_secs: config.access_token_ttl_secs,
            refresh_expiration_secs: config.refresh_token_ttl_secs(),
            issuer: config.issuer.clone(),
        }
    }
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn expiry(now: DateTime<Utc>, lifetime_secs: u64) -> Result<DateTime<Utc>, JwtError> {
    i64::try_from(lifetime_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(JwtError::LifetimeOutOfRange(lifetime_secs))
}

fn sign<T: Serialize>(config: &JwtConfig, claims: &T) -> Result<String, JwtError> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok(token)
}

fn verify<T: DeserializeOwned>(config: &JwtConfig, token: &str) -> Result<T, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let token_data = decode::<T>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Generate an access token embedding the user ID and role tier
///
/// # Example
///
/// ```no_run
/// use allince_api::auth::jwt::{generate_access_token, JwtConfig};
/// use allince_core::Identity;
///
/// let config = JwtConfig::default();
/// let issued = generate_access_token(&config, Identity::new(42, 1))
///     .expect("Failed to generate token");
/// println!("expires at {}", issued.expires_at);
/// ```
pub fn generate_access_token(
    config: &JwtConfig,
    identity: Identity,
) -> Result<IssuedToken, JwtError> {
    let now = Utc::now();
    let expires_at = expiry(now, config.access_expiration_secs)?;

    let claims = AccessClaims {
        iss: config.issuer.clone(),
        sub: identity.user_id.to_string(),
        role_id: identity.role_id,
        typ: TokenKind::Access,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    Ok(IssuedToken {
        token: sign(config, &claims)?,
        expires_at,
    })
}

/// Generate a refresh token whose validity is checkable without a store lookup
pub fn generate_refresh_token(config: &JwtConfig) -> Result<IssuedToken, JwtError> {
    let now = Utc::now();
    let expires_at = expiry(now, config.refresh_expiration_secs)?;

    let claims = RefreshClaims {
        iss: config.issuer.clone(),
        typ: TokenKind::Refresh,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    Ok(IssuedToken {
        token: sign(config, &claims)?,
        expires_at,
    })
}

/// Validate an access token and extract claims
///
/// Fails on a bad signature, malformed structure, wrong issuer, a refresh
/// token, or an expiry in the past.
pub fn validate_access_token(config: &JwtConfig, token: &str) -> Result<AccessClaims, JwtError> {
    let claims: AccessClaims = verify(config, token)?;
    if claims.typ != TokenKind::Access {
        return Err(JwtError::WrongTokenType);
    }
    Ok(claims)
}

/// Validate a refresh token's own signature and expiry
pub fn validate_refresh_token(config: &JwtConfig, token: &str) -> Result<RefreshClaims, JwtError> {
    let claims: RefreshClaims = verify(config, token)?;
    if claims.typ != TokenKind::Refresh {
        return Err(JwtError::WrongTokenType);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate_token() {
        let config = JwtConfig::default();

        let issued = generate_access_token(&config, Identity::new(42, 2))
            .expect("Failed to generate token");

        let claims =
            validate_access_token(&config, &issued.token).expect("Failed to validate token");

        assert_eq!(claims.identity().unwrap(), Identity::new(42, 2));
        assert_eq!(claims.iss, "allince-api");
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, config.access_expiration_secs as i64);
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::default();
        let result = validate_access_token(&config, "invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig {
            secret: "secret1".to_string(),
            ..Default::default()
        };
        let config2 = JwtConfig {
            secret: "secret2".to_string(),
            ..Default::default()
        };

        let issued = generate_access_token(&config1, Identity::new(1, 1)).unwrap();

        let result = validate_access_token(&config2, &issued.token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_issuer() {
        let config = JwtConfig::default();
        let other = JwtConfig {
            issuer: "someone-else".to_string(),
            ..Default::default()
        };

        let issued = generate_access_token(&other, Identity::new(1, 1)).unwrap();
        assert!(validate_access_token(&config, &issued.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::default();
        let now = Utc::now().timestamp();

        // Create a token that expired 1 hour ago
        let claims = AccessClaims {
            iss: config.issuer.clone(),
            sub: "1".to_string(),
            role_id: 1,
            typ: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };

        let token = sign(&config, &claims).unwrap();

        let result = validate_access_token(&config, &token);
        assert!(matches!(result, Err(JwtError::ExpiredToken)));
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let config = JwtConfig::default();
        let issued = generate_refresh_token(&config).unwrap();

        let claims = validate_refresh_token(&config, &issued.token).unwrap();
        assert_eq!(claims.typ, TokenKind::Refresh);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 1440 * 3600);
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let config = JwtConfig::default();
        let a = generate_refresh_token(&config).unwrap();
        let b = generate_refresh_token(&config).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let config = JwtConfig::default();
        let access = generate_access_token(&config, Identity::new(1, 1)).unwrap();
        let refresh = generate_refresh_token(&config).unwrap();

        assert!(validate_refresh_token(&config, &access.token).is_err());
        assert!(validate_access_token(&config, &refresh.token).is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let config = JwtConfig {
            access_expiration_secs: u64::MAX,
            refresh_expiration_secs: i64::MAX as u64,
            ..Default::default()
        };

        assert!(matches!(
            generate_access_token(&config, Identity::new(1, 1)),
            Err(JwtError::LifetimeOutOfRange(secs)) if secs == u64::MAX
        ));
        assert!(matches!(
            generate_refresh_token(&config),
            Err(JwtError::LifetimeOutOfRange(_))
        ));
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let claims = AccessClaims {
            iss: "allince-api".to_string(),
            sub: "not-a-number".to_string(),
            role_id: 1,
            typ: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.identity(), Err(JwtError::InvalidToken)));
    }
}
