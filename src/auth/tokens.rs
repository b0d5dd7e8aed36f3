//! Signed access/refresh tokens (HMAC JWTs).
//!
//! Both token kinds share one key, issuer, and audience and differ only in
//! their `type` claim and lifetime. Validation is stateless: signature, expiry,
//! issuer, audience, and subject are all checked against the token itself.

use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, warn};
use ulid::Ulid;

use super::error::{AuthError, TokenConfigError};

pub const MIN_SIGNING_KEY_BYTES: usize = 32;
pub const DEFAULT_ALGORITHM: &str = "HS256";
pub const DEFAULT_ISSUER: &str = "finauth";
pub const DEFAULT_AUDIENCE: &str = "finauth-api";
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Claim names callers can never set through extra claims.
const RESERVED_CLAIMS: [&str; 7] = ["sub", "iat", "exp", "iss", "aud", "jti", "type"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key material and claim targets shared by issuer and validator.
pub struct TokenKeys {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenKeys {
    /// Build HMAC keys from raw secret bytes.
    ///
    /// # Errors
    /// Fails when the secret is shorter than [`MIN_SIGNING_KEY_BYTES`], the
    /// algorithm is not an HMAC variant, or issuer/audience are empty.
    pub fn from_secret(
        secret: &[u8],
        algorithm: &str,
        issuer: &str,
        audience: &str,
    ) -> Result<Self, TokenConfigError> {
        let algorithm = parse_algorithm(algorithm)?;
        if secret.len() < MIN_SIGNING_KEY_BYTES {
            return Err(TokenConfigError::KeyTooShort {
                len: secret.len(),
                min: MIN_SIGNING_KEY_BYTES,
            });
        }
        if issuer.trim().is_empty() || audience.trim().is_empty() {
            return Err(TokenConfigError::MissingClaimTarget);
        }
        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("algorithm", &self.algorithm)
            .field("key", &"***")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

fn parse_algorithm(algorithm: &str) -> Result<Algorithm, TokenConfigError> {
    match algorithm.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(TokenConfigError::UnsupportedAlgorithm(algorithm.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<TokenKeys>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(keys: Arc<TokenKeys>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            keys,
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token with the configured lifetime.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_access(
        &self,
        subject: &str,
        extra_claims: Option<Map<String, Value>>,
    ) -> Result<String, AuthError> {
        self.issue_access_with_ttl(subject, extra_claims, self.access_ttl)
    }

    /// Issue an access token; reserved claims override `extra_claims`.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_access_with_ttl(
        &self,
        subject: &str,
        extra_claims: Option<Map<String, Value>>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let mut extra = extra_claims.unwrap_or_default();
        for name in RESERVED_CLAIMS {
            if extra.remove(name).is_some() {
                debug!(claim = name, "dropped reserved claim from extra claims");
            }
        }
        let claims = self.claims(subject, TokenType::Access, ttl, extra);
        self.sign(&claims)
    }

    /// Issue a refresh token. Refresh tokens never carry extra claims.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_refresh(&self, subject: &str) -> Result<String, AuthError> {
        let claims = self.claims(subject, TokenType::Refresh, self.refresh_ttl, Map::new());
        self.sign(&claims)
    }

    fn claims(
        &self,
        subject: &str,
        token_type: TokenType,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Claims {
        let iat = get_current_timestamp();
        Claims {
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
            iss: self.keys.issuer.clone(),
            aud: self.keys.audience.clone(),
            jti: Ulid::new().to_string(),
            token_type,
            extra,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.keys.algorithm), claims, &self.keys.encoding).map_err(|err| {
            error!("Failed to sign token: {err}");
            AuthError::Internal("token signing failed".to_string())
        })
    }
}

#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<TokenKeys>,
    validation: Validation,
}

impl TokenValidator {
    #[must_use]
    pub fn new(keys: Arc<TokenKeys>) -> Self {
        let mut validation = Validation::new(keys.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[keys.issuer.as_str()]);
        validation.set_audience(&[keys.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        Self { keys, validation }
    }

    /// Verify signature, expiry, issuer, audience, and subject.
    ///
    /// # Errors
    /// Every failure collapses to `AuthError::InvalidToken`; the specific
    /// cause is only logged.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.validation).map_err(|err| {
            warn!(reason = ?err.kind(), "token rejected");
            AuthError::InvalidToken
        })?;
        if data.claims.sub.trim().is_empty() {
            warn!(reason = "empty subject", "token rejected");
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    /// Guard for flows that only accept access tokens.
    ///
    /// # Errors
    /// Returns `AuthError::WrongTokenUse` for refresh tokens.
    pub fn reject_if_refresh_type(claims: &Claims) -> Result<(), AuthError> {
        if claims.token_type == TokenType::Refresh {
            warn!(subject = %claims.sub, "refresh token presented as access token");
            return Err(AuthError::WrongTokenUse);
        }
        Ok(())
    }

    /// Guard for the refresh flow.
    ///
    /// # Errors
    /// Returns `AuthError::WrongTokenUse` unless the token is a refresh token.
    pub fn require_refresh_type(claims: &Claims) -> Result<(), AuthError> {
        if claims.token_type != TokenType::Refresh {
            warn!(subject = %claims.sub, "access token presented as refresh token");
            return Err(AuthError::WrongTokenUse);
        }
        Ok(())
    }
}
