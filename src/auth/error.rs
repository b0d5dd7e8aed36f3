//! Error taxonomy for the authentication core.

use thiserror::Error;

/// Failures surfaced by the session facade and its components.
///
/// The HTTP boundary maps these to status codes; the variants themselves carry
/// no identity or token detail so they are safe to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Input failed a static precondition (for example a short password).
    #[error("{0}")]
    PolicyViolation(String),
    /// Unknown identity or wrong password. The two are never distinguished.
    #[error("incorrect username or password")]
    BadCredentials,
    /// Too many consecutive failures for this identity.
    #[error("account temporarily locked")]
    AccountLocked,
    /// Malformed, expired, mis-signed, or mis-addressed token.
    #[error("could not validate credentials")]
    InvalidToken,
    /// Structurally valid token presented to the wrong flow.
    #[error("could not validate credentials")]
    WrongTokenUse,
    /// Token is valid but the backing identity no longer exists.
    #[error("could not validate credentials")]
    UnknownIdentity,
    #[error("internal authentication error")]
    Internal(String),
}

/// Fatal configuration problems detected while building the token keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenConfigError {
    #[error("signing key must be at least {min} bytes, got {len}")]
    KeyTooShort { len: usize, min: usize },
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("token issuer and audience must not be empty")]
    MissingClaimTarget,
}
