//! Session facade: the only entry points the HTTP layer calls.
//!
//! Flow Overview:
//! - login: lockout check, store lookup, password check, counter update.
//! - issuance: one access and one refresh token for the identity key.
//! - refresh: refresh-typed token in, fresh access token out.
//! - current user: access-typed token in, still-existing identity out.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use super::{
    attempts::AttemptTracker,
    error::AuthError,
    password::PasswordVerifier,
    store::{normalize_key, CredentialStore, Identity},
    tokens::{TokenIssuer, TokenValidator},
};

pub const TOKEN_TYPE_BEARER: &str = "bearer";

#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_seconds: u64,
}

pub struct SessionFacade {
    store: Arc<dyn CredentialStore>,
    verifier: PasswordVerifier,
    attempts: AttemptTracker,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl SessionFacade {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: PasswordVerifier,
        attempts: AttemptTracker,
        issuer: TokenIssuer,
        validator: TokenValidator,
    ) -> Self {
        Self {
            store,
            verifier,
            attempts,
            issuer,
            validator,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> &AttemptTracker {
        &self.attempts
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> u64 {
        self.issuer.access_ttl().as_secs()
    }

    /// Verify credentials for `identity_key`.
    ///
    /// A lookup miss, a wrong password, and a password that fails the length
    /// policy all count as one failure and return the same error. A miss is
    /// checked against a decoy hash so it takes as long as a mismatch.
    ///
    /// # Errors
    /// - `PolicyViolation` for a blank identity key (not counted).
    /// - `AccountLocked` while the identity is locked; the store is not touched.
    /// - `BadCredentials` for any verification failure.
    #[instrument(skip(self, plaintext))]
    pub fn authenticate(&self, identity_key: &str, plaintext: &str) -> Result<Identity, AuthError> {
        let key = normalize_key(identity_key);
        if key.is_empty() {
            return Err(AuthError::PolicyViolation(
                "identity key must not be empty".to_string(),
            ));
        }

        if self.attempts.is_locked(&key) {
            warn!(identity = %key, "login rejected: identity locked");
            return Err(AuthError::AccountLocked);
        }

        let candidate = self.store.find(&key);
        let stored_hash = match &candidate {
            Some(identity) => identity.password_hash.clone(),
            None => {
                debug!(identity = %key, "no such identity");
                self.verifier.decoy_hash()
            }
        };

        let matched = match self.verifier.verify(plaintext, &stored_hash) {
            Ok(matched) => matched,
            Err(AuthError::PolicyViolation(reason)) => {
                debug!(identity = %key, "password failed policy: {reason}");
                false
            }
            Err(err) => return Err(err),
        };
        let verified = candidate.filter(|_| matched);

        if let Some(identity) = verified {
            self.attempts.record_success(&key);
            info!(identity = %key, "login succeeded");
            Ok(identity)
        } else {
            let failures = self.attempts.record_failure(&key);
            warn!(identity = %key, failures, "login failed");
            Err(AuthError::BadCredentials)
        }
    }

    /// Issue an access/refresh pair with the identity key as subject.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_session(&self, identity: &Identity) -> Result<SessionTokens, AuthError> {
        self.issue_session_with_claims(identity, None)
    }

    /// Like [`Self::issue_session`], with extra claims on the access token.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_session_with_claims(
        &self,
        identity: &Identity,
        extra_claims: Option<Map<String, Value>>,
    ) -> Result<SessionTokens, AuthError> {
        let access_token = self
            .issuer
            .issue_access(&identity.identity_key, extra_claims)?;
        let refresh_token = self.issuer.issue_refresh(&identity.identity_key)?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in_seconds: self.access_ttl_seconds(),
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// # Errors
    /// - `InvalidToken` if the token fails validation.
    /// - `WrongTokenUse` if it is not a refresh token.
    /// - `UnknownIdentity` if the subject no longer exists.
    pub fn refresh_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validator.validate(refresh_token)?;
        TokenValidator::require_refresh_type(&claims)?;
        let identity = self.lookup_subject(&claims.sub)?;
        debug!(identity = %identity.identity_key, "access token refreshed");
        self.issuer.issue_access(&identity.identity_key, None)
    }

    /// Resolve the identity behind an access token.
    ///
    /// # Errors
    /// - `InvalidToken` if the token fails validation.
    /// - `WrongTokenUse` for refresh tokens.
    /// - `UnknownIdentity` if the subject no longer exists.
    pub fn resolve_current_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self.validator.validate(access_token)?;
        TokenValidator::reject_if_refresh_type(&claims)?;
        self.lookup_subject(&claims.sub)
    }

    /// Clear the failure counter for an identity.
    pub fn unlock(&self, identity_key: &str) {
        self.attempts.reset(&normalize_key(identity_key));
    }

    fn lookup_subject(&self, subject: &str) -> Result<Identity, AuthError> {
        self.store.find(subject).ok_or_else(|| {
            warn!(identity = subject, "token subject no longer exists");
            AuthError::UnknownIdentity
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        store::{DEMO_IDENTITY_KEY, DEMO_PASSWORD, InMemoryCredentialStore},
        tokens::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, TokenKeys},
    };
    use anyhow::Result;
    use std::time::{Duration, Instant};

    const SECRET: &[u8] = b"an-hmac-secret-of-at-least-32-bytes!";

    struct Fixture {
        facade: SessionFacade,
        validator: TokenValidator,
        issuer: TokenIssuer,
    }

    fn fixture() -> Result<Fixture> {
        let verifier = PasswordVerifier::new(4)?;
        let store = InMemoryCredentialStore::new().with_demo_identity(&verifier)?;
        fixture_with_store(Arc::new(store), verifier)
    }

    fn fixture_with_store(
        store: Arc<dyn CredentialStore>,
        verifier: PasswordVerifier,
    ) -> Result<Fixture> {
        let keys = Arc::new(TokenKeys::from_secret(
            SECRET,
            "HS256",
            "finauth",
            "finauth-api",
        )?);
        let issuer = TokenIssuer::new(keys.clone(), DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL);
        let validator = TokenValidator::new(keys);
        let facade = SessionFacade::new(
            store,
            verifier,
            AttemptTracker::new(5, Duration::ZERO),
            issuer.clone(),
            validator.clone(),
        );
        Ok(Fixture {
            facade,
            validator,
            issuer,
        })
    }

    #[test]
    fn demo_login_succeeds() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        assert_eq!(identity.identity_key, DEMO_IDENTITY_KEY);
        assert_eq!(identity.display_name, "Demo User");
        Ok(())
    }

    #[test]
    fn five_failures_lock_even_the_correct_password() -> Result<()> {
        let fx = fixture()?;
        for _ in 0..5 {
            assert_eq!(
                fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong"),
                Err(AuthError::BadCredentials)
            );
        }
        assert_eq!(
            fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD),
            Err(AuthError::AccountLocked)
        );
        Ok(())
    }

    #[test]
    fn success_resets_the_counter() -> Result<()> {
        let fx = fixture()?;
        for _ in 0..4 {
            let _ = fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong password");
        }
        fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        assert_eq!(fx.facade.attempts().failures(DEMO_IDENTITY_KEY), 0);

        for _ in 0..4 {
            let _ = fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong password");
        }
        assert!(fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD).is_ok());
        Ok(())
    }

    #[test]
    fn unknown_identity_is_bad_credentials_and_counts() -> Result<()> {
        let fx = fixture()?;
        assert_eq!(
            fx.facade.authenticate("ghost@example.com", "whatever123"),
            Err(AuthError::BadCredentials)
        );
        assert_eq!(fx.facade.attempts().failures("ghost@example.com"), 1);
        Ok(())
    }

    #[test]
    fn unknown_identity_costs_a_full_hash_round() -> Result<()> {
        let verifier = PasswordVerifier::new(10)?;
        let store = InMemoryCredentialStore::new().with_demo_identity(&verifier)?;
        let fx = fixture_with_store(Arc::new(store), verifier)?;

        let started = Instant::now();
        for _ in 0..3 {
            assert_eq!(
                fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong password"),
                Err(AuthError::BadCredentials)
            );
        }
        let mismatch = started.elapsed();

        let started = Instant::now();
        for _ in 0..3 {
            assert_eq!(
                fx.facade.authenticate("ghost@example.com", "wrong password"),
                Err(AuthError::BadCredentials)
            );
        }
        let miss = started.elapsed();

        assert!(
            miss * 3 >= mismatch,
            "miss took {miss:?}, mismatch took {mismatch:?}"
        );
        Ok(())
    }

    #[test]
    fn concurrent_failures_lock_the_identity() -> Result<()> {
        let fx = fixture()?;
        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong password"))
                })
                .collect();
            handles.into_iter().map(|handle| handle.join()).collect()
        });

        let mut rejected = 0;
        for outcome in outcomes {
            match outcome {
                Ok(Err(AuthError::BadCredentials)) => rejected += 1,
                Ok(Err(AuthError::AccountLocked)) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert!(rejected >= 5, "only {rejected} failures were counted");
        assert_eq!(fx.facade.attempts().failures(DEMO_IDENTITY_KEY), rejected);
        assert_eq!(
            fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD),
            Err(AuthError::AccountLocked)
        );
        Ok(())
    }

    #[test]
    fn blank_identity_key_is_a_policy_violation() -> Result<()> {
        let fx = fixture()?;
        assert!(matches!(
            fx.facade.authenticate("   ", DEMO_PASSWORD),
            Err(AuthError::PolicyViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn identity_key_is_normalized() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(" Demo@Fintech.com ", DEMO_PASSWORD)?;
        assert_eq!(identity.identity_key, DEMO_IDENTITY_KEY);
        Ok(())
    }

    #[test]
    fn unlock_clears_a_lock() -> Result<()> {
        let fx = fixture()?;
        for _ in 0..5 {
            let _ = fx.facade.authenticate(DEMO_IDENTITY_KEY, "wrong");
        }
        fx.facade.unlock("DEMO@fintech.com");
        assert!(fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD).is_ok());
        Ok(())
    }

    #[test]
    fn issued_access_token_resolves_to_same_identity() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        let tokens = fx.facade.issue_session(&identity)?;
        assert_eq!(tokens.token_type, "bearer");
        assert_eq!(tokens.expires_in_seconds, 900);
        let resolved = fx.facade.resolve_current_user(&tokens.access_token)?;
        assert_eq!(resolved, identity);
        Ok(())
    }

    #[test]
    fn token_kinds_cannot_be_swapped() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        let tokens = fx.facade.issue_session(&identity)?;
        assert_eq!(
            fx.facade.resolve_current_user(&tokens.refresh_token),
            Err(AuthError::WrongTokenUse)
        );
        assert_eq!(
            fx.facade.refresh_access(&tokens.access_token),
            Err(AuthError::WrongTokenUse)
        );
        Ok(())
    }

    #[test]
    fn refresh_mints_a_distinct_access_token_for_the_same_subject() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        let tokens = fx.facade.issue_session(&identity)?;
        let refreshed = fx.facade.refresh_access(&tokens.refresh_token)?;
        assert_ne!(refreshed, tokens.access_token);
        let claims = fx.validator.validate(&refreshed)?;
        assert_eq!(claims.sub, identity.identity_key);
        Ok(())
    }

    #[test]
    fn extra_claims_reach_the_access_token_only() -> Result<()> {
        let fx = fixture()?;
        let identity = fx.facade.authenticate(DEMO_IDENTITY_KEY, DEMO_PASSWORD)?;
        let mut extra = Map::new();
        extra.insert("name".to_string(), Value::from(identity.display_name.clone()));
        let tokens = fx.facade.issue_session_with_claims(&identity, Some(extra))?;
        let access = fx.validator.validate(&tokens.access_token)?;
        let refresh = fx.validator.validate(&tokens.refresh_token)?;
        assert_eq!(access.extra.get("name"), Some(&Value::from("Demo User")));
        assert!(refresh.extra.is_empty());
        Ok(())
    }

    #[test]
    fn deleted_identity_is_unknown() -> Result<()> {
        let verifier = PasswordVerifier::new(4)?;
        let fx = fixture_with_store(Arc::new(InMemoryCredentialStore::new()), verifier)?;
        let access = fx.issuer.issue_access("gone@example.com", None)?;
        let refresh = fx.issuer.issue_refresh("gone@example.com")?;
        assert_eq!(
            fx.facade.resolve_current_user(&access),
            Err(AuthError::UnknownIdentity)
        );
        assert_eq!(
            fx.facade.refresh_access(&refresh),
            Err(AuthError::UnknownIdentity)
        );
        Ok(())
    }

    #[test]
    fn expired_tokens_are_invalid() -> Result<()> {
        let fx = fixture()?;
        let token = fx
            .issuer
            .issue_access_with_ttl(DEMO_IDENTITY_KEY, None, Duration::ZERO)?;
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(
            fx.facade.resolve_current_user(&token),
            Err(AuthError::InvalidToken)
        );
        Ok(())
    }
}
