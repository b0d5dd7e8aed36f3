//! Password policy and bcrypt verification.

use anyhow::{anyhow, Result};
use tracing::warn;

use super::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;
/// Salt and digest of a well-formed bcrypt hash; only the cost is swapped in.
const DECOY_SALT_AND_DIGEST: &str = "EGdrhbKUv8Oc9vGiXX0HQOxSg445d458Muh7DAHskb6QbtCvdxcie";

#[derive(Clone, Copy, Debug)]
pub struct PasswordVerifier {
    cost: u32,
}

impl PasswordVerifier {
    /// Build a verifier hashing with the given bcrypt cost.
    ///
    /// # Errors
    /// Returns an error if the cost is outside the range bcrypt accepts.
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(anyhow!(
                "bcrypt cost must be between {} and {}, got {cost}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            ));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Check `plaintext` against a stored bcrypt hash.
    ///
    /// A malformed hash never matches.
    ///
    /// # Errors
    /// Returns `AuthError::PolicyViolation` if the plaintext is shorter than
    /// [`MIN_PASSWORD_LENGTH`] characters, whatever the hash.
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> Result<bool, AuthError> {
        check_policy(plaintext)?;
        match bcrypt::verify(plaintext, stored_hash) {
            Ok(matched) => Ok(matched),
            Err(err) => {
                warn!("Stored password hash could not be parsed: {err}");
                Ok(false)
            }
        }
    }

    /// A parseable hash at this verifier's cost for identities that do not
    /// exist, so a lookup miss still pays for a full bcrypt round.
    #[must_use]
    pub fn decoy_hash(&self) -> String {
        format!("$2b${:02}${DECOY_SALT_AND_DIGEST}", self.cost)
    }

    /// Hash `plaintext` for storage.
    ///
    /// # Errors
    /// Returns `AuthError::PolicyViolation` for short passwords and
    /// `AuthError::Internal` if hashing fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        check_policy(plaintext)?;
        bcrypt::hash(plaintext, self.cost).map_err(|err| AuthError::Internal(err.to_string()))
    }
}

impl Default for PasswordVerifier {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

fn check_policy(plaintext: &str) -> Result<(), AuthError> {
    if plaintext.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PolicyViolation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
