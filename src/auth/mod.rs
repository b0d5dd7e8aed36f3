//! Authentication core.
//!
//! - `store`: read-only identity lookup.
//! - `password`: length policy and bcrypt verification.
//! - `attempts`: consecutive-failure counters and lockout.
//! - `tokens`: signed access/refresh token issuance and validation.
//! - `session`: the facade composing all of the above.
//!
//! Everything is in memory; the HTTP layer only talks to [`SessionFacade`].

pub mod attempts;
pub mod error;
pub mod password;
pub mod session;
pub mod store;
pub mod tokens;

pub use attempts::AttemptTracker;
pub use error::{AuthError, TokenConfigError};
pub use password::PasswordVerifier;
pub use session::{SessionFacade, SessionTokens};
pub use store::{CredentialStore, Identity, InMemoryCredentialStore};
pub use tokens::{Claims, TokenIssuer, TokenKeys, TokenType, TokenValidator};
