//! # Finauth (Authentication & AI Analysis API)
//!
//! `finauth` issues and verifies bearer tokens for the fintech platform and
//! fronts a single AI text-analysis endpoint.
//!
//! ## Authentication
//!
//! Passwords are verified against bcrypt hashes held in a read-only credential
//! store. A successful login returns a short-lived **access token** and a
//! longer-lived **refresh token**; both are HMAC-signed JWTs carrying a `type`
//! claim so neither can be used in the other's flow.
//!
//! - **Lockout:** 5 consecutive failures (configurable) lock an identity for a
//!   cooldown (15 minutes by default). Counters are in memory only.
//! - **Stateless tokens:** there is no revocation list; logout is client-side.
//!
//! ## Analysis
//!
//! `POST /analyze` requires an access token and forwards the description to an
//! OpenAI-compatible API. Descriptions shorter than 10 characters are rejected.

pub mod analysis;
pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
