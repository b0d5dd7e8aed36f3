use crate::{
    analysis::{OpenAiAnalyzer, TextAnalyzer},
    api,
    auth::{
        AttemptTracker, InMemoryCredentialStore, PasswordVerifier, SessionFacade, TokenIssuer,
        TokenKeys, TokenValidator,
    },
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub allowed_origin: Option<String>,
    pub signing_key: SecretString,
    pub algorithm: String,
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub token_issuer: String,
    pub token_audience: String,
    pub lockout_threshold: u32,
    pub lockout_cooldown_seconds: u64,
    pub bcrypt_cost: u32,
    pub users_file: Option<String>,
    pub demo_user: bool,
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    pub openai_model: String,
}

/// Build the session facade from the server arguments.
///
/// # Errors
/// Returns an error if the signing key or algorithm is unusable, the bcrypt
/// cost is out of range, or the users file cannot be loaded.
pub fn session_facade(args: &Args) -> Result<SessionFacade> {
    let keys = TokenKeys::from_secret(
        args.signing_key.expose_secret().as_bytes(),
        &args.algorithm,
        &args.token_issuer,
        &args.token_audience,
    )
    .context("Invalid token configuration")?;
    debug!("Token keys: {:?}", keys);
    let keys = Arc::new(keys);

    let verifier = PasswordVerifier::new(args.bcrypt_cost)?;

    let mut store = InMemoryCredentialStore::new();
    if let Some(path) = &args.users_file {
        store = store.with_users_file(Path::new(path))?;
    }
    if args.demo_user {
        store = store.with_demo_identity(&verifier)?;
    }
    if store.is_empty() {
        warn!("Credential store is empty: every login will fail");
    }

    let issuer = TokenIssuer::new(
        keys.clone(),
        Duration::from_secs(args.access_ttl_minutes.saturating_mul(SECONDS_PER_MINUTE)),
        Duration::from_secs(args.refresh_ttl_days.saturating_mul(SECONDS_PER_DAY)),
    );
    let attempts = AttemptTracker::new(
        args.lockout_threshold,
        Duration::from_secs(args.lockout_cooldown_seconds),
    );

    Ok(SessionFacade::new(
        Arc::new(store),
        verifier,
        attempts,
        issuer,
        TokenValidator::new(keys),
    ))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let facade = Arc::new(session_facade(&args)?);

    let analyzer = OpenAiAnalyzer::new(
        args.openai_api_key.clone(),
        &args.openai_base_url,
        &args.openai_model,
    )?;
    if !analyzer.is_configured() {
        info!("OpenAI API key not set: /analyze will answer 503");
    }
    let analyzer: Arc<dyn TextAnalyzer> = Arc::new(analyzer);

    api::new(args.port, args.allowed_origin.as_deref(), facade, analyzer).await
}
