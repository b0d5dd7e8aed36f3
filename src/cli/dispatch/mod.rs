//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action, such as starting the API server
//! with its token, lockout, store and analysis configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{analysis, auth, ARG_ALLOWED_ORIGIN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let allowed_origin = matches
        .get_one::<String>(ARG_ALLOWED_ORIGIN)
        .cloned()
        .filter(|v| !v.trim().is_empty());

    let auth_opts = auth::Options::parse(matches)?;
    let analysis_opts = analysis::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        allowed_origin,
        signing_key: auth_opts.signing_key,
        algorithm: auth_opts.algorithm,
        access_ttl_minutes: auth_opts.access_ttl_minutes,
        refresh_ttl_days: auth_opts.refresh_ttl_days,
        token_issuer: auth_opts.issuer,
        token_audience: auth_opts.audience,
        lockout_threshold: auth_opts.lockout_threshold,
        lockout_cooldown_seconds: auth_opts.lockout_cooldown_seconds,
        bcrypt_cost: auth_opts.bcrypt_cost,
        users_file: auth_opts.users_file,
        demo_user: auth_opts.demo_user,
        openai_api_key: analysis_opts.api_key,
        openai_base_url: analysis_opts.base_url,
        openai_model: analysis_opts.model,
    }))
}
