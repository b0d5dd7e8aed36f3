use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{
    attempts::{DEFAULT_LOCKOUT_COOLDOWN, DEFAULT_LOCKOUT_THRESHOLD},
    password::DEFAULT_BCRYPT_COST,
    tokens::{DEFAULT_ALGORITHM, DEFAULT_AUDIENCE, DEFAULT_ISSUER},
};

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ALGORITHM: &str = "jwt-algorithm";
pub const ARG_ACCESS_TTL_MINUTES: &str = "access-ttl-minutes";
pub const ARG_REFRESH_TTL_DAYS: &str = "refresh-ttl-days";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_TOKEN_AUDIENCE: &str = "token-audience";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_LOCKOUT_COOLDOWN_SECONDS: &str = "lockout-cooldown-seconds";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";
pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_DEMO_USER: &str = "demo-user";

#[derive(Debug, Clone)]
pub struct Options {
    pub signing_key: SecretString,
    pub algorithm: String,
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub issuer: String,
    pub audience: String,
    pub lockout_threshold: u32,
    pub lockout_cooldown_seconds: u64,
    pub bcrypt_cost: u32,
    pub users_file: Option<String>,
    pub demo_user: bool,
}

impl Options {
    /// Parse token, lockout and credential store arguments.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let signing_key = matches
            .get_one::<String>(ARG_SIGNING_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.as_str()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SIGNING_KEY}"))?;

        let string_or = |id: &str, default: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            signing_key,
            algorithm: string_or(ARG_ALGORITHM, DEFAULT_ALGORITHM),
            access_ttl_minutes: matches
                .get_one::<u64>(ARG_ACCESS_TTL_MINUTES)
                .copied()
                .unwrap_or(15),
            refresh_ttl_days: matches
                .get_one::<u64>(ARG_REFRESH_TTL_DAYS)
                .copied()
                .unwrap_or(1),
            issuer: string_or(ARG_TOKEN_ISSUER, DEFAULT_ISSUER),
            audience: string_or(ARG_TOKEN_AUDIENCE, DEFAULT_AUDIENCE),
            lockout_threshold: matches
                .get_one::<u32>(ARG_LOCKOUT_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_THRESHOLD),
            lockout_cooldown_seconds: matches
                .get_one::<u64>(ARG_LOCKOUT_COOLDOWN_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_COOLDOWN.as_secs()),
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(DEFAULT_BCRYPT_COST),
            users_file: matches
                .get_one::<String>(ARG_USERS_FILE)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            demo_user: matches.get_flag(ARG_DEMO_USER),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_lockout_args(command);
    with_store_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("HMAC key used to sign tokens (at least 32 bytes)")
                .env("FINAUTH_SIGNING_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ALGORITHM)
                .long(ARG_ALGORITHM)
                .help("Token signing algorithm: HS256, HS384 or HS512")
                .env("FINAUTH_JWT_ALGORITHM")
                .default_value(DEFAULT_ALGORITHM),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_MINUTES)
                .long(ARG_ACCESS_TTL_MINUTES)
                .help("Access token lifetime in minutes")
                .env("FINAUTH_ACCESS_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_DAYS)
                .long(ARG_REFRESH_TTL_DAYS)
                .help("Refresh token lifetime in days")
                .env("FINAUTH_REFRESH_TTL_DAYS")
                .default_value("1")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer (iss) placed in and expected on tokens")
                .env("FINAUTH_TOKEN_ISSUER")
                .default_value(DEFAULT_ISSUER),
        )
        .arg(
            Arg::new(ARG_TOKEN_AUDIENCE)
                .long(ARG_TOKEN_AUDIENCE)
                .help("Audience (aud) placed in and expected on tokens")
                .env("FINAUTH_TOKEN_AUDIENCE")
                .default_value(DEFAULT_AUDIENCE),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long(ARG_LOCKOUT_THRESHOLD)
                .help("Consecutive failed logins before an identity is locked")
                .env("FINAUTH_LOCKOUT_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_COOLDOWN_SECONDS)
                .long(ARG_LOCKOUT_COOLDOWN_SECONDS)
                .help("Seconds a lock lasts (0 keeps it until restart)")
                .env("FINAUTH_LOCKOUT_COOLDOWN_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt cost used when hashing seeded passwords")
                .env("FINAUTH_BCRYPT_COST")
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

fn with_store_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("JSON file with [{email, name, password_hash}] records")
                .env("FINAUTH_USERS_FILE"),
        )
        .arg(
            Arg::new(ARG_DEMO_USER)
                .long(ARG_DEMO_USER)
                .help("Seed the demo@fintech.com identity")
                .env("FINAUTH_DEMO_USER")
                .action(clap::ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("finauth"))
    }

    #[test]
    fn defaults() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("FINAUTH_SIGNING_KEY", None::<&str>),
                ("FINAUTH_JWT_ALGORITHM", None),
                ("FINAUTH_ACCESS_TTL_MINUTES", None),
                ("FINAUTH_REFRESH_TTL_DAYS", None),
                ("FINAUTH_LOCKOUT_THRESHOLD", None),
                ("FINAUTH_LOCKOUT_COOLDOWN_SECONDS", None),
                ("FINAUTH_BCRYPT_COST", None),
                ("FINAUTH_USERS_FILE", None),
                ("FINAUTH_DEMO_USER", None),
            ],
            || {
                let matches = command().try_get_matches_from(vec![
                    "finauth",
                    "--signing-key",
                    "0123456789abcdef0123456789abcdef",
                ])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.algorithm, "HS256");
                assert_eq!(options.access_ttl_minutes, 15);
                assert_eq!(options.refresh_ttl_days, 1);
                assert_eq!(options.issuer, "finauth");
                assert_eq!(options.audience, "finauth-api");
                assert_eq!(options.lockout_threshold, 5);
                assert_eq!(options.lockout_cooldown_seconds, 900);
                assert_eq!(options.bcrypt_cost, 12);
                assert_eq!(options.users_file, None);
                assert!(!options.demo_user);
                Ok(())
            },
        )
    }

    #[test]
    fn from_env() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("FINAUTH_SIGNING_KEY", Some("env-key-env-key-env-key-env-key-!")),
                ("FINAUTH_JWT_ALGORITHM", Some("HS512")),
                ("FINAUTH_ACCESS_TTL_MINUTES", Some("5")),
                ("FINAUTH_REFRESH_TTL_DAYS", Some("7")),
                ("FINAUTH_LOCKOUT_THRESHOLD", Some("3")),
                ("FINAUTH_LOCKOUT_COOLDOWN_SECONDS", Some("0")),
                ("FINAUTH_BCRYPT_COST", Some("10")),
                ("FINAUTH_USERS_FILE", Some("/etc/finauth/users.json")),
                ("FINAUTH_DEMO_USER", Some("true")),
            ],
            || {
                let matches = command().try_get_matches_from(vec!["finauth"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(
                    options.signing_key.expose_secret(),
                    "env-key-env-key-env-key-env-key-!"
                );
                assert_eq!(options.algorithm, "HS512");
                assert_eq!(options.access_ttl_minutes, 5);
                assert_eq!(options.refresh_ttl_days, 7);
                assert_eq!(options.lockout_threshold, 3);
                assert_eq!(options.lockout_cooldown_seconds, 0);
                assert_eq!(options.bcrypt_cost, 10);
                assert_eq!(
                    options.users_file.as_deref(),
                    Some("/etc/finauth/users.json")
                );
                assert!(options.demo_user);
                Ok(())
            },
        )
    }

    #[test]
    fn missing_signing_key_is_an_error() {
        temp_env::with_vars([("FINAUTH_SIGNING_KEY", None::<&str>)], || {
            let result = command()
                .try_get_matches_from(vec!["finauth"])
                .map_err(anyhow::Error::from)
                .and_then(|matches| Options::parse(&matches));
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(
                    err.to_string()
                        .contains("missing required argument: --signing-key")
                );
            }
        });
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let result = command().try_get_matches_from(vec![
            "finauth",
            "--signing-key",
            "k",
            "--lockout-threshold",
            "0",
        ]);
        assert_eq!(
            result.map(|_| ()).map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::ValueValidation)
        );
    }

    #[test]
    fn bcrypt_cost_out_of_range_is_rejected() {
        let result = command().try_get_matches_from(vec![
            "finauth",
            "--signing-key",
            "k",
            "--bcrypt-cost",
            "3",
        ]);
        assert!(result.is_err());
    }
}
