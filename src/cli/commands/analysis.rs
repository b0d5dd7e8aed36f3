use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::analysis::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};

pub const ARG_OPENAI_API_KEY: &str = "openai-api-key";
pub const ARG_OPENAI_BASE_URL: &str = "openai-base-url";
pub const ARG_OPENAI_MODEL: &str = "openai-model";

#[derive(Debug, Clone)]
pub struct Options {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

impl Options {
    /// Parse analysis arguments. A missing API key is not an error here.
    ///
    /// # Errors
    /// Returns an error if the base URL is not a valid URL.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let base_url = get_non_empty(ARG_OPENAI_BASE_URL)
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|err| anyhow::anyhow!("invalid --{ARG_OPENAI_BASE_URL} {base_url}: {err}"))?;

        Ok(Self {
            api_key: get_non_empty(ARG_OPENAI_API_KEY).map(SecretString::from),
            base_url,
            model: get_non_empty(ARG_OPENAI_MODEL)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OPENAI_API_KEY)
                .long(ARG_OPENAI_API_KEY)
                .help("API key for the text analysis provider")
                .env("OPENAI_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_OPENAI_BASE_URL)
                .long(ARG_OPENAI_BASE_URL)
                .help("Base URL of the OpenAI-compatible API")
                .env("FINAUTH_OPENAI_BASE_URL")
                .default_value(DEFAULT_OPENAI_BASE_URL),
        )
        .arg(
            Arg::new(ARG_OPENAI_MODEL)
                .long(ARG_OPENAI_MODEL)
                .help("Model used for text analysis")
                .env("FINAUTH_OPENAI_MODEL")
                .default_value(DEFAULT_OPENAI_MODEL),
        )
}
