//! AI text analysis passthrough.
//!
//! The HTTP layer only sees [`TextAnalyzer`]; the bundled implementation
//! forwards the text to an OpenAI-compatible chat completions endpoint and
//! returns the first choice verbatim.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::APP_USER_AGENT;

pub const MIN_TEXT_LENGTH: usize = 10;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),
    #[error("text analysis is not configured")]
    NotConfigured,
    #[error("text analysis failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<String, AnalysisError>;
}

/// Check the length precondition, then delegate to `analyzer`.
///
/// # Errors
/// Returns `AnalysisError::Validation` if the trimmed text is shorter than
/// [`MIN_TEXT_LENGTH`] characters, otherwise whatever the analyzer returns.
pub async fn analyze(analyzer: &dyn TextAnalyzer, text: &str) -> Result<String, AnalysisError> {
    if text.trim().chars().count() < MIN_TEXT_LENGTH {
        return Err(AnalysisError::Validation(format!(
            "text must be at least {MIN_TEXT_LENGTH} characters long"
        )));
    }
    analyzer.analyze(text).await
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

pub struct OpenAiAnalyzer {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

impl OpenAiAnalyzer {
    /// A missing key is accepted here and reported on the first call.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: Option<SecretString>, base_url: &str, model: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for OpenAiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAnalyzer")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextAnalyzer for OpenAiAnalyzer {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn analyze(&self, text: &str) -> Result<String, AnalysisError> {
        let Some(api_key) = &self.api_key else {
            error!("OpenAI API key not configured");
            return Err(AnalysisError::NotConfigured);
        };

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: text,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                error!("Error calling analysis endpoint: {err}");
                AnalysisError::Upstream("request failed".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Analysis endpoint returned {status}");
            return Err(AnalysisError::Upstream(format!("upstream status {status}")));
        }

        let body: ChatResponse = response.json().await.map_err(|err| {
            error!("Invalid analysis response: {err}");
            AnalysisError::Upstream("invalid response".to_string())
        })?;

        let result = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnalysisError::Upstream("empty response".to_string()))?;

        debug!(chars = result.len(), "analysis completed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::net::TcpListener;

    struct CountingAnalyzer(Arc<AtomicUsize>);

    #[async_trait]
    impl TextAnalyzer for CountingAnalyzer {
        async fn analyze(&self, text: &str) -> Result<String, AnalysisError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_uppercase())
        }
    }

    async fn mock_openai(reply: Value) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(format!("http://{addr}/v1"))
    }

    #[tokio::test]
    async fn short_text_is_rejected_before_the_analyzer_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = CountingAnalyzer(calls.clone());
        let result = analyze(&analyzer, "   short    ").await;
        assert!(matches!(result, Err(AnalysisError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ten_characters_pass_the_precondition() {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = CountingAnalyzer(calls.clone());
        assert_eq!(
            analyze(&analyzer, " 0123456789 ").await,
            Ok(" 0123456789 ".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_key_fails_the_call() -> Result<()> {
        let analyzer = OpenAiAnalyzer::new(None, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL)?;
        assert!(!analyzer.is_configured());
        assert_eq!(
            analyze(&analyzer, "a long enough description").await,
            Err(AnalysisError::NotConfigured)
        );
        Ok(())
    }

    #[tokio::test]
    async fn returns_first_choice_content() -> Result<()> {
        let base_url = mock_openai(json!({
            "choices": [{"message": {"role": "assistant", "content": "low risk profile"}}]
        }))
        .await?;
        let analyzer =
            OpenAiAnalyzer::new(Some(SecretString::from("sk-test")), &base_url, "test-model")?;
        assert_eq!(
            analyzer.analyze("describe my spending habits").await,
            Ok("low risk profile".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_choices_is_an_upstream_error() -> Result<()> {
        let base_url = mock_openai(json!({ "choices": [] })).await?;
        let analyzer =
            OpenAiAnalyzer::new(Some(SecretString::from("sk-test")), &base_url, "test-model")?;
        assert!(matches!(
            analyzer.analyze("describe my spending habits").await,
            Err(AnalysisError::Upstream(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_upstream_error() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);
        let analyzer = OpenAiAnalyzer::new(
            Some(SecretString::from("sk-test")),
            &format!("http://{addr}/v1"),
            "test-model",
        )?;
        assert!(matches!(
            analyzer.analyze("describe my spending habits").await,
            Err(AnalysisError::Upstream(_))
        ));
        Ok(())
    }

    #[test]
    fn debug_redacts_api_key() -> Result<()> {
        let analyzer = OpenAiAnalyzer::new(
            Some(SecretString::from("sk-very-secret")),
            DEFAULT_OPENAI_BASE_URL,
            DEFAULT_OPENAI_MODEL,
        )?;
        let rendered = format!("{analyzer:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("***"));
        Ok(())
    }
}
