use super::{prompt, Oracle, Secret};
use crate::error::{CheckerError, Result};
use crate::types::config::OracleSettings;
use crate::types::summary::RawAnalysis;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const BACKOFF_MULTIPLIER: u32 = 2;
const ERROR_BODY_SNIPPET: usize = 200;

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

/// Gemini `generateContent` client with per-attempt timeout and bounded
/// retry on rate limits, server errors and transport failures.
pub struct GeminiClient {
    http: reqwest::Client,
    settings: OracleSettings,
    api_key: Secret,
}

impl GeminiClient {
    pub fn new(settings: OracleSettings, api_key: Secret) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("quality-checker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckerError::Oracle(format!("cannot build http client: {e}")))?;
        Ok(Self {
            http,
            settings,
            api_key,
        })
    }

    /// Reads the credential from the environment variable named in settings.
    pub fn from_settings(settings: OracleSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Secret::new)
            .ok_or_else(|| CheckerError::MissingCredential(settings.api_key_env.clone()))?;
        Self::new(settings, api_key)
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn send_once(
        &self,
        url: &str,
        request: &GenerateRequest,
    ) -> std::result::Result<String, AttemptError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Retryable(format!("cannot read response body: {e}")))?;

        if status.is_success() {
            return response_text(&body).map_err(AttemptError::Fatal);
        }

        let snippet = body.chars().take(ERROR_BODY_SNIPPET).collect::<String>();
        let message = match status.as_u16() {
            401 | 403 => format!("credential rejected ({status})"),
            _ => format!("oracle returned {status}: {snippet}"),
        };
        if status.as_u16() == 429 || status.is_server_error() {
            Err(AttemptError::Retryable(message))
        } else {
            Err(AttemptError::Fatal(message))
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.settings
            .initial_backoff
            .saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(attempt))
    }
}

/// First candidate's first text part, or the raw body when the response
/// carries no text.
fn response_text(body: &str) -> std::result::Result<String, String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed oracle response: {e}"))?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);
    Ok(text.unwrap_or_else(|| body.to_string()))
}

#[async_trait]
impl Oracle for GeminiClient {
    async fn analyze(&self, corpus_text: &str) -> Result<RawAnalysis> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt::build_prompt(corpus_text)),
                }],
            }],
        };
        let url = self.url();
        let timeout = self.settings.timeout;

        let mut attempt: u32 = 0;
        loop {
            tracing::debug!(attempt, model = %self.settings.model, "sending analysis request");
            let failure = match tokio::time::timeout(timeout, self.send_once(&url, &request)).await
            {
                Ok(Ok(text)) => {
                    tracing::info!(attempt, chars = text.len(), "analysis response received");
                    return Ok(RawAnalysis { text });
                }
                Ok(Err(AttemptError::Fatal(message))) => {
                    return Err(CheckerError::Oracle(message));
                }
                Ok(Err(AttemptError::Retryable(message))) => CheckerError::Oracle(message),
                Err(_) => CheckerError::OracleTimeout(timeout),
            };

            if attempt >= self.settings.max_retries {
                return Err(failure);
            }
            let delay = self.backoff(attempt);
            attempt += 1;
            tracing::warn!(
                error = %failure,
                attempt,
                max_retries = self.settings.max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying analysis request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
