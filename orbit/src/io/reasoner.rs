//! Reasoning-service abstraction and the Gemini HTTP backend.
//!
//! The [`Reasoner`] trait decouples planning from the actual text-generation
//! backend. Tests use scripted reasoners that return predetermined responses
//! or failures without touching the network.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::OrbitConfig;

/// "Generate text from prompt" capability.
pub trait Reasoner {
    /// Send `prompt` and return the raw text of the reply.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Failure reported by the reasoning service itself.
///
/// Carries the HTTP status so retry classification does not depend on
/// message wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{status}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ServiceError {}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Credential header accepted by the Generative Language API.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Reasoner backed by the Generative Language `generateContent` endpoint.
pub struct GeminiReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiReasoner {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Build from config, reading the credential from the environment.
    pub fn from_config(config: &OrbitConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.request_timeout(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl Reasoner for GeminiReasoner {
    #[instrument(skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!("sending generateContent request");
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().context("read response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            debug!(status = status.as_u16(), "reasoning service returned an error");
            return Err(ServiceError::new(Some(status.as_u16()), message).into());
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("parse generateContent response")?;
        response_text(parsed)
    }
}

/// The request URL never reaches the message, so nothing sent with the
/// request can leak into logs or retry notices.
fn transport_error(err: reqwest::Error) -> ServiceError {
    let err = err.without_url();
    ServiceError::new(err.status().map(|s| s.as_u16()), format!("{err:#}"))
}

fn response_text(response: GenerateResponse) -> Result<String> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| ServiceError::new(None, "no candidates in response"))?;
    Ok(content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[{\"type\":"},{"text":"\"shell\",\"command\":\"ls\"}]"}]},"finishReason":"STOP"}]}"#,
        )
        .expect("parse");
        assert_eq!(
            response_text(parsed).expect("text"),
            r#"[{"type":"shell","command":"ls"}]"#
        );
    }

    #[test]
    fn response_without_candidates_is_error() {
        let parsed: GenerateResponse = serde_json::from_str("{}").expect("parse");
        let err = response_text(parsed).unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn service_error_display_includes_status() {
        let err = ServiceError::new(Some(503), "The model is overloaded.");
        assert_eq!(err.to_string(), "[503] The model is overloaded.");
        assert_eq!(ServiceError::new(None, "boom").to_string(), "boom");
    }

    #[test]
    fn transport_error_does_not_expose_credential() {
        let secret = "sk-SECRET-429";
        let reasoner = GeminiReasoner::new(
            "http://127.0.0.1:9",
            "m",
            secret.to_string(),
            Duration::from_secs(2),
        )
        .expect("reasoner");

        let err = reasoner.generate("hi").expect_err("nothing listens on port 9");

        let rendered = format!("{err:#}");
        assert!(!rendered.contains(secret), "{rendered}");
        assert!(!reasoner.endpoint().contains(secret));
    }

    #[test]
    fn endpoint_uses_model_and_trims_slash() {
        let reasoner = GeminiReasoner::new(
            "https://example.test/",
            "gemini-test",
            "key".to_string(),
            Duration::from_secs(5),
        )
        .expect("reasoner");
        assert_eq!(
            reasoner.endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }
}
