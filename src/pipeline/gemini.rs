//! Google Gemini text-generation client.
//!
//! Talks to the Generative Language REST API directly with `reqwest`:
//!
//! ```text
//! POST {endpoint}/models/{model}:generateContent
//! x-goog-api-key: <key>
//! {"contents":[{"role":"user","parts":[{"text":"<prompt>"}]}]}
//! ```
//!
//! The key comes from [`ExtractionConfig::api_key`], fixed at construction.
//! When it is the placeholder the request is still sent and the service
//! rejects it; the failure surfaces as [`RfpError::ModelApi`].

use crate::config::ExtractionConfig;
use crate::error::RfpError;
use crate::pipeline::llm::{ModelInvoker, ModelMessage, ModelResponse};
use crate::prompts::Prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini client bound to one model and one credential.
pub struct GeminiInvoker {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<usize>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: String,
}

impl GeminiInvoker {
    /// Build a client from the config. No request is sent.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, RfpError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RfpError::Internal(format!("Failed to build HTTP client: {e}")))?;

        if config.api_key.is_placeholder() {
            warn!("GOOGLE_API_KEY is not set; requests will be sent with a placeholder key");
        }

        let generation_config = if config.temperature.is_some() || config.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
            })
        } else {
            None
        };

        Ok(Self {
            client,
            url: generate_url(&config.endpoint, &config.model),
            model: config.model.clone(),
            api_key: config.api_key.expose().to_string(),
            generation_config,
        })
    }
}

#[async_trait]
impl ModelInvoker for GeminiInvoker {
    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<ModelResponse, RfpError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.as_str(),
                }],
            }],
            generation_config: self.generation_config.clone(),
        };

        debug!("POST {} ({} prompt bytes)", self.url, prompt.len());

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RfpError::ModelRequest {
                message: if e.is_timeout() {
                    format!("Gemini request timed out: {e}")
                } else {
                    format!("Gemini request failed: {e}")
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RfpError::ModelRequest {
            message: format!("Failed to read Gemini response: {e}"),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<GenerateResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(RfpError::ModelApi {
                status: status.as_u16(),
                detail,
            });
        }

        parse_generate_response(&body, &self.model)
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

/// Turn a 2xx body into a [`ModelResponse`].
///
/// Text parts of the first candidate are joined. A candidate with no text
/// (blocked by safety filters, for instance) yields empty content rather
/// than an error; the parser then reports that no JSON was found.
fn parse_generate_response(body: &str, model: &str) -> Result<ModelResponse, RfpError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| RfpError::ModelApi {
            status: 200,
            detail: format!("Unreadable Gemini response: {e}"),
        })?;

    if let Some(err) = parsed.error {
        return Err(RfpError::ModelApi {
            status: err.code.unwrap_or(200),
            detail: err.message,
        });
    }

    let candidate = parsed.candidates.and_then(|c| c.into_iter().next());
    if let Some(reason) = candidate.as_ref().and_then(|c| c.finish_reason.as_deref()) {
        if reason != "STOP" {
            warn!("Gemini finished with reason {}", reason);
        }
    }

    let content = candidate
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = parsed.usage_metadata;
    Ok(ModelResponse::Message(ModelMessage {
        content,
        model: Some(parsed.model_version.unwrap_or_else(|| model.to_string())),
        input_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
        output_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
    }))
}
