//! Model invocation: send the prompt, get raw text back.
//!
//! One prompt, one round trip. There is no retry and no streaming: a failed
//! call fails the request. All prompt engineering lives in
//! [`crate::prompts`]; this module only moves strings over the wire.
//!
//! Two invokers ship with the crate:
//!
//! * [`GeminiInvoker`](crate::pipeline::gemini::GeminiInvoker) — Google
//!   Gemini's REST API, credential injected from the config (default).
//! * [`ProviderInvoker`] — any `edgequake-llm` provider (OpenAI, Anthropic,
//!   Ollama, …), which reads its own API key variable.
//!
//! Anything else (tests, caching layers, in-house gateways) implements
//! [`ModelInvoker`] and is passed in via [`ModelBackend::Custom`].

use crate::config::{ExtractionConfig, ModelBackend};
use crate::error::RfpError;
use crate::pipeline::gemini::GeminiInvoker;
use crate::prompts::Prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What the model sent back.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// Bare text.
    Text(String),
    /// A chat reply wrapping the text together with usage data.
    Message(ModelMessage),
}

/// A structured chat reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMessage {
    pub content: String,
    pub model: Option<String>,
    pub input_tokens: Option<usize>,
    pub output_tokens: Option<usize>,
}

impl ModelResponse {
    /// The textual payload, unwrapped from a [`ModelMessage`] if necessary.
    pub fn content(&self) -> &str {
        match self {
            ModelResponse::Text(t) => t,
            ModelResponse::Message(m) => &m.content,
        }
    }

    pub fn input_tokens(&self) -> Option<usize> {
        match self {
            ModelResponse::Text(_) => None,
            ModelResponse::Message(m) => m.input_tokens,
        }
    }

    pub fn output_tokens(&self) -> Option<usize> {
        match self {
            ModelResponse::Text(_) => None,
            ModelResponse::Message(m) => m.output_tokens,
        }
    }
}

impl From<String> for ModelResponse {
    fn from(s: String) -> Self {
        ModelResponse::Text(s)
    }
}

impl From<&str> for ModelResponse {
    fn from(s: &str) -> Self {
        ModelResponse::Text(s.to_string())
    }
}

/// A text-generation service.
///
/// Implementations must be `Send + Sync`; one invoker is shared by every
/// request of an [`crate::Extractor`].
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Short label for logs, e.g. `"gemini/gemini-1.5-flash"`.
    fn name(&self) -> String;

    /// Send `prompt` and return the raw answer.
    async fn invoke(&self, prompt: &Prompt) -> Result<ModelResponse, RfpError>;
}

/// Adapter from an `edgequake-llm` provider to [`ModelInvoker`].
pub struct ProviderInvoker {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    timeout: Option<Duration>,
}

impl ProviderInvoker {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Create the named provider through `ProviderFactory`.
    pub fn from_name(provider_name: &str, config: &ExtractionConfig) -> Result<Self, RfpError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, &config.model)
            .map_err(|e| RfpError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            })?;
        Ok(Self::new(
            provider,
            format!("{}/{}", provider_name, config.model),
            config,
        ))
    }
}

#[async_trait]
impl ModelInvoker for ProviderInvoker {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<ModelResponse, RfpError> {
        let messages = vec![ChatMessage::user(prompt.as_str())];
        let call = self.provider.chat(&messages, Some(&self.options));

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RfpError::ModelRequest {
                    message: format!("{} timed out after {}s", self.label, limit.as_secs()),
                }
            })?,
            None => call.await,
        };

        let response = result.map_err(|e| RfpError::ModelRequest {
            message: format!("{}: {}", self.label, e),
        })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(ModelResponse::Message(ModelMessage {
            content: response.content,
            model: Some(self.label.clone()),
            input_tokens: Some(response.prompt_tokens as usize),
            output_tokens: Some(response.completion_tokens as usize),
        }))
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

/// Resolve the invoker for `config.backend`.
pub fn build_invoker(config: &ExtractionConfig) -> Result<Arc<dyn ModelInvoker>, RfpError> {
    let invoker: Arc<dyn ModelInvoker> = match &config.backend {
        ModelBackend::Custom(invoker) => Arc::clone(invoker),
        ModelBackend::Gemini => Arc::new(GeminiInvoker::from_config(config)?),
        ModelBackend::Provider(name) => Arc::new(ProviderInvoker::from_name(name, config)?),
    };
    info!("Model backend: {}", invoker.name());
    Ok(invoker)
}

/// Invoke once, timing the call.
pub async fn invoke_timed(
    invoker: &dyn ModelInvoker,
    prompt: &Prompt,
) -> Result<(ModelResponse, u64), RfpError> {
    let start = Instant::now();
    let response = invoker.invoke(prompt).await?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    debug!(
        "{} answered {} chars in {}ms",
        invoker.name(),
        response.content().len(),
        elapsed_ms
    );
    Ok((response, elapsed_ms))
}
