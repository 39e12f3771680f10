//! Configuration types for RFP extraction.
//!
//! Everything an extraction run needs (model choice, credential, prompt
//! template, pdfium location) lives in one [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The configuration is read once, at startup,
//! and then shared read-only; the model invoker receives its credential from
//! here instead of reading the environment on its own.

use crate::error::RfpError;
use crate::pipeline::llm::ModelInvoker;
use crate::progress::ProgressCallback;
use crate::prompts::DOCUMENT_TEXT_PLACEHOLDER;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the Gemini credential.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Substituted when [`API_KEY_ENV`] is absent. Requests then fail with an
/// authentication error from the service instead of at startup.
pub const PLACEHOLDER_API_KEY: &str = "API_KEY";

/// Environment variable pointing at the pdfium library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A model-service credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read [`API_KEY_ENV`], falling back to [`PLACEHOLDER_API_KEY`].
    pub fn from_env() -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(k) if !k.is_empty() => Self(k),
            _ => Self(PLACEHOLDER_API_KEY.to_string()),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_API_KEY
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_placeholder() {
            f.write_str("ApiKey(<placeholder>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

/// Which text-generation service answers the prompt.
#[derive(Clone, Default)]
pub enum ModelBackend {
    /// Google Gemini over its REST API (default).
    #[default]
    Gemini,
    /// A provider known to `edgequake-llm` (`"openai"`, `"anthropic"`, `"ollama"`, …).
    /// The provider reads its own API key variable.
    Provider(String),
    /// A caller-supplied invoker. Takes precedence over everything else.
    Custom(Arc<dyn ModelInvoker>),
}

impl fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelBackend::Gemini => f.write_str("Gemini"),
            ModelBackend::Provider(name) => f.debug_tuple("Provider").field(name).finish(),
            ModelBackend::Custom(_) => f.write_str("Custom(<dyn ModelInvoker>)"),
        }
    }
}

impl ModelBackend {
    /// Parse a `--provider` value. `gemini` (any case) selects the native client.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("gemini") {
            ModelBackend::Gemini
        } else {
            ModelBackend::Provider(name.to_string())
        }
    }
}

/// Configuration for one extraction pipeline.
///
/// # Example
/// ```rust
/// use rfp_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-1.5-pro")
///     .api_key("test-key")
///     .request_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-pro");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier. Default: `gemini-1.5-flash`.
    pub model: String,

    /// Service used to answer the prompt. Default: [`ModelBackend::Gemini`].
    pub backend: ModelBackend,

    /// Credential for the Gemini backend.
    pub api_key: ApiKey,

    /// Base URL of the Gemini REST API.
    pub endpoint: String,

    /// Sampling temperature. `None` leaves the service default in place.
    pub temperature: Option<f32>,

    /// Output-token cap. `None` leaves the service default in place.
    pub max_tokens: Option<usize>,

    /// Per-request timeout for the model call.
    ///
    /// `None` (the default) waits for the service indefinitely.
    pub request_timeout_secs: Option<u64>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom prompt template. Must contain
    /// [`DOCUMENT_TEXT_PLACEHOLDER`] exactly once. If None, uses the built-in template.
    pub prompt_template: Option<String>,

    /// pdfium library file or directory. If None, the working directory and
    /// then the system library path are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives stage events and user-reported failures.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            backend: ModelBackend::default(),
            api_key: ApiKey::new(PLACEHOLDER_API_KEY),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout_secs: None,
            password: None,
            prompt_template: None,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("backend", &self.backend)
            .field("api_key", &self.api_key)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("prompt_template", &self.prompt_template.as_ref().map(|t| t.len()))
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults plus the two environment-sourced values: [`API_KEY_ENV`] and
    /// [`PDFIUM_LIB_ENV`]. Call once at startup.
    pub fn from_env() -> Self {
        Self {
            api_key: ApiKey::from_env(),
            pdfium_lib_path: std::env::var_os(PDFIUM_LIB_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            ..Self::default()
        }
    }

    /// The template in effect: the custom one if set, else the built-in one.
    pub fn template(&self) -> &str {
        self.prompt_template
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_TEMPLATE)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Start from [`ExtractionConfig::from_env`] instead of bare defaults.
    pub fn from_env() -> Self {
        Self {
            config: ExtractionConfig::from_env(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn backend(mut self, backend: ModelBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.config.backend = ModelBackend::Custom(invoker);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = ApiKey::new(key);
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, RfpError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(RfpError::InvalidConfig("Model id must not be empty".into()));
        }
        if matches!(c.backend, ModelBackend::Gemini) && !c.endpoint.starts_with("http") {
            return Err(RfpError::InvalidConfig(format!(
                "Gemini endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(RfpError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref t) = c.prompt_template {
            let n = t.matches(DOCUMENT_TEXT_PLACEHOLDER).count();
            if n != 1 {
                return Err(RfpError::InvalidConfig(format!(
                    "Prompt template must contain {} exactly once (found {})",
                    DOCUMENT_TEXT_PLACEHOLDER, n
                )));
            }
        }
        Ok(self.config)
    }
}
