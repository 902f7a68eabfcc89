use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

#[cfg(feature = "ai-providers")]
pub mod claude;
#[cfg(feature = "ai-providers")]
pub mod openai;
#[cfg(feature = "ai-providers")]
pub mod openrouter;

#[cfg(feature = "ai-providers")]
pub use claude::ClaudeProvider;
#[cfg(feature = "ai-providers")]
pub use openai::OpenAIProvider;
#[cfg(feature = "ai-providers")]
pub use openrouter::OpenRouterProvider;

/// Providers understood by [`create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "openrouter", "claude"];

#[derive(Error, Debug)]
pub enum AIError {
    #[cfg(feature = "ai-providers")]
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Authentication failed")]
    AuthenticationError,
    #[error("Rate limited")]
    RateLimited,
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Model parameters shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Overrides the provider's public endpoint (proxies, gateways).
    pub base_url: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            temperature: crate::config::DEFAULT_TEMPERATURE,
            timeout_secs: 120,
            base_url: None,
        }
    }
}

/// Opaque text-in/text-out analysis service.
///
/// Implementations own transport concerns such as timeouts and retries; the
/// analyzer only sees a prompt going in and text (or an error) coming out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AIError>;
    fn get_provider_name(&self) -> &'static str;
}

/// Name of the environment variable holding the key for `provider_name`.
pub fn api_key_env_var(provider_name: &str) -> String {
    match provider_name.to_lowercase().as_str() {
        "claude" | "anthropic" => "ANTHROPIC_API_KEY".to_string(),
        other => format!("{}_API_KEY", other.to_uppercase()),
    }
}

#[cfg(feature = "ai-providers")]
pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    options: ProviderOptions,
) -> Result<Box<dyn AIProvider>, AIError> {
    info!(
        "Creating AI provider: {} with model: {} (temperature {})",
        provider_name, options.model, options.temperature
    );
    if api_key.trim().is_empty() {
        error!("Empty API key for provider {}", provider_name);
        return Err(AIError::AuthenticationError);
    }
    match provider_name.to_lowercase().as_str() {
        "openai" => {
            debug!("Initializing OpenAI provider");
            Ok(Box::new(OpenAIProvider::new(api_key.to_string(), options)?))
        }
        "openrouter" => {
            debug!("Initializing OpenRouter provider");
            Ok(Box::new(OpenRouterProvider::new(api_key.to_string(), options)?))
        }
        "claude" | "anthropic" => {
            debug!("Initializing Claude/Anthropic provider");
            Ok(Box::new(ClaudeProvider::new(api_key.to_string(), options)?))
        }
        _ => {
            error!("Unsupported AI provider: {}", provider_name);
            Err(AIError::UnsupportedProvider(provider_name.to_string()))
        }
    }
}

#[cfg(not(feature = "ai-providers"))]
pub fn create_provider(
    provider_name: &str,
    _api_key: &str,
    _options: ProviderOptions,
) -> Result<Box<dyn AIProvider>, AIError> {
    error!("Built without the ai-providers feature; cannot create {}", provider_name);
    Err(AIError::Unavailable(format!(
        "{} (built without the ai-providers feature)",
        provider_name
    )))
}

/// Passes successful responses through and turns the rest into an [`AIError`].
#[cfg(feature = "ai-providers")]
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AIError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(status_error(status, &error_text))
}

/// Maps a non-success HTTP status and its body to the matching [`AIError`].
#[cfg(feature = "ai-providers")]
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> AIError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED => AIError::AuthenticationError,
        reqwest::StatusCode::TOO_MANY_REQUESTS => AIError::RateLimited,
        _ => AIError::InvalidResponse(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(feature = "ai-providers")]
pub(crate) fn build_client(options: &ProviderOptions) -> Result<reqwest::Client, AIError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(options.timeout_secs))
        .build()?)
}
