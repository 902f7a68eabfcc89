use crate::ai_provider::{build_client, check_status, AIError, AIProvider, ProviderOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<OpenRouterMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenRouterMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<OpenRouterChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter chat-completions adapter (OpenAI-compatible wire format).
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    options: ProviderOptions,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(&options)?,
            api_key,
            options,
        })
    }
}

fn extract_message_content(body: &str) -> Result<String, AIError> {
    let response: OpenRouterResponse = serde_json::from_str(body)
        .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AIError::InvalidResponse("No choices in response".to_string()))?;

    match choice.message.content {
        Some(content) => Ok(content),
        None => {
            warn!("OpenRouter returned a choice without content");
            Ok(String::new())
        }
    }
}

#[async_trait::async_trait]
impl AIProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = OpenRouterRequest {
            model: &self.options.model,
            messages: vec![OpenRouterMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.options.temperature,
        };
        debug!("Sending prompt to OpenRouter model {}", self.options.model);

        let response = self
            .client
            .post(self.options.base_url.as_deref().unwrap_or(OPENROUTER_CHAT_URL))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "TraceSift")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        extract_message_content(&body)
    }

    fn get_provider_name(&self) -> &'static str {
        "openrouter"
    }
}
