use crate::ai_provider::{build_client, check_status, AIError, AIProvider, ProviderOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    input: &'a str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    output: Vec<OpenAIOutputItem>,
}

#[derive(Debug, Deserialize)]
struct OpenAIOutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    content: Vec<OpenAIContent>,
}

#[derive(Debug, Deserialize)]
struct OpenAIContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// OpenAI Responses API adapter.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    options: ProviderOptions,
}

impl OpenAIProvider {
    pub fn new(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(&options)?,
            api_key,
            options,
        })
    }

    fn endpoint(&self) -> &str {
        self.options.base_url.as_deref().unwrap_or(OPENAI_RESPONSES_URL)
    }
}

/// Concatenates every `output_text` part of every message item, which is
/// what the SDKs expose as `output_text`. A response without text yields "".
fn extract_output_text(body: &str) -> Result<String, AIError> {
    let response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    Ok(response
        .output
        .iter()
        .filter(|item| item.item_type == "message")
        .flat_map(|item| item.content.iter())
        .filter(|part| part.content_type == "output_text")
        .map(|part| part.text.as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait::async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = OpenAIRequest {
            model: &self.options.model,
            input: prompt,
            temperature: self.options.temperature,
        };
        debug!(
            "Sending {} prompt characters to OpenAI model {}",
            prompt.chars().count(),
            self.options.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        extract_output_text(&body)
    }

    fn get_provider_name(&self) -> &'static str {
        "openai"
    }
}
