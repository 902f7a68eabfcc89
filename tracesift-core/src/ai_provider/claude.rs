use crate::ai_provider::{build_client, check_status, AIError, AIProvider, ProviderOptions};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CLAUDE_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    options: ProviderOptions,
}

impl ClaudeProvider {
    pub fn new(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(&options)?,
            api_key,
            options,
        })
    }
}

fn extract_text_blocks(body: &str) -> Result<String, AIError> {
    let response: ClaudeResponse = serde_json::from_str(body)
        .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    if response.content.is_empty() {
        return Err(AIError::InvalidResponse(
            "No content in response".to_string(),
        ));
    }

    Ok(response
        .content
        .iter()
        .filter(|block| block.content_type == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait::async_trait]
impl AIProvider for ClaudeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = ClaudeRequest {
            model: &self.options.model,
            max_tokens: CLAUDE_MAX_TOKENS,
            temperature: self.options.temperature,
            messages: vec![ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        };
        debug!("Sending prompt to Claude model {}", self.options.model);

        let response = self
            .client
            .post(self.options.base_url.as_deref().unwrap_or(CLAUDE_MESSAGES_URL))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        extract_text_blocks(&body)
    }

    fn get_provider_name(&self) -> &'static str {
        "claude"
    }
}
