//! Chat-completions codec shared by every OpenAI-compatible backend.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::external::error::LlmError;
use crate::external::llm::{
    build_client, clean_completion, empty_completion, send_json, GenerationParams, DEFAULT_TIMEOUT,
};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// `POST {base_url}/chat/completions` with bearer authentication
#[derive(Debug, Clone)]
pub(crate) struct ChatCompletions {
    provider: &'static str,
    base_url: String,
    forward_top_k: bool,
    client: Client,
}

impl ChatCompletions {
    pub(crate) fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        forward_top_k: bool,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            provider,
            base_url: base_url.into(),
            forward_top_k,
            client: build_client(provider, DEFAULT_TIMEOUT)?,
        })
    }

    pub(crate) fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) -> Result<(), LlmError> {
        self.client = build_client(self.provider, timeout)?;
        Ok(())
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let api_key = params
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::auth(self.provider, "no API key configured"))?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = params.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = ChatRequest {
            model: &params.model,
            messages,
            stream: false,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_k: if self.forward_top_k { params.top_k } else { None },
            top_p: params.top_p,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(provider = self.provider, model = %params.model, %url, "sending chat completion");

        let request = self.client.post(&url).bearer_auth(api_key).json(&body);
        let response: ChatResponse = send_json(self.provider, request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| empty_completion(self.provider))?;

        let text = clean_completion(&content);
        if text.is_empty() {
            return Err(empty_completion(self.provider));
        }
        Ok(text)
    }
}
