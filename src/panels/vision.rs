//! Chat-completion client for the hosted vision model.
//!
//! Every vision panel sends one user turn holding a text prompt and the image
//! as a data URI, then reads `choices[0].message.content` from the reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::acquisition::CapturedImage;
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::processing::fit_data_uri;

/// Longest backend error text kept in a `PanelError`.
const MAX_ERROR_TEXT: usize = 300;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    /// A user turn with a prompt and one image.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Plain text or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

impl Sampling {
    pub const fn new(temperature: f32) -> Self {
        Self {
            temperature,
            max_tokens: 1024,
            top_p: None,
        }
    }

    pub const fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for the hosted chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    timeout: Duration,
    max_upload_side: Option<u32>,
}

impl VisionClient {
    /// Build a client from panel settings. The API key is read from the
    /// configured environment variable.
    pub fn from_config(config: &PanelConfig) -> PanelResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PanelError::from_reqwest(&config.vision_endpoint, 0, e))?;
        Ok(Self {
            http,
            endpoint: config.vision_endpoint.clone(),
            model: config.vision_model.clone(),
            api_key: config.api_key(),
            api_key_env: config.api_key_env.clone(),
            timeout: config.timeout(),
            max_upload_side: config.max_upload_side,
        })
    }

    /// Replace the API key picked up from the environment.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn credentials(&self) -> PanelResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| PanelError::MissingCredentials {
                env_var: self.api_key_env.clone(),
            })
    }

    /// Data URI to send for `image`, capped at the configured long side.
    pub fn prepare_image(&self, image: &CapturedImage) -> PanelResult<String> {
        fit_data_uri(image.data_uri(), self.max_upload_side)
            .map_err(|reason| PanelError::image("upload scaling", reason))
    }

    /// Run one completion and return the first choice's text.
    pub async fn complete(&self, messages: &[ChatMessage], sampling: Sampling) -> PanelResult<String> {
        let api_key = self.credentials()?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            top_p: sampling.top_p,
            stream: false,
        };
        let timeout_ms = self.timeout.as_millis() as u64;
        debug!(endpoint = %self.endpoint, model = %self.model, turns = messages.len(), "vision request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PanelError::from_reqwest(&self.endpoint, timeout_ms, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PanelError::from_reqwest(&self.endpoint, timeout_ms, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| truncate(&body));
            warn!(endpoint = %self.endpoint, status = status.as_u16(), %message, "vision request rejected");
            return Err(PanelError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| PanelError::Decode {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PanelError::Decode {
                endpoint: self.endpoint.clone(),
                reason: "response has no message content".to_string(),
            })
    }

    /// Ask `prompt` about `image` in a single user turn.
    pub async fn ask(&self, prompt: &str, image: &CapturedImage, sampling: Sampling) -> PanelResult<String> {
        self.credentials()?;
        let url = self.prepare_image(image)?;
        self.complete(&[ChatMessage::user_with_image(prompt, url)], sampling)
            .await
    }
}

pub(crate) fn truncate(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_TEXT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
