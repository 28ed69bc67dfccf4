use std::fmt;
use std::sync::Arc;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::edit::asset::ImageAsset;

pub const MAX_RESPONSE_TOKENS: u32 = 4096;
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-3-pro-image-preview";

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEditRequest {
    pub credential: String,
    pub image: ImageAsset,
    pub instruction: String,
    pub max_tokens: u32,
}

impl RemoteEditRequest {
    pub fn new(
        credential: impl Into<String>,
        image: ImageAsset,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into(),
            image,
            instruction: instruction.into(),
            max_tokens: MAX_RESPONSE_TOKENS,
        }
    }
}

impl fmt::Debug for RemoteEditRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEditRequest")
            .field("credential", &"<redacted>")
            .field("image", &self.image)
            .field("instruction", &self.instruction)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteEditFailure {
    pub message: String,
}

impl RemoteEditFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outbound edit call. Returns the service's descriptive guidance text, never
/// image data. Implementations make exactly one attempt per call.
pub trait RemoteEditService: Send + Sync + 'static {
    fn request_edit(&self, request: &RemoteEditRequest) -> Result<String, RemoteEditFailure>;
}

pub type SharedRemoteEditService = Arc<dyn RemoteEditService>;

/// OpenAI-compatible chat completions client, pointed at OpenRouter by default.
#[derive(Debug, Clone)]
pub struct OpenRouterEditService {
    endpoint: Url,
    model: String,
}

impl OpenRouterEditService {
    pub fn new(endpoint: Url, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint.as_str().trim_end_matches('/')
        )
    }

    pub fn build_request_body(&self, request: &RemoteEditRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": { "url": request.image.to_data_uri() }
                        },
                        {
                            "type": "text",
                            "text": build_edit_prompt(request.instruction.as_str())
                        }
                    ]
                }
            ]
        })
    }
}

impl RemoteEditService for OpenRouterEditService {
    fn request_edit(&self, request: &RemoteEditRequest) -> Result<String, RemoteEditFailure> {
        let credential = request.credential.trim();
        if credential.is_empty() {
            return Err(RemoteEditFailure::new("API credential is required"));
        }
        if request.instruction.trim().is_empty() {
            return Err(RemoteEditFailure::new("editing instruction is required"));
        }

        let url = self.completions_url();
        debug!(
            url = %url,
            model = %self.model,
            media_type = request.image.media_type(),
            payload_len = request.image.payload().len(),
            "dispatching remote edit request"
        );

        let client = Client::builder()
            .build()
            .map_err(|e| RemoteEditFailure::new(format!("http client init failed: {e}")))?;
        let resp = client
            .post(url.as_str())
            .bearer_auth(credential)
            .json(&self.build_request_body(request))
            .send()
            .map_err(|e| RemoteEditFailure::new(format!("edit request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            warn!(status = status.as_u16(), "remote edit service returned an error status");
            return Err(RemoteEditFailure::new(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        let payload: ChatCompletionResponse = resp
            .json()
            .map_err(|e| RemoteEditFailure::new(format!("edit response JSON decode failed: {e}")))?;
        extract_response_text(payload)
    }
}

pub fn build_edit_prompt(instruction: &str) -> String {
    format!(
        concat!(
            "Photo editing instruction: {}\n\n",
            "Please analyze this image and provide detailed guidance on how to apply this edit professionally.\n",
            "Describe the specific adjustments needed including:\n",
            "- Color correction values\n",
            "- Filter settings\n",
            "- Techniques to use\n",
            "- Step-by-step process\n\n",
            "Be specific and technical in your response."
        ),
        instruction.trim()
    )
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    #[serde(default)]
    message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<Value>,
}

fn extract_response_text(payload: ChatCompletionResponse) -> Result<String, RemoteEditFailure> {
    if let Some(error) = payload.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(RemoteEditFailure::new(format!(
            "edit service reported an error: {message}"
        )));
    }

    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| RemoteEditFailure::new("edit response contained no message content"))?;

    let text = match content {
        Value::String(text) => text,
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other => {
            return Err(RemoteEditFailure::new(format!(
                "edit response content has unexpected shape: {other}"
            )));
        }
    };

    if text.trim().is_empty() {
        return Err(RemoteEditFailure::new("edit response text was empty"));
    }
    Ok(text)
}
