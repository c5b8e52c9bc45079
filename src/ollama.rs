use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::ChatMessage;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11435";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
    #[error("Received an invalid response from the server.")]
    InvalidResponse,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Serialize, Debug, PartialEq)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Sampling options forwarded to `/api/generate`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Serialize, Debug)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Name and on-disk size of a model served by the backend.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

impl ModelDescriptor {
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    /// Size label shown next to the model name, e.g. `(4.00 GB)`.
    pub fn size_label(&self) -> String {
        format!("({:.2} GB)", self.size_gb())
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: Option<String>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }

    /// Send a chat conversation and return the assistant's reply text.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> ApiResult<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
        };
        debug!("POST chat model={} messages={}", model, request.messages.len());

        let response = self.client.post(self.url("chat")).json(&request).send().await?;
        let chat_response: ChatResponse = decode(response).await?;

        chat_response
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or(ApiError::InvalidResponse)
    }

    /// Run a single completion for `prompt`.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> ApiResult<String> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options,
        };
        debug!(
            "POST generate model={} temperature={} num_predict={:?}",
            model, options.temperature, options.num_predict
        );

        let response = self.client.post(self.url("generate")).json(&request).send().await?;
        let generate_response: GenerateResponse = decode(response).await?;

        generate_response
            .response
            .filter(|r| !r.is_empty())
            .ok_or(ApiError::InvalidResponse)
    }

    pub async fn list_models(&self) -> ApiResult<Vec<ModelDescriptor>> {
        debug!("GET tags");
        let response = self.client.get(self.url("tags")).send().await?;
        let models_response: ModelsResponse = decode(response).await?;
        Ok(models_response.models)
    }

    pub async fn version(&self) -> ApiResult<String> {
        let response = self.client.get(self.url("version")).send().await?;
        let version_response: VersionResponse = decode(response).await?;
        version_response.version.ok_or(ApiError::InvalidResponse)
    }
}

// Success is decided by the body shape, not the status code. Non-2xx is only logged.
async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
        warn!("{} returned status {}", response.url(), status);
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
