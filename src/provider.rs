use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected request ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("provider returned no image")]
    NoImage,
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone)]
pub struct GenerateImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    /// Reference images switch the provider call from text-to-image to
    /// image-to-image.
    pub init_images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderImage {
    pub url: String,
}

/// key: poster-provider -> outbound image generation
#[async_trait]
pub trait PosterProvider: Send + Sync {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<ProviderImage, ProviderError>;
}

/// ModelsLab speaks several response dialects depending on model and queue
/// state; any of these fields may carry the result URL.
#[derive(Debug, Deserialize)]
struct ModelsLabResponse {
    #[allow(dead_code)]
    status: Option<String>,
    output: Option<Vec<String>>,
    proxy_links: Option<Vec<String>>,
    future_links: Option<Vec<String>>,
    message: Option<String>,
}

fn first_image(response: &ModelsLabResponse) -> Option<&str> {
    for links in [&response.output, &response.proxy_links, &response.future_links] {
        if let Some(urls) = links {
            if let Some(url) = urls.iter().find(|url| !url.is_empty()) {
                return Some(url);
            }
        }
    }
    None
}

pub struct ModelsLabProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ModelsLabProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = config::MODELSLAB_API_KEY
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("MODELSLAB_API_KEY is not set".into()))?;
        Ok(Self::new(config::MODELSLAB_BASE_URL.clone(), api_key))
    }
}

#[async_trait]
impl PosterProvider for ModelsLabProvider {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<ProviderImage, ProviderError> {
        let mut body = json!({
            "prompt": request.prompt,
            "model_id": "nano-banana-pro",
            "aspect_ratio": request.aspect_ratio,
            "negative_prompt": "blurry, low quality, distorted, watermark, text errors",
            "key": self.api_key,
            "samples": 1,
            "safety_checker": true,
        });

        let endpoint = if request.init_images.is_empty() {
            "text-to-image"
        } else {
            body["init_image"] = json!(request.init_images);
            "image-to-image"
        };

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ModelsLabResponse = response.json().await?;
        match first_image(&parsed) {
            Some(url) => Ok(ProviderImage { url: url.to_string() }),
            None => match parsed.message {
                Some(message) => Err(ProviderError::Api {
                    status: status.as_u16(),
                    body: message,
                }),
                None => Err(ProviderError::NoImage),
            },
        }
    }
}
