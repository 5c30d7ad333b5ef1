use log::{error, info};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExportError;
use crate::figure::Figure;

const DEFAULT_CONTENT_TYPE: &str = "image/png";
const FALLBACK_MESSAGE: &str = "Failed to export plot";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Suggested name for the downloaded file.
    pub fn file_name(&self) -> &'static str {
        match self {
            ImageFormat::Png => "plot_high_res.png",
            ImageFormat::Jpeg => "plot_high_res.jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Body accepted by the image-export service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub plot_data: Vec<Value>,
    pub layout: Value,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Client for the remote figure-to-image service.
#[derive(Clone, Debug)]
pub struct ExportClient {
    client: Client,
    url: String,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

impl ExportClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            width: 2000,
            height: 1600,
            scale: 3,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32, scale: u32) -> Self {
        self.width = width;
        self.height = height;
        self.scale = scale;
        self
    }

    /// Wraps a figure in a request using this client's size settings.
    pub fn request_for(&self, figure: &Figure, format: ImageFormat) -> ExportRequest {
        ExportRequest {
            plot_data: figure.data.clone(),
            layout: figure.layout.clone(),
            format,
            width: self.width,
            height: self.height,
            scale: self.scale,
        }
    }

    pub async fn export(
        &self,
        figure: &Figure,
        format: ImageFormat,
    ) -> Result<ExportedImage, ExportError> {
        self.forward(&self.request_for(figure, format)).await
    }

    /// Sends a prepared request as-is and returns the image bytes.
    pub async fn forward(&self, request: &ExportRequest) -> Result<ExportedImage, ExportError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            error!("image export failed ({}): {}", status.as_u16(), message);
            return Err(ExportError::Export {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        info!("exported {} bytes of {}", bytes.len(), content_type);
        Ok(ExportedImage {
            bytes,
            content_type,
        })
    }
}

/// Picks the most useful message out of an error body: a JSON `message`
/// field, the raw text, or a generic fallback.
pub fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        body.to_string()
    }
}
