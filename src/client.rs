//! HTTP client for the detection service.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::ModelVariant;

/// Generous cap covering a cold model load plus inference on a large image.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service reported a pipeline failure in its JSON body.
    #[error("service error: {0}")]
    Api(String),

    #[error("unexpected response content type {0:?}")]
    UnexpectedContentType(String),

    #[error("invalid hex color {0:?}")]
    InvalidHexColor(String),
}

/// Styling and model parameters for one annotation request. Serialized
/// straight into the query string; defaults match the service's.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateParams {
    pub model_name: ModelVariant,
    pub conf_threshold: f32,
    pub border_size: u32,
    pub border_color: String,
    pub font_scale: f32,
    pub font_thickness: u32,
    pub text_color: String,
    pub background_color: String,
    pub background_alpha: f32,
}

impl Default for AnnotateParams {
    fn default() -> Self {
        Self {
            model_name: ModelVariant::default(),
            conf_threshold: 0.25,
            border_size: 50,
            border_color: "50,50,50".to_string(),
            font_scale: 0.7,
            font_thickness: 2,
            text_color: "255,255,255".to_string(),
            background_color: "0,0,0".to_string(),
            background_alpha: 0.5,
        }
    }
}

/// Converts a `#RRGGBB` hex color into the `"R,G,B"` form the service
/// expects.
pub fn hex_to_triple(hex: &str) -> Result<String, ClientError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(ClientError::InvalidHexColor(hex.to_string()));
    }

    let mut channels = [0u8; 3];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16)
            .map_err(|_| ClientError::InvalidHexColor(hex.to_string()))?;
    }
    Ok(format!("{},{},{}", channels[0], channels[1], channels[2]))
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
    error: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Switches the service's default model, returning its status message.
    pub async fn set_model(&self, variant: ModelVariant) -> Result<String, ClientError> {
        let body: MessageBody = self
            .http
            .post(format!("{}/set_model/", self.base_url))
            .query(&[("version", variant)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = body.error {
            return Err(ClientError::Api(error));
        }
        Ok(body.message.unwrap_or_default())
    }

    /// Uploads an image for detection and returns the annotated JPEG.
    ///
    /// The service signals pipeline failures with a 200 JSON body, so the
    /// response content type decides between image bytes and an error.
    pub async fn annotate(
        &self,
        image: Vec<u8>,
        file_name: &str,
        params: &AnnotateParams,
    ) -> Result<Vec<u8>, ClientError> {
        let part = Part::bytes(image).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/upload/", self.base_url))
            .query(params)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("image/") {
            return Ok(response.bytes().await?.to_vec());
        }
        if content_type.starts_with("application/json") {
            let body: MessageBody = response.json().await?;
            return Err(ClientError::Api(
                body.error.unwrap_or_else(|| "unknown service error".to_string()),
            ));
        }
        Err(ClientError::UnexpectedContentType(content_type))
    }

    /// Liveness probe.
    pub async fn health(&self) -> Result<(), ClientError> {
        self.http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_convert_to_triples() {
        assert_eq!(hex_to_triple("#FFFFFF").unwrap(), "255,255,255");
        assert_eq!(hex_to_triple("000000").unwrap(), "0,0,0");
        assert_eq!(hex_to_triple("#323232").unwrap(), "50,50,50");
    }

    #[test]
    fn malformed_hex_colors_are_rejected() {
        for bad in ["#FFF", "", "#GGGGGG", "#1234567"] {
            assert!(hex_to_triple(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
