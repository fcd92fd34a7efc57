use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::error::ServiceError;
use super::state::AppState;
use crate::annotate::{encode_jpeg, parse_color_triple, RenderOptions};
use crate::common::ModelVariant;
use crate::registry::Activation;

#[derive(Debug, Deserialize)]
pub struct SetModelQuery {
    pub version: ModelVariant,
}

/// `POST /set_model/?version=...`
///
/// Loads the requested variant if needed and makes it the default for
/// subsequent uploads. An unknown version never reaches this handler, the
/// query extractor rejects it with a 400.
pub async fn set_model(
    State(state): State<AppState>,
    Query(query): Query<SetModelQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let outcome = state
        .registry
        .activate(query.version)
        .await
        .map_err(ServiceError::Detection)?;

    let message = match outcome {
        Activation::Changed => format!("Model changed to {}", query.version),
        Activation::AlreadyActive => format!("Model already set to {}", query.version),
    };
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub model_name: ModelVariant,
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,
    #[serde(default = "default_border_size")]
    pub border_size: u32,
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
    #[serde(default = "default_font_thickness")]
    pub font_thickness: u32,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_background_alpha")]
    pub background_alpha: f32,
}

fn default_conf_threshold() -> f32 {
    0.25
}
fn default_border_size() -> u32 {
    50
}
fn default_border_color() -> String {
    "50,50,50".to_string()
}
fn default_font_scale() -> f32 {
    0.7
}
fn default_font_thickness() -> u32 {
    2
}
fn default_text_color() -> String {
    "255,255,255".to_string()
}
fn default_background_color() -> String {
    "0,0,0".to_string()
}
fn default_background_alpha() -> f32 {
    0.5
}

impl UploadQuery {
    fn render_options(&self) -> Result<RenderOptions, ServiceError> {
        Ok(RenderOptions {
            conf_threshold: self.conf_threshold,
            border_size: self.border_size,
            border_color: parse_color_triple(&self.border_color)?,
            font_scale: self.font_scale,
            font_thickness: self.font_thickness,
            text_color: parse_color_triple(&self.text_color)?,
            background_color: parse_color_triple(&self.background_color)?,
            background_alpha: self.background_alpha,
        })
    }
}

/// `POST /upload/` with a multipart `file` field.
///
/// Runs detection with the requested variant and returns the bordered,
/// annotated image as JPEG. Pipeline failures come back as JSON with an
/// `error` key instead.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let opts = query.render_options()?;
    let payload = read_file_field(multipart).await?;

    let image = image::load_from_memory(&payload)?.to_rgb8();
    log::debug!(
        "upload: {}x{} image, model={}, conf={}",
        image.width(),
        image.height(),
        query.model_name,
        query.conf_threshold
    );

    let detections = state
        .registry
        .detect(query.model_name, image.clone(), query.conf_threshold)
        .await
        .map_err(ServiceError::Detection)?;
    log::debug!("upload: {} detections", detections.len());

    let annotator = state.annotator.clone();
    let jpeg = tokio::task::spawn_blocking(move || {
        let rendered = annotator.render(&image, &detections, &opts);
        encode_jpeg(&rendered)
    })
    .await?
    .map_err(ServiceError::Encode)?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model": state.registry.active(),
    }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ServiceError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ServiceError::MissingFile)
}
