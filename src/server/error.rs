use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::annotate::ColorParseError;

/// Failures inside the detection pipeline.
///
/// These are reported as HTTP 200 with an `{"error": ...}` JSON body, so a
/// client has to inspect the payload to tell an annotated image from a
/// failure. Kept for wire compatibility with existing clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no 'file' field in the upload")]
    MissingFile,

    #[error("could not read the uploaded body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("could not decode the uploaded image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error(transparent)]
    Color(#[from] ColorParseError),

    #[error("detection failed: {0}")]
    Detection(#[source] anyhow::Error),

    #[error("could not encode the result image: {0}")]
    Encode(#[source] anyhow::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        log::warn!("request failed: {self}");
        (StatusCode::OK, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
