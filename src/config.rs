//! Service configuration, environment-variable driven.

use std::path::PathBuf;

use crate::common::{InferenceDevice, ModelConfig, ModelVariant};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Directory holding the exported ONNX weights, one file per variant.
    pub model_dir: PathBuf,
    /// Optional `libonnxruntime` dylib path, forwarded to the engine.
    pub ort_lib_path: Option<PathBuf>,
    pub device: InferenceDevice,
    /// Square model input edge.
    pub input_size: u32,
    /// Optional TTF used for label text. When unset, common system font
    /// locations are searched.
    pub font_path: Option<PathBuf>,
    /// Variant loaded eagerly at startup.
    pub default_variant: ModelVariant,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            model_dir: default_model_dir(),
            ort_lib_path: None,
            device: InferenceDevice::default(),
            input_size: 640,
            font_path: None,
            default_variant: ModelVariant::default(),
        }
    }
}

impl ServerConfig {
    /// Reads configuration from `MARKBOX_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let device_id = std::env::var("MARKBOX_DEVICE_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let device = std::env::var("MARKBOX_DEVICE")
            .ok()
            .and_then(|s| InferenceDevice::from_str(&s, device_id))
            .unwrap_or(defaults.device);

        Self {
            bind_addr: std::env::var("MARKBOX_BIND_ADDR").unwrap_or(defaults.bind_addr),
            model_dir: std::env::var("MARKBOX_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            ort_lib_path: std::env::var("MARKBOX_ORT_LIB").ok().map(PathBuf::from),
            device,
            input_size: std::env::var("MARKBOX_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.input_size),
            font_path: std::env::var("MARKBOX_FONT").ok().map(PathBuf::from),
            default_variant: std::env::var("MARKBOX_DEFAULT_MODEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_variant),
        }
    }

    /// Per-variant model configuration.
    pub fn model_config(&self, variant: ModelVariant) -> ModelConfig {
        ModelConfig::new(variant, self.model_dir.join(variant.weights_file()))
            .with_device(self.device)
            .with_ort_lib_path(self.ort_lib_path.clone())
            .with_input_size(self.input_size)
    }
}

/// Prefers a `models/` directory next to the working directory; otherwise
/// falls back to the user cache directory.
fn default_model_dir() -> PathBuf {
    let local = PathBuf::from("models");
    if local.is_dir() {
        return local;
    }
    dirs::cache_dir()
        .map(|p| p.join("markbox").join("models"))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_config_points_at_variant_weights() {
        let config = ServerConfig {
            model_dir: PathBuf::from("/opt/weights"),
            ..Default::default()
        };
        let mc = config.model_config(ModelVariant::Yolov8l);
        assert_eq!(mc.weights_path, PathBuf::from("/opt/weights/yolov8l.onnx"));
        assert_eq!(mc.input_size, 640);
    }
}
