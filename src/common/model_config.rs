use std::path::PathBuf;

use crate::common::inference_device::InferenceDevice;
use crate::common::model_variant::ModelVariant;

/// Everything needed to load one model instance.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub variant: ModelVariant,
    pub weights_path: PathBuf,
    /// Path to a `libonnxruntime` dylib. When `None` the runtime is resolved
    /// through the `ORT_DYLIB_PATH` environment variable.
    pub ort_lib_path: Option<PathBuf>,
    pub device: InferenceDevice,
    /// Square model input edge, in pixels.
    pub input_size: u32,
    /// Explicit class names. When `None`, names are fetched from the ONNX
    /// metadata, falling back to the COCO-80 table.
    pub class_names: Option<Vec<String>>,
    /// IoU threshold for non-maximum suppression.
    pub iou_threshold: f32,
}

impl ModelConfig {
    pub fn new(variant: ModelVariant, weights_path: PathBuf) -> Self {
        Self {
            variant,
            weights_path,
            ort_lib_path: None,
            device: InferenceDevice::default(),
            input_size: 640,
            class_names: None,
            iou_threshold: 0.45,
        }
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_ort_lib_path(mut self, path: Option<PathBuf>) -> Self {
        self.ort_lib_path = path;
        self
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = Some(names);
        self
    }

    pub fn with_iou_threshold(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "Variant: {} | Weights: {} | Device: {} | Input: {}x{}",
            self.variant,
            self.weights_path.display(),
            self.device.as_str(),
            self.input_size,
            self.input_size,
        )
    }
}
