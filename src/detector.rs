mod image_ops;
mod ort_engine;
mod postprocess;

pub use image_ops::preprocess;
pub use ort_engine::OrtEngine;
pub use postprocess::{decode_predictions, non_max_suppression, Nms};

use anyhow::Result;
use image::RgbImage;
use regex::Regex;

use crate::common::{coco_names, Detection, ModelConfig};

/// Seam between the HTTP plumbing and inference. The service only depends on
/// this trait, so it can be exercised without model weights.
pub trait Detect: Send {
    /// Detects objects in one image. `conf_threshold` is a `>=` filter on
    /// the detection score.
    fn detect(&mut self, image: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>>;
}

/// ONNXRuntime-backed YOLOv8 detector.
pub struct Detector {
    engine: OrtEngine,
    names: Vec<String>,
    input_size: u32,
    iou_threshold: f32,
}

impl Detector {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let engine = OrtEngine::new(config)?;

        let names = match &config.class_names {
            Some(names) => names.clone(),
            None => match Self::fetch_names(&engine) {
                Some(parsed) if !parsed.is_empty() => parsed,
                _ => coco_names(),
            },
        };

        log::info!(
            "detector loaded | {} | {} classes",
            config.summary(),
            names.len()
        );

        Ok(Self {
            engine,
            names,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Fetches class names from the ONNX metadata. Ultralytics exports store
    /// them as `{0: 'person', 1: 'bicycle', ...}`.
    fn fetch_names(engine: &OrtEngine) -> Option<Vec<String>> {
        engine.try_fetch("names").map(|names| {
            let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).expect("static regex");
            let mut names_ = vec![];
            for (_, [_, name, _]) in re.captures_iter(&names).map(|x| x.extract()) {
                names_.push(name.to_string());
            }
            names_
        })
    }
}

impl Detect for Detector {
    fn detect(&mut self, image: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>> {
        let (tensor, ratio) = preprocess(image, self.input_size)?;
        let output = self.engine.run(tensor)?;
        decode_predictions(
            &output,
            &self.names,
            conf_threshold,
            self.iou_threshold,
            ratio,
            image.width() as f32,
            image.height() as f32,
        )
    }
}
