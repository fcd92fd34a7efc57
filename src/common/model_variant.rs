use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The YOLOv8 export sizes the service knows how to load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    #[default]
    Yolov8n,
    Yolov8s,
    Yolov8m,
    Yolov8l,
    Yolov8x,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Yolov8n => "yolov8n",
            ModelVariant::Yolov8s => "yolov8s",
            ModelVariant::Yolov8m => "yolov8m",
            ModelVariant::Yolov8l => "yolov8l",
            ModelVariant::Yolov8x => "yolov8x",
        }
    }

    /// File name of the ONNX export for this variant.
    pub fn weights_file(&self) -> String {
        format!("{}.onnx", self.as_str())
    }

    pub fn all() -> [ModelVariant; 5] {
        [
            ModelVariant::Yolov8n,
            ModelVariant::Yolov8s,
            ModelVariant::Yolov8m,
            ModelVariant::Yolov8l,
            ModelVariant::Yolov8x,
        ]
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yolov8n" => Ok(ModelVariant::Yolov8n),
            "yolov8s" => Ok(ModelVariant::Yolov8s),
            "yolov8m" => Ok(ModelVariant::Yolov8m),
            "yolov8l" => Ok(ModelVariant::Yolov8l),
            "yolov8x" => Ok(ModelVariant::Yolov8x),
            other => Err(format!(
                "unknown model {other:?}, expected one of: yolov8n, yolov8s, yolov8m, yolov8l, yolov8x"
            )),
        }
    }
}
