mod coco;
mod detection;
mod inference_device;
mod model_config;
mod model_variant;

pub use coco::*;
pub use detection::*;
pub use inference_device::*;
pub use model_config::*;
pub use model_variant::*;
