use anyhow::{anyhow, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch, TensorRTExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;

use crate::common::{InferenceDevice, ModelConfig};

/// ONNXRuntime backend. Owns one session for one set of weights.
pub struct OrtEngine {
    session: Session,
}

impl OrtEngine {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        match &config.ort_lib_path {
            Some(lib) => ort::init_from(lib.to_string_lossy().to_string()).commit()?,
            None => ort::init().commit()?,
        };

        let session = SessionBuilder::new()?
            .with_execution_providers(Self::providers(config.device))?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&config.weights_path)?;

        log::info!(
            "ORT session ready | weights: {} | device: {}",
            config.weights_path.display(),
            config.device.as_str(),
        );

        Ok(Self { session })
    }

    /// Provider list in preference order. Accelerators fall back to CPU when
    /// the provider cannot be registered at session build time.
    fn providers(device: InferenceDevice) -> Vec<ExecutionProviderDispatch> {
        match device {
            InferenceDevice::CPU => vec![CPUExecutionProvider::default().build()],
            InferenceDevice::CUDA(id) => vec![
                CUDAExecutionProvider::default().with_device_id(id as i32).build(),
                CPUExecutionProvider::default().build(),
            ],
            InferenceDevice::TensorRT(id) => vec![
                TensorRTExecutionProvider::default().with_device_id(id as i32).build(),
                CUDAExecutionProvider::default().with_device_id(id as i32).build(),
                CPUExecutionProvider::default().build(),
            ],
            InferenceDevice::CoreML(_) => vec![
                CoreMLExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
        }
    }

    /// Runs one f32 batch and extracts the first output tensor.
    pub fn run(&self, input: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        let outputs = self.session.run(ort::inputs![input.view()]?)?;
        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        Ok(value.try_extract_tensor::<f32>()?.into_owned())
    }

    /// Fetches a custom metadata entry from the model, e.g. `names`.
    pub fn try_fetch(&self, key: &str) -> Option<String> {
        match self.session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom(key).unwrap_or_default(),
        }
    }
}
