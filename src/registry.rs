//! Pool of loaded model instances, keyed by variant.
//!
//! The service never holds a single mutable "current model" slot. Each
//! variant is loaded at most once, kept behind its own lock, and looked up
//! by key per request, so a request can never observe a model mid-swap.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;
use parking_lot::{Mutex, RwLock};

use crate::common::{Detection, ModelVariant};
use crate::config::ServerConfig;
use crate::detector::{Detect, Detector};

type SharedDetector = Arc<Mutex<Box<dyn Detect>>>;

/// Builds a detector for a variant. Pluggable so tests can inject a stub.
pub type DetectorFactory = dyn Fn(ModelVariant) -> Result<Box<dyn Detect>> + Send + Sync;

/// Outcome of a `/set_model/` style activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Changed,
    AlreadyActive,
}

pub struct ModelRegistry {
    factory: Box<DetectorFactory>,
    active: RwLock<ModelVariant>,
    loaded: RwLock<HashMap<ModelVariant, SharedDetector>>,
}

impl ModelRegistry {
    /// Registry backed by ONNXRuntime detectors configured from `config`.
    pub fn new(config: ServerConfig) -> Self {
        let default = config.default_variant;
        Self::with_factory(
            default,
            Box::new(move |variant| {
                let model_config = config.model_config(variant);
                Ok(Box::new(Detector::new(&model_config)?) as Box<dyn Detect>)
            }),
        )
    }

    pub fn with_factory(default: ModelVariant, factory: Box<DetectorFactory>) -> Self {
        Self {
            factory,
            active: RwLock::new(default),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn active(&self) -> ModelVariant {
        *self.active.read()
    }

    pub fn is_loaded(&self, variant: ModelVariant) -> bool {
        self.loaded.read().contains_key(&variant)
    }

    /// Makes `variant` the active one, loading it first if needed. A second
    /// call with the already-active variant is a no-op.
    pub async fn activate(self: &Arc<Self>, variant: ModelVariant) -> Result<Activation> {
        if self.active() == variant && self.is_loaded(variant) {
            return Ok(Activation::AlreadyActive);
        }

        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.ensure_loaded(variant).map(|_| ()))
            .await??;

        let mut active = self.active.write();
        if *active == variant {
            return Ok(Activation::AlreadyActive);
        }
        log::info!("active model changed: {} -> {}", *active, variant);
        *active = variant;
        Ok(Activation::Changed)
    }

    /// Runs inference with `variant`, loading it on demand. Requesting a
    /// variant other than the active one also makes it active, mirroring the
    /// upload endpoint's reload-on-request behavior.
    pub async fn detect(
        self: &Arc<Self>,
        variant: ModelVariant,
        image: RgbImage,
        conf_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let detector = this.ensure_loaded(variant)?;
            {
                let mut active = this.active.write();
                if *active != variant {
                    log::info!("active model changed: {} -> {}", *active, variant);
                    *active = variant;
                }
            }
            let mut guard = detector.lock();
            guard.detect(&image, conf_threshold)
        })
        .await?
    }

    /// Returns the detector for `variant`, building it through the factory
    /// on first use. Blocking: model loads read weights from disk.
    fn ensure_loaded(&self, variant: ModelVariant) -> Result<SharedDetector> {
        if let Some(detector) = self.loaded.read().get(&variant) {
            return Ok(Arc::clone(detector));
        }

        let built: SharedDetector = Arc::new(Mutex::new((self.factory)(variant)?));

        let mut loaded = self.loaded.write();
        // A concurrent request may have won the race; keep the first one.
        let entry = loaded.entry(variant).or_insert(built);
        Ok(Arc::clone(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DetBox;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports one detection labeled with the variant it was built for.
    struct StubDetector {
        variant: ModelVariant,
    }

    impl Detect for StubDetector {
        fn detect(&mut self, _image: &RgbImage, _conf: f32) -> Result<Vec<Detection>> {
            Ok(vec![Detection::new(
                0,
                self.variant.as_str(),
                0.9,
                DetBox::new(0.0, 0.0, 4.0, 4.0),
            )])
        }
    }

    fn stub_registry(loads: Arc<AtomicUsize>) -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::with_factory(
            ModelVariant::Yolov8n,
            Box::new(move |variant| {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(StubDetector { variant }))
            }),
        ))
    }

    #[tokio::test]
    async fn activate_is_idempotent() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry(Arc::clone(&loads));

        assert_eq!(
            registry.activate(ModelVariant::Yolov8s).await.unwrap(),
            Activation::Changed
        );
        assert_eq!(
            registry.activate(ModelVariant::Yolov8s).await.unwrap(),
            Activation::AlreadyActive
        );
        assert_eq!(registry.active(), ModelVariant::Yolov8s);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detect_loads_each_variant_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry(Arc::clone(&loads));
        let image = RgbImage::new(4, 4);

        registry
            .detect(ModelVariant::Yolov8m, image.clone(), 0.25)
            .await
            .unwrap();
        registry
            .detect(ModelVariant::Yolov8m, image, 0.25)
            .await
            .unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active(), ModelVariant::Yolov8m);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_always_hit_the_variant_they_asked_for() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry(Arc::clone(&loads));

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = Arc::clone(&registry);
            let variant = if i % 2 == 0 {
                ModelVariant::Yolov8n
            } else {
                ModelVariant::Yolov8m
            };
            handles.push(tokio::spawn(async move {
                if i % 8 == 3 {
                    registry.activate(variant).await.unwrap();
                }
                let dets = registry
                    .detect(variant, RgbImage::new(4, 4), 0.25)
                    .await
                    .unwrap();
                // A request must see the model it named, never one that a
                // concurrent request swapped in.
                assert_eq!(dets[0].label, variant.as_str());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Duplicate builds can happen in the first-use race, but once the
        // pool has settled every further request hits the cache.
        let settled = loads.load(Ordering::SeqCst);
        registry
            .detect(ModelVariant::Yolov8n, RgbImage::new(4, 4), 0.25)
            .await
            .unwrap();
        registry
            .detect(ModelVariant::Yolov8m, RgbImage::new(4, 4), 0.25)
            .await
            .unwrap();
        registry.activate(ModelVariant::Yolov8n).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), settled);
    }
}
