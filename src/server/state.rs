use std::sync::Arc;

use crate::annotate::Annotator;
use crate::registry::ModelRegistry;

/// Shared handler state. Cheap to clone, everything lives behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub annotator: Arc<Annotator>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, annotator: Arc<Annotator>) -> Self {
        Self {
            registry,
            annotator,
        }
    }
}
