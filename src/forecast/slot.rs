//! Shared holder for the current trained model

use parking_lot::RwLock;
use std::sync::Arc;

use super::TrainedModel;

/// Single-writer, many-reader model holder.
///
/// Readers clone the `Arc` and keep predicting against it while a newly trained model is
/// swapped in; a model is never mutated after it is published.
#[derive(Debug, Default)]
pub struct ModelSlot {
    current: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: Arc<TrainedModel>) -> Self {
        Self {
            current: RwLock::new(Some(model)),
        }
    }

    /// Current model, if one has been published
    pub fn load(&self) -> Option<Arc<TrainedModel>> {
        self.current.read().clone()
    }

    /// Publish `model`, returning the one it replaces
    pub fn swap(&self, model: Arc<TrainedModel>) -> Option<Arc<TrainedModel>> {
        let previous = self.current.write().replace(model);
        tracing::info!(replaced = previous.is_some(), "Published trained model");
        previous
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_none()
    }
}
