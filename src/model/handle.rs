//! Shared, hot-swappable reference to the served model.

use super::ModelParameters;
use std::sync::{Arc, PoisonError, RwLock};

/// Readers clone the `Arc` and predict without holding the lock, so a swap
/// never exposes a half-updated parameter set: in-flight predictions keep the
/// model they started with, later ones see the replacement.
pub struct ModelHandle {
    current: RwLock<Arc<ModelParameters>>,
}

impl ModelHandle {
    pub fn new(params: ModelParameters) -> Self {
        Self {
            current: RwLock::new(Arc::new(params)),
        }
    }

    pub fn current(&self) -> Arc<ModelParameters> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the served model; returns the previous one.
    pub fn swap(&self, params: ModelParameters) -> Arc<ModelParameters> {
        let next = Arc::new(params);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
