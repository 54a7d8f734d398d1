//! Scene root.
//!
//! The scene owns every model inserted into it for the lifetime of the
//! session. Models are addressed by their insertion index.

use crate::data_structures::model::ModelAsset;

#[derive(Debug, Default)]
pub struct Scene {
    models: Vec<ModelAsset>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `model` and returns its index.
    pub fn add(&mut self, model: ModelAsset) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn models(&self) -> &[ModelAsset] {
        &self.models
    }

    pub fn model(&self, idx: usize) -> Option<&ModelAsset> {
        self.models.get(idx)
    }

    pub fn model_mut(&mut self, idx: usize) -> Option<&mut ModelAsset> {
        self.models.get_mut(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
