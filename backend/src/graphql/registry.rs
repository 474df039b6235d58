//! Type registry
//!
//! Holds at most one [`OutputType`] per model name and one [`InputType`] per
//! (model, shape). The registry is an ordinary value owned by whoever builds
//! the schema; lookups are get-or-create under a lock, so concurrent first
//! access still yields a single instance.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::types::{InputShape, InputType, OutputType};
use crate::orm::{ModelCatalog, ModelDef};

#[derive(Debug, Default)]
pub struct TypeRegistry {
    outputs: RwLock<HashMap<String, Arc<OutputType>>>,
    inputs: RwLock<HashMap<(String, InputShape), Arc<InputType>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(&self, catalog: &ModelCatalog) {
        for model in catalog.iter() {
            self.output_type(model);
            self.input_type(model, InputShape::Create);
            self.input_type(model, InputShape::Update);
        }
    }

    /// The output type for `model`, created on first request
    pub fn output_type(&self, model: &Arc<ModelDef>) -> Arc<OutputType> {
        if let Some(existing) = self.outputs.read().get(&model.name) {
            return Arc::clone(existing);
        }

        let mut outputs = self.outputs.write();
        // Another caller may have won the race between the two locks
        Arc::clone(outputs.entry(model.name.clone()).or_insert_with(|| {
            debug!(model = %model.name, "Synthesizing output type");
            Arc::new(OutputType::from_model(model))
        }))
    }

    /// The input type for `model` and `shape`, created on first request
    pub fn input_type(&self, model: &Arc<ModelDef>, shape: InputShape) -> Arc<InputType> {
        let key = (model.name.clone(), shape);
        if let Some(existing) = self.inputs.read().get(&key) {
            return Arc::clone(existing);
        }

        let mut inputs = self.inputs.write();
        Arc::clone(inputs.entry(key).or_insert_with(|| {
            debug!(model = %model.name, ?shape, "Synthesizing input type");
            Arc::new(InputType::from_model(model, shape))
        }))
    }

    /// Every input type created so far
    pub fn input_types(&self) -> Vec<Arc<InputType>> {
        self.inputs.read().values().cloned().collect()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.read().len()
    }
}
