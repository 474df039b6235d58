//! The set of models exposed through the API.

use std::collections::HashSet;
use std::sync::Arc;

use super::model::{ColumnType, Model, ModelDef, RelationKind};
use crate::error::ModelError;

/// Validated, ordered collection of model definitions.
///
/// Registration order is kept so generated schema fields come out in the
/// order the models were declared.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<Arc<ModelDef>>,
}

impl ModelCatalog {
    pub fn builder() -> ModelCatalogBuilder {
        ModelCatalogBuilder::default()
    }

    /// Look up a model by name
    pub fn get(&self, name: &str) -> Option<&Arc<ModelDef>> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDef>> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ModelCatalogBuilder {
    defs: Vec<ModelDef>,
}

impl ModelCatalogBuilder {
    /// Register a model type.
    pub fn model<M: Model>(self) -> Self {
        self.model_def(M::model_def())
    }

    /// Register a hand-assembled definition.
    pub fn model_def(mut self, def: ModelDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Validate cross-model references and freeze the catalog.
    pub fn build(self) -> Result<ModelCatalog, ModelError> {
        let mut seen = HashSet::new();
        for def in &self.defs {
            if !seen.insert(def.name.as_str()) {
                return Err(ModelError::DuplicateModel(def.name.clone()));
            }
        }

        for def in &self.defs {
            validate(def, &self.defs)?;
        }

        Ok(ModelCatalog {
            models: self.defs.into_iter().map(Arc::new).collect(),
        })
    }
}

fn validate(def: &ModelDef, all: &[ModelDef]) -> Result<(), ModelError> {
    let pk = def
        .primary_key()
        .ok_or_else(|| ModelError::MissingPrimaryKey(def.name.clone()))?;
    if pk.column_type != ColumnType::Integer {
        return Err(ModelError::NonIntegerPrimaryKey(def.name.clone()));
    }

    let find = |name: &str| all.iter().find(|m| m.name == name);

    for col in &def.columns {
        if let Some(fk) = &col.foreign_key {
            let target = find(&fk.model).ok_or_else(|| ModelError::UnknownModel {
                model: def.name.clone(),
                target: fk.model.clone(),
            })?;
            if target.column_named(&fk.column).is_none() {
                return Err(ModelError::UnknownColumn {
                    model: target.name.clone(),
                    column: fk.column.clone(),
                });
            }
        }
    }

    for rel in &def.relationships {
        let target = find(&rel.target).ok_or_else(|| ModelError::UnknownModel {
            model: def.name.clone(),
            target: rel.target.clone(),
        })?;
        match &rel.kind {
            RelationKind::ManyToOne { column } => {
                if def.column_named(column).is_none() {
                    return Err(ModelError::UnknownColumn {
                        model: def.name.clone(),
                        column: column.clone(),
                    });
                }
            }
            RelationKind::OneToMany { remote_column } => {
                if target.column_named(remote_column).is_none() {
                    return Err(ModelError::UnknownColumn {
                        model: target.name.clone(),
                        column: remote_column.clone(),
                    });
                }
            }
            RelationKind::ManyToMany { .. } => {}
        }
    }

    Ok(())
}
