//! Deep assignment of mutation input onto instances
//!
//! Mutation input arrives as JSON. [`InputTree::parse`] validates it against
//! the model (known fields, value types, global ids) and produces a typed
//! tree; [`assign`] then merges that tree into an [`Instance`], creating
//! nested related instances as it goes. Both walks stop at `max_depth`
//! levels of nesting, since relationship graphs can be cyclic.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::global_id::{decode_for, decode_lenient, from_global_id};
use super::types::TypeNames;
use crate::error::AssignError;
use crate::orm::{
    ColumnDef, Instance, ModelCatalog, ModelDef, Related, RelationKind, RelationshipDef, SqlValue,
};

/// One input field's value
#[derive(Debug, Clone, PartialEq)]
pub enum InputNode {
    Value(SqlValue),
    /// Many-to-one parent
    Nested(InputTree),
    /// One-to-many children
    NestedList(Vec<InputTree>),
    /// Many-to-many target ids
    Links(Vec<i64>),
}

/// Validated mutation input for one model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTree {
    pub fields: BTreeMap<String, InputNode>,
}

impl InputTree {
    pub fn parse(
        catalog: &ModelCatalog,
        model: &ModelDef,
        value: &JsonValue,
        max_depth: usize,
    ) -> Result<Self, AssignError> {
        parse_at(catalog, model, value, 0, max_depth)
    }

    pub fn get(&self, field: &str) -> Option<&InputNode> {
        self.fields.get(field)
    }
}

fn parse_at(
    catalog: &ModelCatalog,
    model: &ModelDef,
    value: &JsonValue,
    depth: usize,
    max_depth: usize,
) -> Result<InputTree, AssignError> {
    if depth > max_depth {
        return Err(AssignError::TooDeep { limit: max_depth });
    }
    let JsonValue::Object(map) = value else {
        return Err(AssignError::InvalidValue {
            field: model.name.clone(),
            reason: "expected an object".to_string(),
        });
    };

    let mut fields = BTreeMap::new();
    for (key, raw) in map {
        if let Some(column) = writable_column(model, key) {
            fields.insert(key.clone(), InputNode::Value(column_value(column, raw)?));
        } else if let Some(rel) = model.relationship_named(key) {
            if raw.is_null() {
                continue;
            }
            let target = catalog.get(&rel.target).ok_or_else(|| unknown(model, key))?;
            let node = relationship_node(catalog, rel, target, raw, depth, max_depth)?;
            fields.insert(key.clone(), node);
        } else {
            return Err(unknown(model, key));
        }
    }
    Ok(InputTree { fields })
}

fn unknown(model: &ModelDef, field: &str) -> AssignError {
    AssignError::UnknownField {
        model: model.name.clone(),
        field: field.to_string(),
    }
}

fn writable_column<'m>(model: &'m ModelDef, name: &str) -> Option<&'m ColumnDef> {
    model
        .column_named(name)
        .filter(|c| c.name != "id" && !c.is_server_generated())
}

fn column_value(column: &ColumnDef, raw: &JsonValue) -> Result<SqlValue, AssignError> {
    if !column.global_id {
        return SqlValue::from_json_typed(column.column_type, raw).map_err(|reason| {
            AssignError::InvalidValue {
                field: column.name.clone(),
                reason,
            }
        });
    }

    let encoded = match raw {
        JsonValue::Null => return Ok(SqlValue::Null),
        JsonValue::String(s) => s,
        other => {
            return Err(AssignError::InvalidValue {
                field: column.name.clone(),
                reason: format!("expected a global id, got {other}"),
            });
        }
    };
    let decoded = match &column.foreign_key {
        Some(fk) => decode_for(&TypeNames::for_name(&fk.model).output(), encoded),
        None => from_global_id(encoded).map(|(_, id)| id),
    };
    decoded
        .map(SqlValue::Int)
        .map_err(|source| AssignError::GlobalId {
            field: column.name.clone(),
            source,
        })
}

fn relationship_node(
    catalog: &ModelCatalog,
    rel: &RelationshipDef,
    target: &Arc<ModelDef>,
    raw: &JsonValue,
    depth: usize,
    max_depth: usize,
) -> Result<InputNode, AssignError> {
    let expected_list = || AssignError::InvalidValue {
        field: rel.name.clone(),
        reason: "expected a list".to_string(),
    };

    match &rel.kind {
        RelationKind::ManyToOne { .. } => Ok(InputNode::Nested(parse_at(
            catalog,
            target,
            raw,
            depth + 1,
            max_depth,
        )?)),
        RelationKind::OneToMany { .. } => raw
            .as_array()
            .ok_or_else(expected_list)?
            .iter()
            .map(|item| parse_at(catalog, target, item, depth + 1, max_depth))
            .collect::<Result<Vec<_>, _>>()
            .map(InputNode::NestedList),
        RelationKind::ManyToMany { .. } => {
            let target_type = TypeNames::for_name(&target.name).output();
            raw.as_array()
                .ok_or_else(expected_list)?
                .iter()
                .map(|item| {
                    let encoded = item.as_str().ok_or_else(|| AssignError::InvalidValue {
                        field: rel.name.clone(),
                        reason: format!("expected a global id, got {item}"),
                    })?;
                    decode_lenient(&target_type, encoded).map_err(|source| {
                        AssignError::GlobalId {
                            field: rel.name.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(InputNode::Links)
        }
    }
}

/// Merge `tree` into `instance`.
///
/// Nested parents reuse a related instance already staged on `instance`;
/// otherwise a new one is created. Child lists and link lists replace what
/// was staged before.
pub fn assign(
    instance: &mut Instance,
    tree: &InputTree,
    catalog: &ModelCatalog,
    max_depth: usize,
) -> Result<(), AssignError> {
    assign_at(instance, tree, catalog, 0, max_depth)
}

fn assign_at(
    instance: &mut Instance,
    tree: &InputTree,
    catalog: &ModelCatalog,
    depth: usize,
    max_depth: usize,
) -> Result<(), AssignError> {
    if depth > max_depth {
        return Err(AssignError::TooDeep { limit: max_depth });
    }
    let model = Arc::clone(instance.model());

    for (name, node) in &tree.fields {
        let target = || {
            model
                .relationship_named(name)
                .and_then(|rel| catalog.get(&rel.target))
                .cloned()
                .ok_or_else(|| unknown(&model, name))
        };

        match node {
            InputNode::Value(value) => instance.set(name.clone(), value.clone()),
            InputNode::Nested(sub) => {
                if let Some(Related::One(existing)) = instance.related_mut(name) {
                    assign_at(existing, sub, catalog, depth + 1, max_depth)?;
                } else {
                    let mut parent = Instance::new(target()?);
                    assign_at(&mut parent, sub, catalog, depth + 1, max_depth)?;
                    instance.set_related(name.clone(), Related::One(Box::new(parent)));
                }
            }
            InputNode::NestedList(items) => {
                let target = target()?;
                let children = items
                    .iter()
                    .map(|sub| {
                        let mut child = Instance::new(Arc::clone(&target));
                        assign_at(&mut child, sub, catalog, depth + 1, max_depth)?;
                        Ok(child)
                    })
                    .collect::<Result<Vec<_>, AssignError>>()?;
                instance.set_related(name.clone(), Related::Many(children));
            }
            InputNode::Links(ids) => {
                instance.set_related(name.clone(), Related::Links(ids.clone()));
            }
        }
    }
    Ok(())
}
