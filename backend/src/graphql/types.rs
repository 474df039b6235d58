//! Synthesized API type descriptors
//!
//! [`OutputType`] and [`InputType`] describe, per model, which GraphQL fields
//! exist and how they map back to columns and relationships. They are plain
//! data; `schema.rs` turns them into `async_graphql::dynamic` objects.

use std::sync::Arc;

use async_graphql::dynamic::TypeRef;

use crate::orm::{ColumnDef, ColumnType, ModelDef, RelationKind, RelationshipDef};

pub const DATETIME_SCALAR: &str = "DateTime";
pub const JSON_SCALAR: &str = "JSONString";
pub const GENERIC_SCALAR: &str = "GenericScalar";

/// Shape of a field's GraphQL type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiType {
    Scalar(&'static str),
    ScalarList(&'static str),
    Object(String),
    ObjectList(String),
}

impl ApiType {
    /// Scalar type for a column
    pub fn for_column(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Integer => ApiType::Scalar(TypeRef::INT),
            ColumnType::Float => ApiType::Scalar(TypeRef::FLOAT),
            ColumnType::String | ColumnType::Text => ApiType::Scalar(TypeRef::STRING),
            ColumnType::Boolean => ApiType::Scalar(TypeRef::BOOLEAN),
            ColumnType::DateTime => ApiType::Scalar(DATETIME_SCALAR),
            ColumnType::Json => ApiType::Scalar(JSON_SCALAR),
            ColumnType::StringArray => ApiType::ScalarList(TypeRef::STRING),
        }
    }

    /// Type reference; list items are always non-null.
    pub fn type_ref(&self, required: bool) -> TypeRef {
        match (self, required) {
            (ApiType::Scalar(name), true) => TypeRef::named_nn(*name),
            (ApiType::Scalar(name), false) => TypeRef::named(*name),
            (ApiType::ScalarList(name), true) => TypeRef::named_nn_list_nn(*name),
            (ApiType::ScalarList(name), false) => TypeRef::named_nn_list(*name),
            (ApiType::Object(name), true) => TypeRef::named_nn(name.as_str()),
            (ApiType::Object(name), false) => TypeRef::named(name.as_str()),
            (ApiType::ObjectList(name), true) => TypeRef::named_nn_list_nn(name.as_str()),
            (ApiType::ObjectList(name), false) => TypeRef::named_nn_list(name.as_str()),
        }
    }
}

/// Where a field's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Relay global id of the row
    GlobalId,
    /// Raw primary key of the row
    DatabaseId,
    Column(String),
    Relationship(String),
}

/// One synthesized field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: ApiType,
    pub required: bool,
    pub description: Option<String>,
    pub source: FieldSource,
}

/// All names generated for one model
#[derive(Debug, Clone)]
pub struct TypeNames {
    model: String,
}

impl TypeNames {
    pub fn for_name(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }

    pub fn output(&self) -> String {
        format!("{}OutputType", self.model)
    }

    pub fn input(&self) -> String {
        format!("{}Input", self.model)
    }

    pub fn update_input(&self) -> String {
        format!("{}UpdateInput", self.model)
    }

    pub fn connection(&self) -> String {
        format!("{}Connection", self.model)
    }

    pub fn edge(&self) -> String {
        format!("{}Edge", self.model)
    }

    pub fn mutation_result(&self) -> String {
        format!("{}MutationResult", self.model)
    }

    pub fn sort_enum(&self) -> String {
        format!("{}SortEnum", self.model)
    }

    /// Detail query field, e.g. `user`
    pub fn detail_field(&self) -> String {
        self.model.to_lowercase()
    }

    /// List query field, e.g. `user_list`
    pub fn list_field(&self) -> String {
        format!("{}_list", self.model.to_lowercase())
    }
}

/// Output (read) type of a model
#[derive(Debug)]
pub struct OutputType {
    pub name: String,
    pub model: Arc<ModelDef>,
    pub fields: Vec<FieldDescriptor>,
}

impl OutputType {
    pub fn from_model(model: &Arc<ModelDef>) -> Self {
        let mut fields = vec![
            FieldDescriptor {
                name: "id".to_string(),
                ty: ApiType::Scalar(TypeRef::ID),
                required: true,
                description: Some("The ID of the object".to_string()),
                source: FieldSource::GlobalId,
            },
            FieldDescriptor {
                name: "db_id".to_string(),
                ty: ApiType::Scalar(TypeRef::INT),
                required: false,
                description: Some("Database primary key".to_string()),
                source: FieldSource::DatabaseId,
            },
        ];

        fields.extend(
            model
                .columns
                .iter()
                .filter(|c| c.name != "id")
                .map(|col| FieldDescriptor {
                    name: col.name.clone(),
                    ty: ApiType::for_column(col.column_type),
                    required: !col.nullable,
                    description: col.description.clone(),
                    source: FieldSource::Column(col.name.clone()),
                }),
        );

        fields.extend(model.relationships.iter().map(|rel| {
            let target = TypeNames::for_name(&rel.target).output();
            FieldDescriptor {
                name: rel.name.clone(),
                ty: if rel.is_multiple() {
                    ApiType::ObjectList(target)
                } else {
                    ApiType::Object(target)
                },
                required: rel.is_multiple(),
                description: rel.description.clone(),
                source: FieldSource::Relationship(rel.name.clone()),
            }
        }));

        Self {
            name: TypeNames::for_name(&model.name).output(),
            model: Arc::clone(model),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Which mutation an input type serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputShape {
    /// Non-null columns are required
    Create,
    /// Every field is optional
    Update,
}

/// Input (write) type of a model
#[derive(Debug)]
pub struct InputType {
    pub name: String,
    pub model: Arc<ModelDef>,
    pub shape: InputShape,
    pub fields: Vec<FieldDescriptor>,
}

impl InputType {
    pub fn from_model(model: &Arc<ModelDef>, shape: InputShape) -> Self {
        let names = TypeNames::for_name(&model.name);
        let mut fields: Vec<FieldDescriptor> = model
            .columns
            .iter()
            .filter(|c| c.name != "id" && !c.is_server_generated())
            .map(|col| column_input(model, col, shape))
            .collect();
        fields.extend(model.relationships.iter().map(|rel| relationship_input(rel, shape)));

        Self {
            name: match shape {
                InputShape::Create => names.input(),
                InputShape::Update => names.update_input(),
            },
            model: Arc::clone(model),
            shape,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn column_input(model: &ModelDef, col: &ColumnDef, shape: InputShape) -> FieldDescriptor {
    // A foreign key may be filled from the nested parent instead
    let set_by_relationship = model.relationships.iter().any(
        |rel| matches!(&rel.kind, RelationKind::ManyToOne { column } if *column == col.name),
    );
    let required = shape == InputShape::Create
        && !col.nullable
        && col.server_default.is_none()
        && !set_by_relationship;

    let (ty, description) = if col.global_id {
        (
            ApiType::Scalar(TypeRef::ID),
            col.description.clone().or_else(|| Some("Global Id".to_string())),
        )
    } else {
        (ApiType::for_column(col.column_type), col.description.clone())
    };

    FieldDescriptor {
        name: col.name.clone(),
        ty,
        required,
        description,
        source: FieldSource::Column(col.name.clone()),
    }
}

fn relationship_input(rel: &RelationshipDef, shape: InputShape) -> FieldDescriptor {
    let target = TypeNames::for_name(&rel.target);
    let ty = match &rel.kind {
        RelationKind::ManyToOne { .. } => ApiType::Object(match shape {
            InputShape::Create => target.input(),
            InputShape::Update => target.update_input(),
        }),
        RelationKind::OneToMany { .. } => ApiType::ObjectList(target.input()),
        RelationKind::ManyToMany { .. } => ApiType::ScalarList(TypeRef::ID),
    };
    FieldDescriptor {
        name: rel.name.clone(),
        ty,
        required: false,
        description: rel.description.clone(),
        source: FieldSource::Relationship(rel.name.clone()),
    }
}

/// Sort enum item for a column, e.g. `NAME_ASC`
pub fn sort_item(column: &str, descending: bool) -> String {
    let suffix = if descending { "DESC" } else { "ASC" };
    format!("{}_{}", column.to_uppercase(), suffix)
}

/// Resolve a sort enum item back to its column
pub fn parse_sort_item<'m>(model: &'m ModelDef, item: &str) -> Option<(&'m str, bool)> {
    let (column, descending) = match item.rsplit_once('_')? {
        (column, "ASC") => (column, false),
        (column, "DESC") => (column, true),
        _ => return None,
    };
    model
        .columns
        .iter()
        .find(|c| c.name.to_uppercase() == column)
        .map(|c| (c.name.as_str(), descending))
}
