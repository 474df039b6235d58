//! Dynamic GraphQL schema synthesis
//!
//! [`SchemaSynthesizer`] walks a [`ModelCatalog`] once at startup and turns
//! the registry's type descriptors into an executable
//! `async_graphql::dynamic::Schema`: one output object, connection, edge,
//! sort enum and pair of input objects per model, a detail and list query
//! field per model, and create/update/delete mutations for every model that
//! is not read-only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{
    Enum, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface, InterfaceField,
    Object, ResolverContext, Scalar, Schema, Type, TypeRef, ValueAccessor,
};
use async_graphql::extensions::Tracing;
use tracing::{debug, info};

use super::filters::{compile, parse_filters};
use super::global_id::{decode_for, from_global_id, to_global_id};
use super::mutation::{MutationAction, MutationArgs, MutationExecutor, MutationHooks, MutationResult};
use super::pagination::{Edge, ListPage, PageInfo};
use super::registry::TypeRegistry;
use super::types::{
    ApiType, DATETIME_SCALAR, FieldDescriptor, FieldSource, GENERIC_SCALAR, InputShape, InputType,
    JSON_SCALAR, OutputType, TypeNames, parse_sort_item, sort_item,
};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::orm::{
    ColumnType, ModelCatalog, ModelDef, Record, RelationshipDef, SelectQuery, SortDirection,
    SqlValue, load_related,
};

pub const QUERY_ROOT: &str = "Query";
pub const MUTATION_ROOT: &str = "Mutation";
pub const NODE_INTERFACE: &str = "Node";
pub const DATABASE_ID_INTERFACE: &str = "DatabaseId";
pub const PAGE_INFO: &str = "PageInfo";

/// Builds the executable schema for a catalog
pub struct SchemaSynthesizer {
    catalog: Arc<ModelCatalog>,
    registry: Arc<TypeRegistry>,
    excluded: HashSet<String>,
    overrides: Vec<(String, MutationAction, Field)>,
    extra_types: Vec<Type>,
    hooks: HashMap<String, Arc<dyn MutationHooks>>,
    max_assign_depth: usize,
}

impl SchemaSynthesizer {
    pub fn new(catalog: Arc<ModelCatalog>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            catalog,
            registry,
            excluded: HashSet::new(),
            overrides: Vec::new(),
            extra_types: Vec::new(),
            hooks: HashMap::new(),
            max_assign_depth: 8,
        }
    }

    /// Make `model` read-only: no default mutations are generated for it.
    pub fn exclude_mutations(mut self, model: impl Into<String>) -> Self {
        self.excluded.insert(model.into());
        self
    }

    /// Mount `field` on the mutation root in place of the default
    /// `action` mutation of `model`.
    pub fn override_mutation(
        mut self,
        model: impl Into<String>,
        action: MutationAction,
        field: Field,
    ) -> Self {
        self.overrides.push((model.into(), action, field));
        self
    }

    /// Register an additional type, e.g. an input used by an override
    pub fn register_type(mut self, ty: impl Into<Type>) -> Self {
        self.extra_types.push(ty.into());
        self
    }

    pub fn hooks(mut self, model: impl Into<String>, hooks: Arc<dyn MutationHooks>) -> Self {
        self.hooks.insert(model.into(), hooks);
        self
    }

    pub fn max_assign_depth(mut self, depth: usize) -> Self {
        self.max_assign_depth = depth;
        self
    }

    pub fn build(self, db: Database) -> Result<Schema> {
        for name in self
            .excluded
            .iter()
            .chain(self.overrides.iter().map(|(model, _, _)| model))
        {
            if self.catalog.get(name).is_none() {
                return Err(Error::UnknownModel(name.clone()));
            }
        }
        let mut seen = HashSet::new();
        for (model, action, _) in &self.overrides {
            if !seen.insert((model.as_str(), *action)) {
                return Err(Error::DuplicateOverride(action.field_name(model)));
            }
        }

        self.registry.populate(&self.catalog);
        let live_inputs = live_input_names(&self.registry.input_types());

        let mut types: Vec<Type> = vec![
            node_interface().into(),
            database_id_interface().into(),
            Scalar::new(DATETIME_SCALAR)
                .description("Date and time as stored, e.g. `2024-01-31 12:00:00`")
                .into(),
            Scalar::new(JSON_SCALAR)
                .description("A JSON document serialized as a string")
                .into(),
            Scalar::new(GENERIC_SCALAR)
                .description("Any JSON-like value")
                .into(),
            page_info_object().into(),
        ];
        let mut query = Object::new(QUERY_ROOT).field(node_field(Arc::clone(&self.catalog)));
        let mut mutation = Object::new(MUTATION_ROOT);
        let mut mutation_count = 0;

        for model in self.catalog.iter() {
            let names = TypeNames::for_name(&model.name);
            let output = self.registry.output_type(model);
            let create_input = self.registry.input_type(model, InputShape::Create);
            let update_input = self.registry.input_type(model, InputShape::Update);

            types.push(output_object(&self.catalog, &output).into());
            types.push(edge_object(&names).into());
            types.push(connection_object(&names).into());
            types.push(sort_enum(model, &names).into());
            types.extend(input_object(&create_input, &live_inputs).map(Type::from));
            types.extend(input_object(&update_input, &live_inputs).map(Type::from));

            query = query
                .field(detail_field(model, &names))
                .field(list_field(model, &names));

            let overridden: Vec<MutationAction> = self
                .overrides
                .iter()
                .filter(|(name, _, _)| *name == model.name)
                .map(|(_, action, _)| *action)
                .collect();
            let excluded = self.excluded.contains(&model.name);
            if excluded && overridden.is_empty() {
                debug!(model = %model.name, "Model is read-only");
                continue;
            }
            types.push(mutation_result_object(&names).into());
            if excluded {
                continue;
            }

            for action in MutationAction::ALL {
                if overridden.contains(&action) {
                    continue;
                }
                let input = match action {
                    MutationAction::Create => Some(&create_input),
                    MutationAction::Update => Some(&update_input),
                    MutationAction::Delete => None,
                }
                .filter(|input| live_inputs.contains(&input.name));
                mutation = mutation.field(mutation_field(model, &names, action, input));
                mutation_count += 1;
            }
        }

        for (model, action, field) in self.overrides {
            debug!(model = %model, ?action, "Mounting mutation override");
            mutation = mutation.field(field);
            mutation_count += 1;
        }

        let mut executor = MutationExecutor::new(Arc::clone(&self.catalog))
            .with_max_assign_depth(self.max_assign_depth);
        for (model, hooks) in self.hooks {
            executor = executor.with_hooks(model, hooks);
        }

        let mut builder = Schema::build(
            QUERY_ROOT,
            (mutation_count > 0).then_some(MUTATION_ROOT),
            None,
        )
        .register(query);
        if mutation_count > 0 {
            builder = builder.register(mutation);
        }
        for ty in types.into_iter().chain(self.extra_types) {
            builder = builder.register(ty);
        }

        let schema = builder
            .data(db)
            .data(Arc::clone(&self.catalog))
            .data(executor)
            .extension(Tracing)
            .finish()
            .map_err(|e| Error::Schema(e.to_string()))?;

        info!(
            models = self.catalog.len(),
            mutations = mutation_count,
            "Synthesized GraphQL schema"
        );
        Ok(schema)
    }
}

// ============================================================================
// Shared types
// ============================================================================

fn node_interface() -> Interface {
    Interface::new(NODE_INTERFACE)
        .description("An object with a global ID")
        .field(InterfaceField::new("id", TypeRef::named_nn(TypeRef::ID)))
}

fn database_id_interface() -> Interface {
    Interface::new(DATABASE_ID_INTERFACE)
        .description("An object with its database primary key")
        .field(InterfaceField::new("db_id", TypeRef::named(TypeRef::INT)))
}

fn page_info_object() -> Object {
    Object::new(PAGE_INFO)
        .field(Field::new(
            "has_next_page",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let info = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
                    Ok(Some(FieldValue::value(info.has_next_page)))
                })
            },
        ))
        .field(Field::new(
            "has_previous_page",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let info = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
                    Ok(Some(FieldValue::value(info.has_previous_page)))
                })
            },
        ))
        .field(Field::new(
            "start_cursor",
            TypeRef::named(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let info = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
                    Ok(info.start_cursor.clone().map(FieldValue::value))
                })
            },
        ))
        .field(Field::new(
            "end_cursor",
            TypeRef::named(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let info = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
                    Ok(info.end_cursor.clone().map(FieldValue::value))
                })
            },
        ))
}

/// Resolve any model's row from its global id
fn node_field(catalog: Arc<ModelCatalog>) -> Field {
    Field::new("node", TypeRef::named(NODE_INTERFACE), move |ctx| {
        let catalog = Arc::clone(&catalog);
        FieldFuture::new(async move {
            let db = ctx.data::<Database>()?;
            let (type_name, id) = from_global_id(ctx.args.try_get("id")?.string()?)?;
            let model = catalog
                .iter()
                .find(|m| TypeNames::for_name(&m.name).output() == type_name)
                .ok_or_else(|| Error::UnknownModel(type_name.clone()))?;

            let record = db.session().get(model, id).await?;
            Ok(record.map(|r| FieldValue::owned_any(r).with_type(type_name)))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
}

// ============================================================================
// Per-model types
// ============================================================================

fn output_object(catalog: &ModelCatalog, output: &OutputType) -> Object {
    let mut object = Object::new(&output.name)
        .implement(NODE_INTERFACE)
        .implement(DATABASE_ID_INTERFACE);
    if let Some(description) = &output.model.description {
        object = object.description(description);
    }

    for descriptor in &output.fields {
        let field = match &descriptor.source {
            FieldSource::GlobalId => global_id_field(&output.name, descriptor),
            FieldSource::DatabaseId => database_id_field(descriptor),
            FieldSource::Column(column) => {
                let Some(col) = output.model.column_named(column) else {
                    continue;
                };
                column_field(descriptor, column, col.column_type)
            }
            FieldSource::Relationship(name) => {
                let Some(rel) = output.model.relationship_named(name) else {
                    continue;
                };
                let Some(target) = catalog.get(&rel.target) else {
                    continue;
                };
                relationship_field(descriptor, rel, target)
            }
        };
        object = object.field(match &descriptor.description {
            Some(description) => field.description(description),
            None => field,
        });
    }
    object
}

fn global_id_field(type_name: &str, descriptor: &FieldDescriptor) -> Field {
    let type_name = type_name.to_string();
    Field::new(
        &descriptor.name,
        descriptor.ty.type_ref(descriptor.required),
        move |ctx| {
            let type_name = type_name.clone();
            FieldFuture::new(async move {
                let record = ctx.parent_value.try_downcast_ref::<Record>()?;
                let id = record
                    .primary_key()
                    .ok_or("row has no primary key")?;
                Ok(Some(FieldValue::value(to_global_id(&type_name, id))))
            })
        },
    )
}

fn database_id_field(descriptor: &FieldDescriptor) -> Field {
    Field::new(
        &descriptor.name,
        descriptor.ty.type_ref(descriptor.required),
        |ctx| {
            FieldFuture::new(async move {
                let record = ctx.parent_value.try_downcast_ref::<Record>()?;
                Ok(record.primary_key().map(FieldValue::value))
            })
        },
    )
}

fn column_field(descriptor: &FieldDescriptor, column: &str, column_type: ColumnType) -> Field {
    let column = column.to_string();
    Field::new(
        &descriptor.name,
        descriptor.ty.type_ref(descriptor.required),
        move |ctx| {
            let column = column.clone();
            FieldFuture::new(async move {
                let record = ctx.parent_value.try_downcast_ref::<Record>()?;
                Ok(column_value(record, &column, column_type).map(FieldValue::value))
            })
        },
    )
}

/// API value of a column; JSON columns stay serialized for `JSONString`.
fn column_value(record: &Record, column: &str, column_type: ColumnType) -> Option<Value> {
    match (column_type, record.get(column)?) {
        (_, SqlValue::Null) => None,
        (ColumnType::Json, SqlValue::String(text)) => Some(Value::String(text.clone())),
        _ => Value::from_json(record.field_json(column)).ok(),
    }
}

fn relationship_field(
    descriptor: &FieldDescriptor,
    relationship: &RelationshipDef,
    target: &Arc<ModelDef>,
) -> Field {
    let relationship = Arc::new(relationship.clone());
    let target = Arc::clone(target);
    Field::new(
        &descriptor.name,
        descriptor.ty.type_ref(descriptor.required),
        move |ctx| {
            let relationship = Arc::clone(&relationship);
            let target = Arc::clone(&target);
            FieldFuture::new(async move {
                let db = ctx.data::<Database>()?;
                let owner = ctx.parent_value.try_downcast_ref::<Record>()?;
                let rows = load_related(db.pool(), &target, &relationship, owner).await?;
                if relationship.is_multiple() {
                    Ok(Some(FieldValue::list(
                        rows.into_iter().map(FieldValue::owned_any),
                    )))
                } else {
                    Ok(rows.into_iter().next().map(FieldValue::owned_any))
                }
            })
        },
    )
}

fn edge_object(names: &TypeNames) -> Object {
    Object::new(names.edge())
        .field(Field::new(
            "node",
            TypeRef::named_nn(names.output()),
            |ctx| {
                FieldFuture::new(async move {
                    let edge = ctx.parent_value.try_downcast_ref::<Edge>()?;
                    Ok(Some(FieldValue::owned_any(edge.node.clone())))
                })
            },
        ))
        .field(Field::new(
            "cursor",
            TypeRef::named_nn(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let edge = ctx.parent_value.try_downcast_ref::<Edge>()?;
                    Ok(Some(FieldValue::value(edge.cursor.clone())))
                })
            },
        ))
}

fn connection_object(names: &TypeNames) -> Object {
    Object::new(names.connection())
        .field(Field::new(
            "items",
            TypeRef::named_nn_list_nn(names.output()),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<ListPage>()?;
                    Ok(Some(FieldValue::list(
                        page.records().iter().cloned().map(FieldValue::owned_any),
                    )))
                })
            },
        ))
        .field(Field::new(
            "edges",
            TypeRef::named_nn_list_nn(names.edge()),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<ListPage>()?;
                    Ok(Some(FieldValue::list(
                        page.edges().into_iter().map(FieldValue::owned_any),
                    )))
                })
            },
        ))
        .field(Field::new(
            "page_info",
            TypeRef::named_nn(PAGE_INFO),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<ListPage>()?;
                    Ok(Some(FieldValue::owned_any(page.page_info().await?)))
                })
            },
        ))
        .field(
            Field::new(
                "total_count",
                TypeRef::named_nn(TypeRef::INT),
                |ctx| {
                    FieldFuture::new(async move {
                        let page = ctx.parent_value.try_downcast_ref::<ListPage>()?;
                        Ok(Some(FieldValue::value(page.total_count().await?)))
                    })
                },
            )
            .description("Number of rows matching the filters, ignoring limit and offset"),
        )
}

fn sort_enum(model: &ModelDef, names: &TypeNames) -> Enum {
    model
        .columns
        .iter()
        .fold(Enum::new(names.sort_enum()), |sort, col| {
            sort.item(sort_item(&col.name, false))
                .item(sort_item(&col.name, true))
        })
}

/// Names of the input types that keep at least one field once fields
/// referring to empty input types are left out
fn live_input_names(inputs: &[Arc<InputType>]) -> HashSet<String> {
    let mut live = HashSet::new();
    loop {
        let before = live.len();
        for input in inputs {
            if input.fields.iter().any(|f| is_live_input_field(f, &live)) {
                live.insert(input.name.clone());
            }
        }
        if live.len() == before {
            return live;
        }
    }
}

fn is_live_input_field(field: &FieldDescriptor, live: &HashSet<String>) -> bool {
    match &field.ty {
        ApiType::Object(name) | ApiType::ObjectList(name) => live.contains(name),
        ApiType::Scalar(_) | ApiType::ScalarList(_) => true,
    }
}

fn input_object(input: &InputType, live: &HashSet<String>) -> Option<InputObject> {
    if !live.contains(&input.name) {
        return None;
    }
    let object = input
        .fields
        .iter()
        .filter(|field| is_live_input_field(field, live))
        .fold(InputObject::new(&input.name), |object, field| {
            let value = InputValue::new(&field.name, field.ty.type_ref(field.required));
            object.field(match &field.description {
                Some(description) => value.description(description),
                None => value,
            })
        });
    Some(object)
}

fn mutation_result_object(names: &TypeNames) -> Object {
    Object::new(names.mutation_result())
        .field(Field::new(
            "output",
            TypeRef::named(names.output()),
            |ctx| {
                FieldFuture::new(async move {
                    let result = ctx.parent_value.try_downcast_ref::<MutationResult>()?;
                    Ok(result.output.clone().map(FieldValue::owned_any))
                })
            },
        ))
        .field(Field::new(
            "ok",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let result = ctx.parent_value.try_downcast_ref::<MutationResult>()?;
                    Ok(Some(FieldValue::value(result.ok)))
                })
            },
        ))
        .field(Field::new(
            "message",
            TypeRef::named_nn(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let result = ctx.parent_value.try_downcast_ref::<MutationResult>()?;
                    Ok(Some(FieldValue::value(result.message.clone())))
                })
            },
        ))
}

// ============================================================================
// Root fields
// ============================================================================

/// A non-null argument, or `None` when absent or explicitly null
fn argument<'c>(ctx: &'c ResolverContext<'_>, name: &str) -> Option<ValueAccessor<'c>> {
    ctx.args.get(name).filter(|value| !value.is_null())
}

fn detail_field(model: &Arc<ModelDef>, names: &TypeNames) -> Field {
    let output_name = names.output();
    let model = Arc::clone(model);
    Field::new(names.detail_field(), TypeRef::named(names.output()), move |ctx| {
        let output_name = output_name.clone();
        let model = Arc::clone(&model);
        FieldFuture::new(async move {
            let db = ctx.data::<Database>()?;
            let id = decode_for(&output_name, ctx.args.try_get("id")?.string()?)?;
            let record = db.session().get(&model, id).await?;
            Ok(record.map(FieldValue::owned_any))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
}

fn list_field(model: &Arc<ModelDef>, names: &TypeNames) -> Field {
    let model = Arc::clone(model);
    Field::new(
        names.list_field(),
        TypeRef::named_nn(names.connection()),
        move |ctx| {
            let model = Arc::clone(&model);
            FieldFuture::new(async move {
                let db = ctx.data::<Database>()?;
                let mut query = SelectQuery::new(Arc::clone(&model));

                if let Some(filters) = argument(&ctx, "filters") {
                    let items = parse_filters(&filters.as_value().clone().into_json()?)?;
                    query = compile(query, &model, &items)?;
                }

                if let Some(sort) = argument(&ctx, "sort") {
                    for item in sort.list()?.iter() {
                        let item = item.enum_name()?;
                        let (column, descending) = parse_sort_item(&model, item)
                            .ok_or_else(|| format!("unknown sort value {item}"))?;
                        let direction = if descending {
                            SortDirection::Desc
                        } else {
                            SortDirection::Asc
                        };
                        query = query.order_by(column, direction);
                    }
                }

                let limit = argument(&ctx, "limit").map(|v| v.i64()).transpose()?;
                let offset = argument(&ctx, "offset").map(|v| v.i64()).transpose()?;
                let page = ListPage::load(db.pool(), query, limit, offset).await?;
                Ok(Some(FieldValue::owned_any(page)))
            })
        },
    )
    .argument(InputValue::new("filters", TypeRef::named(GENERIC_SCALAR)))
    .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("sort", TypeRef::named_nn_list(names.sort_enum())))
}

fn mutation_field(
    model: &Arc<ModelDef>,
    names: &TypeNames,
    action: MutationAction,
    input: Option<&Arc<InputType>>,
) -> Field {
    let resolver_model = Arc::clone(model);
    let mut field = Field::new(
        action.field_name(&model.name),
        TypeRef::named_nn(names.mutation_result()),
        move |ctx| {
            let model = Arc::clone(&resolver_model);
            FieldFuture::new(async move {
                let db = ctx.data::<Database>()?;
                let executor = ctx.data::<MutationExecutor>()?;
                let id = argument(&ctx, "id")
                    .map(|v| v.string().map(str::to_string))
                    .transpose()?;
                let input = argument(&ctx, "input")
                    .map(|v| v.as_value().clone().into_json())
                    .transpose()?;

                let result = executor
                    .execute(db, &model, MutationArgs { action, id, input })
                    .await;
                Ok(Some(FieldValue::owned_any(result)))
            })
        },
    );

    if action != MutationAction::Create {
        field = field.argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)));
    }
    if let Some(input) = input {
        field = field.argument(InputValue::new("input", TypeRef::named_nn(&input.name)));
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ColumnDef, RelationshipDef};

    fn catalog() -> Arc<ModelCatalog> {
        Arc::new(
            ModelCatalog::builder()
                .model_def(
                    ModelDef::new("User")
                        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                        .column(ColumnDef::new("name", ColumnType::String).nullable())
                        .relationship(RelationshipDef::one_to_many(
                            "articles",
                            "Article",
                            "author_id",
                        )),
                )
                .model_def(
                    ModelDef::new("Article")
                        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                        .column(ColumnDef::new("title", ColumnType::String))
                        .column(
                            ColumnDef::new("author_id", ColumnType::Integer)
                                .nullable()
                                .foreign_key("User", "id"),
                        )
                        .relationship(RelationshipDef::many_to_one(
                            "author",
                            "User",
                            "author_id",
                        )),
                )
                .build()
                .unwrap(),
        )
    }

    async fn sdl(synthesizer: SchemaSynthesizer) -> String {
        let db = Database::in_memory().await.unwrap();
        synthesizer.build(db).unwrap().sdl()
    }

    #[tokio::test]
    async fn test_sdl_contains_model_types() {
        let catalog = catalog();
        let registry = Arc::new(TypeRegistry::new());
        let sdl = sdl(SchemaSynthesizer::new(catalog, registry)).await;

        for expected in [
            "type UserOutputType implements Node & DatabaseId",
            "type ArticleConnection",
            "type ArticleEdge",
            "enum ArticleSortEnum",
            "input ArticleInput",
            "input ArticleUpdateInput",
            "type ArticleMutationResult",
            "scalar GenericScalar",
            "createArticle(input: ArticleInput!): ArticleMutationResult!",
            "deleteUser(id: ID!): UserMutationResult!",
        ] {
            assert!(sdl.contains(expected), "missing `{expected}` in:\n{sdl}");
        }
    }

    #[tokio::test]
    async fn test_registry_populated_once() {
        let catalog = catalog();
        let registry = Arc::new(TypeRegistry::new());
        let before = registry.output_type(catalog.get("User").unwrap());
        sdl(SchemaSynthesizer::new(Arc::clone(&catalog), Arc::clone(&registry))).await;
        let after = registry.output_type(catalog.get("User").unwrap());
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(registry.output_count(), 2);
    }

    #[tokio::test]
    async fn test_read_only_catalog_has_no_mutation_root() {
        let catalog = catalog();
        let sdl = sdl(SchemaSynthesizer::new(catalog, Arc::new(TypeRegistry::new()))
            .exclude_mutations("User")
            .exclude_mutations("Article"))
        .await;
        assert!(!sdl.contains("type Mutation"));
        assert!(!sdl.contains("MutationResult"));
    }

    #[tokio::test]
    async fn test_unknown_model_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let Err(err) = SchemaSynthesizer::new(catalog(), Arc::new(TypeRegistry::new()))
            .exclude_mutations("Comment")
            .build(db)
        else {
            panic!("unknown model was accepted");
        };
        assert!(matches!(err, Error::UnknownModel(name) if name == "Comment"));
    }

    #[tokio::test]
    async fn test_relationship_to_model_without_inputs() {
        let catalog = Arc::new(
            ModelCatalog::builder()
                .model_def(
                    ModelDef::new("Tag")
                        .column(ColumnDef::new("id", ColumnType::Integer).primary_key()),
                )
                .model_def(
                    ModelDef::new("Post")
                        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                        .column(
                            ColumnDef::new("tag_id", ColumnType::Integer)
                                .nullable()
                                .foreign_key("Tag", "id"),
                        )
                        .relationship(RelationshipDef::many_to_one("tag", "Tag", "tag_id")),
                )
                .build()
                .unwrap(),
        );
        let sdl = sdl(SchemaSynthesizer::new(catalog, Arc::new(TypeRegistry::new()))).await;

        assert!(!sdl.contains("TagInput"));
        assert!(sdl.contains("input PostInput"));
        assert!(sdl.contains("createTag: TagMutationResult!"));
        assert!(sdl.contains("createPost(input: PostInput!): PostMutationResult!"));
        let post_input = sdl
            .split("input PostInput")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .unwrap();
        assert!(post_input.contains("tag_id: ID"));
        assert!(!post_input.contains("tag:"));
    }

    #[tokio::test]
    async fn test_duplicate_override_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let field = || {
            Field::new("createUser", TypeRef::named_nn(TypeRef::STRING), |_| {
                FieldFuture::new(async move { Ok(Some(FieldValue::value("custom"))) })
            })
        };
        let Err(err) = SchemaSynthesizer::new(catalog(), Arc::new(TypeRegistry::new()))
            .override_mutation("User", MutationAction::Create, field())
            .override_mutation("User", MutationAction::Create, field())
            .build(db)
        else {
            panic!("duplicate override was accepted");
        };
        assert!(matches!(err, Error::DuplicateOverride(name) if name == "createUser"));
    }
}
