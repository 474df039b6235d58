//! Integration tests for the synthesized schema surface

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, TypeRef};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{
    database, example_catalog, example_schema, insert_role, insert_user, role_id, run, run_err,
    synthesizer, user_id,
};
use modelgraph::Error;
use modelgraph::graphql::{MutationAction, to_global_id};
use modelgraph::orm::{ColumnDef, ColumnType, ModelCatalog, ModelDef};

#[tokio::test]
async fn test_sdl_lists_every_model() {
    let (schema, _db) = example_schema().await;
    let sdl = schema.sdl();

    for model in ["User", "Role", "Article"] {
        let lower = model.to_lowercase();
        for expected in [
            format!("type {model}OutputType implements Node & DatabaseId"),
            format!("type {model}Connection"),
            format!("enum {model}SortEnum"),
            format!("input {model}Input"),
            format!("input {model}UpdateInput"),
            format!("{lower}(id: ID!): {model}OutputType"),
            format!("create{model}("),
            format!("update{model}("),
            format!("delete{model}("),
        ] {
            assert!(sdl.contains(&expected), "missing `{expected}`");
        }
    }
    assert!(sdl.contains("interface Node"));
    assert!(sdl.contains("scalar DateTime"));
}

#[tokio::test]
async fn test_detail_and_node_resolve_rows() {
    let (schema, db) = example_schema().await;
    insert_user(&db, Some("ada")).await;

    let data = run(
        &schema,
        r#"query ($id: ID!) {
            user(id: $id) { id db_id name }
            node(id: $id) { id ... on UserOutputType { name } }
        }"#,
        json!({ "id": user_id(1) }),
    )
    .await;
    assert_eq!(
        data["user"],
        json!({ "id": user_id(1), "db_id": 1, "name": "ada" })
    );
    assert_eq!(data["node"], json!({ "id": user_id(1), "name": "ada" }));

    let missing = run(
        &schema,
        r#"query ($id: ID!) { user(id: $id) { name } node(id: $id) { id } }"#,
        json!({ "id": user_id(42) }),
    )
    .await;
    assert_eq!(missing, json!({ "user": null, "node": null }));
}

#[tokio::test]
async fn test_detail_rejects_foreign_global_id() {
    let (schema, db) = example_schema().await;
    insert_role(&db, "admin").await;

    let errors = run_err(
        &schema,
        r#"query ($id: ID!) { user(id: $id) { name } }"#,
        json!({ "id": role_id(1) }),
    )
    .await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("RoleOutputType"), "{errors:?}");
}

#[tokio::test]
async fn test_relationship_fields() {
    let (schema, db) = example_schema().await;
    insert_user(&db, Some("ada")).await;
    insert_role(&db, "admin").await;
    sqlx::query("INSERT INTO user_role (user_id, role_id) VALUES (1, 1)")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO article (title, author_id, text) VALUES ('notes', 1, 'body')")
        .execute(db.pool())
        .await
        .unwrap();

    let data = run(
        &schema,
        r#"{
            article_list {
                items {
                    title
                    create_time
                    author { name roles { name users { name } } articles { title } }
                }
            }
        }"#,
        json!({}),
    )
    .await;
    let article = &data["article_list"]["items"][0];
    assert_eq!(article["title"], "notes");
    assert!(article["create_time"].is_string());
    assert_eq!(
        article["author"],
        json!({
            "name": "ada",
            "roles": [{ "name": "admin", "users": [{ "name": "ada" }] }],
            "articles": [{ "title": "notes" }],
        })
    );
}

#[tokio::test]
async fn test_read_only_model_has_no_mutations() {
    let catalog = example_catalog();
    let db = database(&catalog).await;
    let schema = synthesizer(&catalog)
        .exclude_mutations("Role")
        .build(db.clone())
        .unwrap();
    let sdl = schema.sdl();

    assert!(!sdl.contains("createRole"));
    assert!(!sdl.contains("deleteRole"));
    assert!(!sdl.contains("RoleMutationResult"));
    assert!(sdl.contains("createUser"));
    assert!(sdl.contains("role_list"));

    let errors = run_err(
        &schema,
        r#"mutation { createRole(input: { name: "x" }) { ok } }"#,
        json!({}),
    )
    .await;
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_override_replaces_default_mutation() {
    let catalog = example_catalog();
    let db = database(&catalog).await;
    let custom = Field::new("createRole", TypeRef::named_nn(TypeRef::STRING), |_| {
        FieldFuture::new(async move { Ok(Some(FieldValue::value("custom role"))) })
    });
    let schema = synthesizer(&catalog)
        .override_mutation("Role", MutationAction::Create, custom)
        .build(db.clone())
        .unwrap();

    let sdl = schema.sdl();
    assert!(sdl.contains("createRole: String!"));
    assert!(!sdl.contains("createRole(input"));
    assert!(sdl.contains("updateRole("));

    let data = run(&schema, "mutation { createRole }", json!({})).await;
    assert_eq!(data, json!({ "createRole": "custom role" }));
}

#[tokio::test]
async fn test_override_for_unknown_model_fails() {
    let catalog = example_catalog();
    let db = database(&catalog).await;
    let custom = Field::new("createTag", TypeRef::named(TypeRef::STRING), |_| {
        FieldFuture::new(async move { Ok(None::<FieldValue>) })
    });
    let Err(err) = synthesizer(&catalog)
        .override_mutation("Tag", MutationAction::Create, custom)
        .build(db)
    else {
        panic!("override for an unknown model was accepted");
    };
    assert_matches!(err, Error::UnknownModel(name) if name == "Tag");
}

fn ticket_catalog() -> Arc<ModelCatalog> {
    Arc::new(
        ModelCatalog::builder()
            .model_def(
                ModelDef::new("Owner")
                    .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnDef::new("name", ColumnType::String).nullable()),
            )
            .model_def(
                ModelDef::new("Ticket")
                    .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnDef::new("valid", ColumnType::Boolean))
                    .column(ColumnDef::new("payload", ColumnType::Json).nullable())
                    .column(ColumnDef::new("labels", ColumnType::StringArray).nullable())
                    .column(
                        ColumnDef::new("owner_id", ColumnType::Integer)
                            .nullable()
                            .foreign_key("Owner", "id"),
                    ),
            )
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn test_column_types_and_id_suffix_fields() {
    let catalog = ticket_catalog();
    let db = database(&catalog).await;
    let schema = synthesizer(&catalog).build(db.clone()).unwrap();
    sqlx::query("INSERT INTO owner (name) VALUES ('o')")
        .execute(db.pool())
        .await
        .unwrap();

    let data = run(
        &schema,
        r#"mutation Create($input: TicketInput!) {
            createTicket(input: $input) {
                ok
                message
                output { valid payload labels owner_id }
            }
        }"#,
        json!({ "input": {
            "valid": false,
            "payload": "{\"a\": 1}",
            "labels": ["x", "y"],
            "owner_id": to_global_id("OwnerOutputType", 1),
        } }),
    )
    .await;

    let result = &data["createTicket"];
    assert_eq!(result["ok"], true, "{result}");
    let output = &result["output"];
    assert_eq!(output["valid"], false);
    assert_eq!(output["labels"], json!(["x", "y"]));
    assert_eq!(output["owner_id"], 1);
    let payload: serde_json::Value =
        serde_json::from_str(output["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload, json!({ "a": 1 }));

    let list = run(
        &schema,
        r#"query ($filters: GenericScalar) { ticket_list(filters: $filters) { total_count } }"#,
        json!({ "filters": [{ "key": "valid", "op": "==", "val": false }] }),
    )
    .await;
    assert_eq!(list["ticket_list"]["total_count"], 1);
}
