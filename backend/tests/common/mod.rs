//! Shared setup for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Variables};
use serde_json::Value as JsonValue;

use modelgraph::db::{Database, sync_catalog};
use modelgraph::entities;
use modelgraph::graphql::{SchemaSynthesizer, TypeRegistry, to_global_id};
use modelgraph::orm::ModelCatalog;

/// In-memory database with the example tables created
pub async fn database(catalog: &ModelCatalog) -> Database {
    let db = Database::in_memory().await.unwrap();
    let result = sync_catalog(db.pool(), catalog).await;
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    db
}

pub fn example_catalog() -> Arc<ModelCatalog> {
    Arc::new(entities::catalog().unwrap())
}

pub fn synthesizer(catalog: &Arc<ModelCatalog>) -> SchemaSynthesizer {
    SchemaSynthesizer::new(Arc::clone(catalog), Arc::new(TypeRegistry::new()))
}

/// Example schema with default mutations everywhere
pub async fn example_schema() -> (Schema, Database) {
    let catalog = example_catalog();
    let db = database(&catalog).await;
    let schema = synthesizer(&catalog).build(db.clone()).unwrap();
    (schema, db)
}

/// Execute and return `data`, failing on any GraphQL error
pub async fn run(schema: &Schema, query: &str, variables: JsonValue) -> JsonValue {
    let response = schema
        .execute(Request::new(query).variables(Variables::from_json(variables)))
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    response.data.into_json().unwrap()
}

/// Execute and return the error messages
pub async fn run_err(schema: &Schema, query: &str, variables: JsonValue) -> Vec<String> {
    let response = schema
        .execute(Request::new(query).variables(Variables::from_json(variables)))
        .await;
    response.errors.into_iter().map(|e| e.message).collect()
}

pub async fn insert_user(db: &Database, name: Option<&str>) -> i64 {
    sqlx::query("INSERT INTO \"user\" (name, password) VALUES (?, 'secret')")
        .bind(name)
        .execute(db.pool())
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_role(db: &Database, name: &str) -> i64 {
    sqlx::query("INSERT INTO role (name) VALUES (?)")
        .bind(name)
        .execute(db.pool())
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn count(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

pub fn user_id(id: i64) -> String {
    to_global_id("UserOutputType", id)
}

pub fn role_id(id: i64) -> String {
    to_global_id("RoleOutputType", id)
}
