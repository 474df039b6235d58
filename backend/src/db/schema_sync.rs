//! Table creation from model definitions
//!
//! Bootstraps a database for the models in a [`ModelCatalog`]:
//! - Creates missing tables, including many-to-many association tables
//! - Adds missing columns
//! - Does NOT handle column renames, type changes or drops

use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::orm::{ColumnDef, ModelCatalog, ModelDef, RelationKind, quote_ident};

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.errors.extend(other.errors);
    }
}

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Get existing columns for a table
async fn get_table_columns(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({})", quote_ident(table_name)))
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(_, name, _, _, _, _)| name).collect())
}

async fn create(pool: &SqlitePool, table_name: &str, sql: &str, result: &mut SchemaSyncResult) {
    debug!("Creating table {}: {}", table_name, sql);
    match sqlx::query(sql).execute(pool).await {
        Ok(_) => {
            info!("Created table: {}", table_name);
            result.tables_created.push(table_name.to_string());
        }
        Err(e) => {
            let msg = format!("Failed to create table {}: {}", table_name, e);
            warn!("{}", msg);
            result.errors.push(msg);
        }
    }
}

/// Sync a single model's table to the database
pub async fn sync_model(
    pool: &SqlitePool,
    catalog: &ModelCatalog,
    model: &ModelDef,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table_name = model.table.as_str();

    if !table_exists(pool, table_name).await? {
        let create_sql = create_table_sql(catalog, model);
        create(pool, table_name, &create_sql, &mut result).await;
        return Ok(result);
    }

    let existing_columns = get_table_columns(pool, table_name).await?;
    for col_def in &model.columns {
        if existing_columns.iter().any(|c| *c == col_def.name) {
            continue;
        }
        let alter_sql = generate_add_column_sql(table_name, col_def);
        debug!("Adding column to {}: {}", table_name, alter_sql);

        match sqlx::query(&alter_sql).execute(pool).await {
            Ok(_) => {
                info!("Added column {}.{}", table_name, col_def.name);
                result
                    .columns_added
                    .push((table_name.to_string(), col_def.name.clone()));
            }
            Err(e) => {
                let msg = format!(
                    "Failed to add column {}.{}: {}",
                    table_name, col_def.name, e
                );
                warn!("{}", msg);
                result.errors.push(msg);
            }
        }
    }

    Ok(result)
}

/// Generate CREATE TABLE SQL for a model
pub fn create_table_sql(catalog: &ModelCatalog, model: &ModelDef) -> String {
    let mut defs: Vec<String> = model.columns.iter().map(column_sql).collect();

    for col in &model.columns {
        let Some(fk) = &col.foreign_key else {
            continue;
        };
        let target_table = catalog
            .get(&fk.model)
            .map(|m| m.table.clone())
            .unwrap_or_else(|| fk.model.clone());
        defs.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&col.name),
            quote_ident(&target_table),
            quote_ident(&fk.column)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(&model.table),
        defs.join(",\n    ")
    )
}

fn column_sql(col: &ColumnDef) -> String {
    let mut sql = format!("{} {}", quote_ident(&col.name), col.column_type.sql_type());
    if col.primary_key {
        sql.push_str(" PRIMARY KEY");
        if col.autoincrement {
            sql.push_str(" AUTOINCREMENT");
        }
    } else if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &col.server_default {
        sql.push_str(&format!(" DEFAULT {}", default_expr(default)));
    }
    sql
}

/// SQLite wants expressions other than literals and keywords in parentheses
fn default_expr(raw: &str) -> String {
    let keyword = matches!(
        raw.to_ascii_uppercase().as_str(),
        "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME" | "NULL" | "TRUE" | "FALSE"
    );
    let literal = raw.starts_with('\'') || raw.parse::<f64>().is_ok();
    if keyword || literal || raw.starts_with('(') {
        raw.to_string()
    } else {
        format!("({raw})")
    }
}

/// Generate ALTER TABLE ADD COLUMN SQL
fn generate_add_column_sql(table_name: &str, col: &ColumnDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table_name),
        quote_ident(&col.name),
        col.column_type.sql_type()
    );

    // SQLite cannot add PRIMARY KEY or UNIQUE columns, and NOT NULL needs a default
    if let Some(default) = &col.server_default {
        sql.push_str(&format!(" DEFAULT {}", default_expr(default)));
    } else if !col.nullable {
        let default_val = match col.column_type.sql_type() {
            "INTEGER" | "BOOLEAN" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {}", default_val));
    }

    sql
}

/// Generate CREATE TABLE SQL for an association table
fn association_table_sql(
    secondary: &str,
    local_column: &str,
    local: &ModelDef,
    remote_column: &str,
    remote: &ModelDef,
) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {t} (\n    {l} INTEGER NOT NULL REFERENCES {lt} ({lpk}),\n    {r} INTEGER NOT NULL REFERENCES {rt} ({rpk}),\n    UNIQUE ({l}, {r})\n)",
        t = quote_ident(secondary),
        l = quote_ident(local_column),
        lt = quote_ident(&local.table),
        lpk = quote_ident(local.primary_key_name()),
        r = quote_ident(remote_column),
        rt = quote_ident(&remote.table),
        rpk = quote_ident(remote.primary_key_name()),
    )
}

/// Sync every model of the catalog, then the association tables.
///
/// Tables are created in catalog order; SQLite resolves REFERENCES lazily so
/// forward references are fine.
pub async fn sync_catalog(pool: &SqlitePool, catalog: &ModelCatalog) -> SchemaSyncResult {
    let mut total_result = SchemaSyncResult::default();

    for model in catalog.iter() {
        match sync_model(pool, catalog, model).await {
            Ok(result) => total_result.merge(result),
            Err(e) => total_result
                .errors
                .push(format!("Error syncing {}: {}", model.name, e)),
        }
    }

    let mut seen = HashSet::new();
    for model in catalog.iter() {
        for rel in &model.relationships {
            let RelationKind::ManyToMany {
                secondary,
                local_column,
                remote_column,
            } = &rel.kind
            else {
                continue;
            };
            // Both sides of a many-to-many declare the same table
            if !seen.insert(secondary.clone()) {
                continue;
            }
            let Some(remote) = catalog.get(&rel.target) else {
                continue;
            };
            match table_exists(pool, secondary).await {
                Ok(true) => {}
                Ok(false) => {
                    let sql =
                        association_table_sql(secondary, local_column, model, remote_column, remote);
                    create(pool, secondary, &sql, &mut total_result).await;
                }
                Err(e) => total_result
                    .errors
                    .push(format!("Error syncing {}: {}", secondary, e)),
            }
        }
    }

    total_result
}
