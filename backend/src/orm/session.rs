//! Unit-of-work session
//!
//! A [`Session`] collects staged writes ([`Instance`] trees to save, rows to
//! delete) and flushes all of them inside one transaction on
//! [`Session::commit`]. Nothing touches the database before commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use super::builder::SelectQuery;
use super::model::{ModelDef, RelationKind, RelationshipDef};
use super::predicate::{CompareOp, Predicate, quote_ident};
use super::value::{Record, SqlValue};

/// Relationship content staged on an [`Instance`].
#[derive(Debug, Clone)]
pub enum Related {
    /// Many-to-one parent
    One(Box<Instance>),
    /// One-to-many children
    Many(Vec<Instance>),
    /// Primary keys of many-to-many targets; replaces the association
    Links(Vec<i64>),
}

/// A row to insert or update, with nested related rows.
#[derive(Debug, Clone)]
pub struct Instance {
    model: Arc<ModelDef>,
    primary_key: Option<i64>,
    values: BTreeMap<String, SqlValue>,
    relations: BTreeMap<String, Related>,
}

impl Instance {
    /// A transient instance, inserted on flush.
    pub fn new(model: Arc<ModelDef>) -> Self {
        Self {
            model,
            primary_key: None,
            values: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// A persistent row; only assigned columns are written on flush.
    pub fn existing(model: Arc<ModelDef>, primary_key: i64) -> Self {
        Self {
            primary_key: Some(primary_key),
            ..Self::new(model)
        }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn primary_key(&self) -> Option<i64> {
        self.primary_key
    }

    pub fn is_new(&self) -> bool {
        self.primary_key.is_none()
    }

    /// Record the key assigned by the database after a commit.
    pub fn set_primary_key(&mut self, primary_key: i64) {
        self.primary_key = Some(primary_key);
    }

    pub fn set(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &BTreeMap<String, SqlValue> {
        &self.values
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations.get_mut(name)
    }

    pub fn set_related(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }
}

/// Handle returned by [`Session::add`] and [`Session::delete`], used to read
/// the primary key from the [`CommitReceipt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staged(usize);

/// Primary keys of the staged operations, in staging order.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    keys: Vec<i64>,
}

impl CommitReceipt {
    pub fn key(&self, staged: Staged) -> Option<i64> {
        self.keys.get(staged.0).copied()
    }
}

#[derive(Debug)]
enum Pending {
    Save(Instance),
    Delete { model: Arc<ModelDef>, primary_key: i64 },
}

/// ORM-style session over a SQLite pool.
#[derive(Debug)]
pub struct Session {
    pool: SqlitePool,
    pending: Vec<Pending>,
}

impl Session {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            pending: Vec::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a query over `model`.
    pub fn query(&self, model: &Arc<ModelDef>) -> SelectQuery {
        SelectQuery::new(Arc::clone(model))
    }

    /// Fetch one row by primary key.
    pub async fn get(
        &self,
        model: &Arc<ModelDef>,
        primary_key: i64,
    ) -> Result<Option<Record>, sqlx::Error> {
        self.query(model)
            .filter(Predicate::compare(
                model.primary_key_name(),
                CompareOp::Eq,
                SqlValue::Int(primary_key),
            ))
            .limit(1)
            .fetch_optional(&self.pool)
            .await
    }

    /// Stage an instance tree for insert/update.
    pub fn add(&mut self, instance: Instance) -> Staged {
        self.pending.push(Pending::Save(instance));
        Staged(self.pending.len() - 1)
    }

    /// Stage a row for deletion.
    pub fn delete(&mut self, model: Arc<ModelDef>, primary_key: i64) -> Staged {
        self.pending.push(Pending::Delete { model, primary_key });
        Staged(self.pending.len() - 1)
    }

    /// Discard staged work.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Flush all staged work in one transaction.
    ///
    /// On failure the transaction is rolled back and staged work is dropped,
    /// so the session can be reused.
    pub async fn commit(&mut self) -> Result<CommitReceipt, sqlx::Error> {
        let pending = std::mem::take(&mut self.pending);
        let mut tx = self.pool.begin().await?;
        let mut receipt = CommitReceipt::default();

        for op in pending {
            let result = match op {
                Pending::Save(mut instance) => flush(&mut tx, &mut instance).await,
                Pending::Delete { model, primary_key } => {
                    remove(&mut tx, &model, primary_key).await.map(|_| primary_key)
                }
            };
            match result {
                Ok(key) => receipt.keys.push(key),
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback after failed flush also failed");
                    }
                    return Err(e);
                }
            }
        }

        tx.commit().await?;
        Ok(receipt)
    }
}

/// Write one instance tree. Returns the instance's primary key.
fn flush<'a>(
    conn: &'a mut SqliteConnection,
    instance: &'a mut Instance,
) -> BoxFuture<'a, Result<i64, sqlx::Error>> {
    async move {
        let model = Arc::clone(&instance.model);
        let mut relations = std::mem::take(&mut instance.relations);

        // Parents first so the foreign key is known before this row is written
        for (name, related) in relations.iter_mut() {
            let (Some(rel), Related::One(parent)) = (model.relationship_named(name), related)
            else {
                continue;
            };
            let RelationKind::ManyToOne { column } = &rel.kind else {
                continue;
            };
            if parent.primary_key.is_none() {
                parent.primary_key = match instance.values.get(column) {
                    Some(SqlValue::Int(id)) => Some(*id),
                    _ => match instance.primary_key {
                        Some(pk) => current_reference(conn, &model, column, pk).await?,
                        None => None,
                    },
                };
            }
            let parent_key = flush(&mut *conn, parent).await?;
            instance.values.insert(column.clone(), SqlValue::Int(parent_key));
        }

        let key = write_row(conn, instance).await?;

        for (name, related) in relations.iter_mut() {
            let Some(rel) = model.relationship_named(name) else {
                continue;
            };
            match (&rel.kind, related) {
                (RelationKind::OneToMany { remote_column }, Related::Many(children)) => {
                    for child in children.iter_mut() {
                        child.set(remote_column.clone(), SqlValue::Int(key));
                        flush(&mut *conn, child).await?;
                    }
                }
                (RelationKind::ManyToMany { .. }, Related::Links(ids)) => {
                    replace_links(conn, rel, key, ids).await?;
                }
                (RelationKind::ManyToMany { .. }, Related::Many(targets)) => {
                    let mut ids = Vec::with_capacity(targets.len());
                    for target in targets.iter_mut() {
                        ids.push(flush(&mut *conn, target).await?);
                    }
                    replace_links(conn, rel, key, &ids).await?;
                }
                _ => {}
            }
        }

        instance.relations = relations;
        Ok(key)
    }
    .boxed()
}

async fn write_row(conn: &mut SqliteConnection, instance: &mut Instance) -> Result<i64, sqlx::Error> {
    let model = &instance.model;
    let table = quote_ident(&model.table);
    let columns: Vec<&String> = instance.values.keys().collect();
    let binds: Vec<&SqlValue> = instance.values.values().collect();

    match instance.primary_key {
        None => {
            let sql = if columns.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                format!(
                    "INSERT INTO {table} ({}) VALUES ({placeholders})",
                    names.join(", ")
                )
            };
            debug!(sql = %sql, "Inserting row");
            let mut query = sqlx::query(&sql);
            for value in binds {
                query = value.bind_to(query);
            }
            let result = query.execute(&mut *conn).await?;
            let key = instance
                .values
                .get(model.primary_key_name())
                .and_then(SqlValue::as_i64)
                .unwrap_or_else(|| result.last_insert_rowid());
            instance.primary_key = Some(key);
            Ok(key)
        }
        Some(key) => {
            if columns.is_empty() {
                return Ok(key);
            }
            let assignments: Vec<String> = columns
                .iter()
                .map(|c| format!("{} = ?", quote_ident(c)))
                .collect();
            let sql = format!(
                "UPDATE {table} SET {} WHERE {} = ?",
                assignments.join(", "),
                quote_ident(model.primary_key_name())
            );
            debug!(sql = %sql, "Updating row");
            let mut query = sqlx::query(&sql);
            for value in binds {
                query = value.bind_to(query);
            }
            query.bind(key).execute(&mut *conn).await?;
            Ok(key)
        }
    }
}

/// Current value of a foreign key column on a persistent row.
async fn current_reference(
    conn: &mut SqliteConnection,
    model: &ModelDef,
    column: &str,
    primary_key: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        quote_ident(column),
        quote_ident(&model.table),
        quote_ident(model.primary_key_name())
    );
    let value: Option<Option<i64>> = sqlx::query_scalar(&sql)
        .bind(primary_key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(value.flatten())
}

async fn replace_links(
    conn: &mut SqliteConnection,
    rel: &RelationshipDef,
    key: i64,
    ids: &[i64],
) -> Result<(), sqlx::Error> {
    let RelationKind::ManyToMany {
        secondary,
        local_column,
        remote_column,
    } = &rel.kind
    else {
        return Ok(());
    };

    let delete_sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(secondary),
        quote_ident(local_column)
    );
    sqlx::query(&delete_sql).bind(key).execute(&mut *conn).await?;

    let insert_sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        quote_ident(secondary),
        quote_ident(local_column),
        quote_ident(remote_column)
    );
    for id in ids {
        sqlx::query(&insert_sql)
            .bind(key)
            .bind(*id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn remove(
    conn: &mut SqliteConnection,
    model: &ModelDef,
    primary_key: i64,
) -> Result<(), sqlx::Error> {
    for rel in &model.relationships {
        if let RelationKind::ManyToMany {
            secondary,
            local_column,
            ..
        } = &rel.kind
        {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?",
                quote_ident(secondary),
                quote_ident(local_column)
            );
            sqlx::query(&sql).bind(primary_key).execute(&mut *conn).await?;
        }
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(&model.table),
        quote_ident(model.primary_key_name())
    );
    debug!(sql = %sql, "Deleting row");
    sqlx::query(&sql).bind(primary_key).execute(&mut *conn).await?;
    Ok(())
}

/// Load the rows `owner` points at through `relationship`.
pub async fn load_related(
    pool: &SqlitePool,
    target: &Arc<ModelDef>,
    relationship: &RelationshipDef,
    owner: &Record,
) -> Result<Vec<Record>, sqlx::Error> {
    match &relationship.kind {
        RelationKind::ManyToOne { column } => {
            let Some(parent_key) = owner.get(column).and_then(SqlValue::as_i64) else {
                return Ok(Vec::new());
            };
            let parent = SelectQuery::new(Arc::clone(target))
                .filter(Predicate::compare(
                    target.primary_key_name(),
                    CompareOp::Eq,
                    SqlValue::Int(parent_key),
                ))
                .fetch_optional(pool)
                .await?;
            Ok(parent.into_iter().collect())
        }
        RelationKind::OneToMany { remote_column } => {
            let Some(key) = owner.primary_key() else {
                return Ok(Vec::new());
            };
            SelectQuery::new(Arc::clone(target))
                .filter(Predicate::compare(
                    remote_column.clone(),
                    CompareOp::Eq,
                    SqlValue::Int(key),
                ))
                .fetch_all(pool)
                .await
        }
        RelationKind::ManyToMany {
            secondary,
            local_column,
            remote_column,
        } => {
            let Some(key) = owner.primary_key() else {
                return Ok(Vec::new());
            };
            let columns: Vec<String> = target
                .column_names()
                .map(|c| format!("t.{}", quote_ident(c)))
                .collect();
            let sql = format!(
                "SELECT {} FROM {} t JOIN {} s ON s.{} = t.{} WHERE s.{} = ?",
                columns.join(", "),
                quote_ident(&target.table),
                quote_ident(secondary),
                quote_ident(remote_column),
                quote_ident(target.primary_key_name()),
                quote_ident(local_column)
            );
            debug!(sql = %sql, "Loading linked rows");
            let rows = sqlx::query(&sql).bind(key).fetch_all(pool).await?;
            rows.iter().map(|row| Record::from_row(target, row)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, sync_catalog};
    use crate::orm::{ColumnDef, ColumnType, ModelCatalog};

    async fn setup() -> (Database, Arc<ModelDef>) {
        let catalog = ModelCatalog::builder()
            .model_def(
                ModelDef::new("Item")
                    .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnDef::new("name", ColumnType::String)),
            )
            .build()
            .unwrap();
        let db = Database::in_memory().await.unwrap();
        sync_catalog(db.pool(), &catalog).await;
        let model = Arc::clone(catalog.get("Item").unwrap());
        (db, model)
    }

    fn item(model: &Arc<ModelDef>, name: &str) -> Instance {
        let mut instance = Instance::new(Arc::clone(model));
        instance.set("name", SqlValue::String(name.to_string()));
        instance
    }

    #[tokio::test]
    async fn test_commit_returns_generated_keys() {
        let (db, model) = setup().await;
        let mut session = db.session();
        let first = session.add(item(&model, "a"));
        let second = session.add(item(&model, "b"));

        let receipt = session.commit().await.unwrap();
        assert_eq!(receipt.key(first), Some(1));
        assert_eq!(receipt.key(second), Some(2));
        assert_eq!(session.query(&model).count(db.pool()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_work() {
        let (db, model) = setup().await;
        let mut session = db.session();
        let staged = session.add(item(&model, "dropped"));
        session.rollback();

        let receipt = session.commit().await.unwrap();
        assert_eq!(receipt.key(staged), None);
        assert_eq!(session.query(&model).count(db.pool()).await.unwrap(), 0);
    }
}
