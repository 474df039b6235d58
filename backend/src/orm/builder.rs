//! SQL query builder for model tables
//!
//! Builds parameterized SELECT and COUNT statements from a model definition
//! and a list of predicates. Every builder method consumes and returns the
//! query, so a query value is never shared between callers.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::model::ModelDef;
use super::predicate::{Predicate, quote_ident};
use super::value::{Record, SqlValue};

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A SELECT over one model's table.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    model: Arc<ModelDef>,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    pub fn new(model: Arc<ModelDef>) -> Self {
        Self {
            model,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// AND a predicate onto the query.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Same filters and ordering, without LIMIT/OFFSET.
    pub fn clear_pagination(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    fn where_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let clauses: Vec<String> = self.predicates.iter().map(|p| p.to_sql(binds)).collect();
        format!(" WHERE {}", clauses.join(" AND "))
    }

    /// Build the SQL query string and its bind values.
    pub fn build_sql(&self) -> (String, Vec<SqlValue>) {
        let columns: Vec<String> = self.model.column_names().map(quote_ident).collect();
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(&self.model.table)
        );
        sql.push_str(&self.where_sql(&mut binds));

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(col, dir)| format!("{} {}", quote_ident(col), dir.to_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        (sql, binds)
    }

    /// Build a COUNT query string. Pagination is ignored.
    pub fn build_count_sql(&self) -> (String, Vec<SqlValue>) {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.model.table));
        sql.push_str(&self.where_sql(&mut binds));
        (sql, binds)
    }

    /// Execute the query and return all matching rows.
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<Record>, sqlx::Error> {
        let (sql, binds) = self.build_sql();
        tracing::debug!(sql = %sql, model = %self.model.name, "Executing model query");

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = value.bind_to(query);
        }

        let rows = query.fetch_all(pool).await?;
        rows.iter()
            .map(|row| Record::from_row(&self.model, row))
            .collect()
    }

    /// Execute the query and return the first row, if any.
    pub async fn fetch_optional(&self, pool: &SqlitePool) -> Result<Option<Record>, sqlx::Error> {
        let (sql, binds) = self.build_sql();
        tracing::debug!(sql = %sql, model = %self.model.name, "Executing model query (one)");

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = value.bind_to(query);
        }

        match query.fetch_optional(pool).await? {
            Some(row) => Ok(Some(Record::from_row(&self.model, &row)?)),
            None => Ok(None),
        }
    }

    /// Execute a COUNT query.
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let (sql, binds) = self.build_count_sql();
        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = value.bind_to(query);
        }

        query.fetch_one(pool).await
    }
}
