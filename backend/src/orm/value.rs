//! Bind values and decoded rows.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use sqlx::query::{Query, QueryScalar};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Encode, Row, Type};

use super::model::{ColumnType, ModelDef};

/// SQL value for parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// A SQLite query that takes positional parameters
pub trait BindParam<'q>: Sized {
    fn bind_param<T: 'q + Send + Encode<'q, Sqlite> + Type<Sqlite>>(self, value: T) -> Self;
}

impl<'q> BindParam<'q> for Query<'q, Sqlite, SqliteArguments<'q>> {
    fn bind_param<T: 'q + Send + Encode<'q, Sqlite> + Type<Sqlite>>(self, value: T) -> Self {
        self.bind(value)
    }
}

impl<'q, O> BindParam<'q> for QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    fn bind_param<T: 'q + Send + Encode<'q, Sqlite> + Type<Sqlite>>(self, value: T) -> Self {
        self.bind(value)
    }
}

impl SqlValue {
    /// Bind this value as the next positional parameter.
    pub fn bind_to<'q, Q: BindParam<'q>>(&'q self, query: Q) -> Q {
        match self {
            SqlValue::String(s) => query.bind_param(s.as_str()),
            SqlValue::Int(i) => query.bind_param(*i),
            SqlValue::Float(f) => query.bind_param(*f),
            SqlValue::Bool(b) => query.bind_param(i64::from(*b)),
            SqlValue::Null => query.bind_param(None::<String>),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Untyped conversion of a JSON scalar.
    ///
    /// Arrays and objects are stored as their serialized text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => SqlValue::String(s.clone()),
            other => SqlValue::String(other.to_string()),
        }
    }

    /// Convert a JSON input value for a column of type `column_type`.
    ///
    /// Returns a short reason on type mismatch.
    pub fn from_json_typed(column_type: ColumnType, value: &JsonValue) -> Result<Self, String> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        match column_type {
            ColumnType::Integer => value
                .as_i64()
                .map(SqlValue::Int)
                .ok_or_else(|| format!("expected an integer, got {value}")),
            ColumnType::Float => value
                .as_f64()
                .map(SqlValue::Float)
                .ok_or_else(|| format!("expected a number, got {value}")),
            ColumnType::Boolean => value
                .as_bool()
                .map(SqlValue::Bool)
                .ok_or_else(|| format!("expected a boolean, got {value}")),
            ColumnType::String | ColumnType::Text | ColumnType::DateTime => value
                .as_str()
                .map(|s| SqlValue::String(s.to_string()))
                .ok_or_else(|| format!("expected a string, got {value}")),
            ColumnType::Json => match value {
                JsonValue::String(s) => serde_json::from_str::<JsonValue>(s)
                    .map(|_| SqlValue::String(s.clone()))
                    .map_err(|e| format!("invalid JSON string: {e}")),
                other => Ok(SqlValue::String(other.to_string())),
            },
            ColumnType::StringArray => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("expected a list of strings, got {value}"))?;
                if items.iter().any(|v| !v.is_string()) {
                    return Err("expected a list of strings".to_string());
                }
                Ok(SqlValue::String(value.to_string()))
            }
        }
    }

    /// JSON form used in API responses.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::String(s) => JsonValue::String(s.clone()),
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Null => JsonValue::Null,
        }
    }
}

/// One decoded row of a model's table.
#[derive(Debug, Clone)]
pub struct Record {
    model: Arc<ModelDef>,
    values: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new(model: Arc<ModelDef>, values: Vec<(String, SqlValue)>) -> Self {
        Self { model, values }
    }

    /// Decode every declared column of `model` from `row`.
    pub fn from_row(model: &Arc<ModelDef>, row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let mut values = Vec::with_capacity(model.columns.len());
        for col in &model.columns {
            let name = col.name.as_str();
            let value = match col.column_type {
                ColumnType::Integer => row
                    .try_get_unchecked::<Option<i64>, _>(name)?
                    .map_or(SqlValue::Null, SqlValue::Int),
                ColumnType::Float => row
                    .try_get_unchecked::<Option<f64>, _>(name)?
                    .map_or(SqlValue::Null, SqlValue::Float),
                ColumnType::Boolean => row
                    .try_get_unchecked::<Option<bool>, _>(name)?
                    .map_or(SqlValue::Null, SqlValue::Bool),
                _ => row
                    .try_get_unchecked::<Option<String>, _>(name)?
                    .map_or(SqlValue::Null, SqlValue::String),
            };
            values.push((col.name.clone(), value));
        }
        Ok(Self {
            model: Arc::clone(model),
            values,
        })
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn primary_key(&self) -> Option<i64> {
        self.get(self.model.primary_key_name())
            .and_then(SqlValue::as_i64)
    }

    /// Column value as API JSON.
    ///
    /// JSON and string-array columns are parsed back from their stored text.
    pub fn field_json(&self, column: &str) -> JsonValue {
        let Some(value) = self.get(column) else {
            return JsonValue::Null;
        };
        let column_type = self
            .model
            .column_named(column)
            .map(|c| c.column_type);
        match (column_type, value) {
            (Some(ColumnType::Json | ColumnType::StringArray), SqlValue::String(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
            }
            (_, v) => v.to_json(),
        }
    }

    /// Whole row as a JSON object keyed by column name.
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .values
            .iter()
            .map(|(name, _)| (name.clone(), self.field_json(name)))
            .collect();
        JsonValue::Object(map)
    }

    /// Deserialize the row into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}
