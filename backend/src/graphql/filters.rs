//! Filter descriptors for list queries
//!
//! List fields take a `filters` argument shaped like:
//!
//! ```json
//! [
//!   {"key": "title", "op": "starts", "val": "Intro"},
//!   [{"key": "author_id", "op": "==", "val": 1}, {"key": "author_id", "op": "==", "val": 2}]
//! ]
//! ```
//!
//! Top-level items are ANDed together; an item that is itself a list is an
//! OR-group. Supported operators:
//! - `==`, `!=`, `<`, `<=`, `>`, `>=` (comparison; `null` with `==`/`!=`
//!   tests for NULL)
//! - `starts`, `ends` (case-insensitive prefix/suffix)
//! - `contains` (substring)
//! - `in`, `notin` (list membership)

use std::str::FromStr;

use serde_json::{Map, Value as JsonValue};

use crate::error::FilterError;
use crate::orm::{CompareOp, ModelDef, Predicate, SelectQuery, SqlValue};

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Le,
    Ge,
    Gt,
    Lt,
    Starts,
    Ends,
    Contains,
    In,
    NotIn,
}

impl FromStr for FilterOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FilterOp::Eq,
            "!=" => FilterOp::Ne,
            "<=" => FilterOp::Le,
            ">=" => FilterOp::Ge,
            ">" => FilterOp::Gt,
            "<" => FilterOp::Lt,
            "starts" => FilterOp::Starts,
            "ends" => FilterOp::Ends,
            "contains" => FilterOp::Contains,
            "in" => FilterOp::In,
            "notin" => FilterOp::NotIn,
            other => return Err(FilterError::UnknownOperator(other.to_string())),
        })
    }
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
            FilterOp::Le => "<=",
            FilterOp::Ge => ">=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Starts => "starts",
            FilterOp::Ends => "ends",
            FilterOp::Contains => "contains",
            FilterOp::In => "in",
            FilterOp::NotIn => "notin",
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self {
            FilterOp::Eq => Some(CompareOp::Eq),
            FilterOp::Ne => Some(CompareOp::Ne),
            FilterOp::Le => Some(CompareOp::Le),
            FilterOp::Ge => Some(CompareOp::Ge),
            FilterOp::Gt => Some(CompareOp::Gt),
            FilterOp::Lt => Some(CompareOp::Lt),
            _ => None,
        }
    }
}

/// One `{key, op, val}` condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub key: String,
    pub op: FilterOp,
    pub val: JsonValue,
}

impl FilterDescriptor {
    pub fn new(key: impl Into<String>, op: FilterOp, val: JsonValue) -> Self {
        Self {
            key: key.into(),
            op,
            val,
        }
    }

    fn parse(map: &Map<String, JsonValue>) -> Result<Self, FilterError> {
        let key = map
            .get("key")
            .and_then(JsonValue::as_str)
            .ok_or(FilterError::MissingField("key"))?;
        let op = map
            .get("op")
            .and_then(JsonValue::as_str)
            .ok_or(FilterError::MissingField("op"))?
            .parse()?;
        let val = map.get("val").ok_or(FilterError::MissingField("val"))?;
        Ok(Self::new(key, op, val.clone()))
    }
}

/// A top-level filter item
#[derive(Debug, Clone, PartialEq)]
pub enum FilterItem {
    /// ANDed onto the query
    All(FilterDescriptor),
    /// OR-group, ANDed onto the query as a whole
    Any(Vec<FilterDescriptor>),
}

/// Parse the `filters` argument. `null` means no filters.
pub fn parse_filters(value: &JsonValue) -> Result<Vec<FilterItem>, FilterError> {
    let items = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Array(items) => items,
        _ => return Err(FilterError::NotAList),
    };

    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(map) => FilterDescriptor::parse(map).map(FilterItem::All),
            JsonValue::Array(group) => group
                .iter()
                .map(|inner| match inner {
                    JsonValue::Object(map) => FilterDescriptor::parse(map),
                    _ => Err(FilterError::InvalidItem),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterItem::Any),
            _ => Err(FilterError::InvalidItem),
        })
        .collect()
}

/// Narrow `query` with `filters`, in order.
///
/// The input query is consumed and a new one returned; descriptors are only
/// read.
pub fn compile(
    query: SelectQuery,
    model: &ModelDef,
    filters: &[FilterItem],
) -> Result<SelectQuery, FilterError> {
    filters.iter().try_fold(query, |query, item| match item {
        FilterItem::All(descriptor) => Ok(query.filter(build_predicate(model, descriptor)?)),
        FilterItem::Any(group) => {
            let predicates = group
                .iter()
                .map(|d| build_predicate(model, d))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match predicates.len() {
                0 => query,
                _ => query.filter(Predicate::Or(predicates)),
            })
        }
    })
}

/// Build the predicate for one descriptor
pub fn build_predicate(
    model: &ModelDef,
    descriptor: &FilterDescriptor,
) -> Result<Predicate, FilterError> {
    let FilterDescriptor { key, op, val } = descriptor;
    if model.column_named(key).is_none() {
        return Err(FilterError::UnknownColumn {
            model: model.name.clone(),
            column: key.clone(),
        });
    }
    let invalid = |reason: &str| FilterError::InvalidOperand {
        op: op.as_str().to_string(),
        reason: reason.to_string(),
    };

    match op {
        FilterOp::Eq | FilterOp::Ne | FilterOp::Le | FilterOp::Ge | FilterOp::Gt | FilterOp::Lt => {
            match (op.compare_op(), val) {
                (Some(CompareOp::Eq), JsonValue::Null) => Ok(Predicate::IsNull {
                    column: key.clone(),
                    negated: false,
                }),
                (Some(CompareOp::Ne), JsonValue::Null) => Ok(Predicate::IsNull {
                    column: key.clone(),
                    negated: true,
                }),
                (_, JsonValue::Null) => Err(invalid("null can only be compared with == or !=")),
                (_, JsonValue::Array(_) | JsonValue::Object(_)) => {
                    Err(invalid("expected a scalar"))
                }
                (Some(compare), scalar) => Ok(Predicate::compare(
                    key.clone(),
                    compare,
                    SqlValue::from_json(scalar),
                )),
                (None, _) => Err(invalid("not a comparison operator")),
            }
        }
        FilterOp::Starts | FilterOp::Ends | FilterOp::Contains => {
            let text = val.as_str().ok_or_else(|| invalid("expected a string"))?;
            Ok(match op {
                FilterOp::Starts => Predicate::starts_with(key.clone(), text),
                FilterOp::Ends => Predicate::ends_with(key.clone(), text),
                _ => Predicate::Contains {
                    column: key.clone(),
                    needle: text.to_string(),
                },
            })
        }
        FilterOp::In | FilterOp::NotIn => {
            let items = val.as_array().ok_or_else(|| invalid("expected a list"))?;
            if items.iter().any(|v| v.is_array() || v.is_object()) {
                return Err(invalid("expected a list of scalars"));
            }
            Ok(Predicate::In {
                column: key.clone(),
                values: items.iter().map(SqlValue::from_json).collect(),
                negated: *op == FilterOp::NotIn,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::orm::{ColumnDef, ColumnType};

    fn model() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::new("User")
                .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                .column(ColumnDef::new("name", ColumnType::String).nullable()),
        )
    }

    fn compile_json(filters: JsonValue) -> Result<SelectQuery, FilterError> {
        let model = model();
        let items = parse_filters(&filters)?;
        compile(SelectQuery::new(Arc::clone(&model)), &model, &items)
    }

    #[test]
    fn test_parse_shapes() {
        let items = parse_filters(&json!([
            {"key": "name", "op": "==", "val": "a"},
            [{"key": "id", "op": ">", "val": 1}, {"key": "id", "op": "<", "val": 0}]
        ]))
        .unwrap();
        assert_eq!(
            items,
            vec![
                FilterItem::All(FilterDescriptor::new("name", FilterOp::Eq, json!("a"))),
                FilterItem::Any(vec![
                    FilterDescriptor::new("id", FilterOp::Gt, json!(1)),
                    FilterDescriptor::new("id", FilterOp::Lt, json!(0)),
                ]),
            ]
        );
        assert_eq!(parse_filters(&JsonValue::Null).unwrap(), vec![]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_filters(&json!({"key": "id"})), Err(FilterError::NotAList));
        assert_eq!(parse_filters(&json!([1])), Err(FilterError::InvalidItem));
        assert_eq!(parse_filters(&json!([[[]]])), Err(FilterError::InvalidItem));
        assert_eq!(
            parse_filters(&json!([{"key": "id", "op": "=="}])),
            Err(FilterError::MissingField("val"))
        );
        assert_eq!(
            parse_filters(&json!([{"key": "id", "op": "~=", "val": 1}])),
            Err(FilterError::UnknownOperator("~=".into()))
        );
    }

    #[test]
    fn test_operator_names_are_case_sensitive() {
        assert!("IN".parse::<FilterOp>().is_err());
        assert_eq!("notin".parse::<FilterOp>(), Ok(FilterOp::NotIn));
    }

    #[test]
    fn test_falsy_operands_are_compiled() {
        let query = compile_json(json!([
            {"key": "id", "op": "==", "val": 0},
            {"key": "name", "op": "==", "val": ""}
        ]))
        .unwrap();
        let (sql, binds) = query.build_sql();
        assert!(sql.ends_with("WHERE \"id\" = ? AND \"name\" = ?"), "{sql}");
        assert_eq!(binds, vec![SqlValue::Int(0), SqlValue::String(String::new())]);
    }

    #[test]
    fn test_null_comparison() {
        let (sql, binds) = compile_json(json!([{"key": "name", "op": "!=", "val": null}]))
            .unwrap()
            .build_sql();
        assert!(sql.ends_with("WHERE \"name\" IS NOT NULL"), "{sql}");
        assert!(binds.is_empty());

        assert_matches!(
            compile_json(json!([{"key": "name", "op": ">", "val": null}])),
            Err(FilterError::InvalidOperand { .. })
        );
    }

    #[test]
    fn test_or_group() {
        let (sql, _) = compile_json(json!([
            {"key": "id", "op": ">", "val": 0},
            [{"key": "name", "op": "starts", "val": "a"}, {"key": "name", "op": "ends", "val": "z"}]
        ]))
        .unwrap()
        .build_sql();
        assert!(
            sql.ends_with(
                "WHERE \"id\" > ? AND (LOWER(\"name\") LIKE LOWER(?) ESCAPE '\\' OR LOWER(\"name\") LIKE LOWER(?) ESCAPE '\\')"
            ),
            "{sql}"
        );
    }

    #[test]
    fn test_empty_group_adds_nothing() {
        let query = compile_json(json!([[]])).unwrap();
        assert!(query.predicates().is_empty());
    }

    #[test]
    fn test_unknown_column() {
        assert_matches!(
            compile_json(json!([{"key": "password", "op": "==", "val": "x"}])),
            Err(FilterError::UnknownColumn { column, .. }) if column == "password"
        );
    }

    #[test]
    fn test_operand_shapes() {
        assert_matches!(
            compile_json(json!([{"key": "id", "op": "in", "val": 1}])),
            Err(FilterError::InvalidOperand { .. })
        );
        assert_matches!(
            compile_json(json!([{"key": "name", "op": "contains", "val": 1}])),
            Err(FilterError::InvalidOperand { .. })
        );
        assert_matches!(
            compile_json(json!([{"key": "id", "op": "==", "val": [1]}])),
            Err(FilterError::InvalidOperand { .. })
        );
    }

    #[test]
    fn test_descriptors_are_not_mutated() {
        let model = model();
        let items = parse_filters(&json!([{"key": "id", "op": "in", "val": [1, 2]}])).unwrap();
        let before = items.clone();
        let first = compile(SelectQuery::new(Arc::clone(&model)), &model, &items).unwrap();
        let second = compile(SelectQuery::new(Arc::clone(&model)), &model, &items).unwrap();
        assert_eq!(items, before);
        assert_eq!(first.build_sql(), second.build_sql());
    }
}
