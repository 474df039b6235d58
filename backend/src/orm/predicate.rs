//! WHERE-clause predicate trees.

use super::value::SqlValue;

/// Direct comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A boolean condition over one model's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    /// Case-insensitive LIKE with `\` as escape character
    Like {
        column: String,
        pattern: String,
    },
    /// Case-sensitive substring match
    Contains {
        column: String,
        needle: String,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: SqlValue) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn starts_with(column: impl Into<String>, prefix: &str) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: format!("{}%", escape_like(prefix)),
        }
    }

    pub fn ends_with(column: impl Into<String>, suffix: &str) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: format!("%{}", escape_like(suffix)),
        }
    }

    /// Render as SQL, appending bind values in placeholder order.
    pub fn to_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Compare { column, op, value } => {
                binds.push(value.clone());
                format!("{} {} ?", quote_ident(column), op.as_sql())
            }
            Predicate::IsNull { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                format!("{} IS{} NULL", quote_ident(column), not)
            }
            Predicate::Like { column, pattern } => {
                binds.push(SqlValue::String(pattern.clone()));
                format!("LOWER({}) LIKE LOWER(?) ESCAPE '\\'", quote_ident(column))
            }
            Predicate::Contains { column, needle } => {
                binds.push(SqlValue::String(needle.clone()));
                format!("INSTR({}, ?) > 0", quote_ident(column))
            }
            Predicate::In {
                values, negated, ..
            } if values.is_empty() => {
                // IN () is not valid SQLite
                let sql = if *negated { "1 = 1" } else { "0 = 1" };
                sql.to_string()
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                binds.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                let not = if *negated { " NOT" } else { "" };
                format!("{}{} IN ({})", quote_ident(column), not, placeholders)
            }
            Predicate::And(parts) => join(parts, " AND ", "1 = 1", binds),
            Predicate::Or(parts) => join(parts, " OR ", "0 = 1", binds),
        }
    }
}

fn join(parts: &[Predicate], sep: &str, empty: &str, binds: &mut Vec<SqlValue>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts.iter().map(|p| p.to_sql(binds)).collect();
    format!("({})", rendered.join(sep))
}

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_compare_sql() {
        let mut binds = Vec::new();
        let sql = Predicate::compare("name", CompareOp::Ne, SqlValue::String("a".into()))
            .to_sql(&mut binds);
        assert_eq!(sql, "\"name\" != ?");
        assert_eq!(binds, vec![SqlValue::String("a".into())]);
    }

    #[test]
    fn test_like_escapes_wildcards() {
        let mut binds = Vec::new();
        Predicate::starts_with("name", "50%_off").to_sql(&mut binds);
        assert_eq!(binds, vec![SqlValue::String("50\\%\\_off%".into())]);
    }

    #[test]
    fn test_empty_in() {
        let mut binds = Vec::new();
        let empty_in = Predicate::In {
            column: "id".into(),
            values: vec![],
            negated: false,
        };
        let empty_not_in = Predicate::In {
            column: "id".into(),
            values: vec![],
            negated: true,
        };
        assert_eq!(empty_in.to_sql(&mut binds), "0 = 1");
        assert_eq!(empty_not_in.to_sql(&mut binds), "1 = 1");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_nested_groups() {
        let mut binds = Vec::new();
        let p = Predicate::And(vec![
            Predicate::IsNull {
                column: "deleted".into(),
                negated: false,
            },
            Predicate::Or(vec![
                Predicate::compare("id", CompareOp::Eq, SqlValue::Int(1)),
                Predicate::In {
                    column: "id".into(),
                    values: vec![SqlValue::Int(2), SqlValue::Int(3)],
                    negated: true,
                },
            ]),
        ]);
        assert_eq!(
            p.to_sql(&mut binds),
            "(\"deleted\" IS NULL AND (\"id\" = ? OR \"id\" NOT IN (?, ?)))"
        );
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
