//! Model metadata
//!
//! A [`ModelDef`] describes one table: its typed columns and the named
//! relationships to other models. Definitions are produced by
//! `#[derive(Model)]` (see `modelgraph-macros`) or assembled by hand with the
//! builder methods below, and are immutable once registered in a
//! [`ModelCatalog`](super::ModelCatalog).

use convert_case::{Case, Casing};

/// Database type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Text,
    Boolean,
    DateTime,
    /// JSON document stored as text
    Json,
    /// List of strings stored as a JSON array
    StringArray,
}

impl ColumnType {
    /// SQLite column type used when creating tables.
    ///
    /// Everything that is not a number or a boolean is stored as TEXT so rows
    /// decode through a single string path.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::String
            | ColumnType::Text
            | ColumnType::DateTime
            | ColumnType::Json
            | ColumnType::StringArray => "TEXT",
        }
    }
}

/// Reference from a column to another model's column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Target model name (e.g. "User")
    pub model: String,
    /// Target column name (e.g. "id")
    pub column: String,
}

/// Column definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: String,
    pub column_type: ColumnType,
    /// Declared maximum length (informational, SQLite does not enforce it)
    pub length: Option<u32>,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether the database assigns the value on insert
    pub autoincrement: bool,
    pub unique: bool,
    /// Default value expression (e.g. "CURRENT_TIMESTAMP")
    pub server_default: Option<String>,
    pub foreign_key: Option<ForeignKey>,
    /// Whether API input for this column arrives as an opaque global id
    pub global_id: bool,
    pub description: Option<String>,
}

impl ColumnDef {
    /// A NOT NULL column with no other constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            nullable: false,
            primary_key: false,
            autoincrement: false,
            unique: false,
            server_default: None,
            foreign_key: None,
            global_id: false,
            description: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as primary key. Integer keys are database-assigned.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.autoincrement = self.column_type == ColumnType::Integer;
        self
    }

    pub fn autoincrement(mut self, autoincrement: bool) -> Self {
        self.autoincrement = autoincrement;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn server_default(mut self, expr: impl Into<String>) -> Self {
        self.server_default = Some(expr.into());
        self
    }

    /// Reference `model.column`. Foreign keys are always global-id fields.
    pub fn foreign_key(mut self, model: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            model: model.into(),
            column: column.into(),
        });
        self.global_id = true;
        self
    }

    /// Mark as a global-id field without a foreign key.
    pub fn global_id(mut self) -> Self {
        self.global_id = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the database fills this column in when it is omitted.
    pub fn is_server_generated(&self) -> bool {
        (self.primary_key && self.autoincrement)
            || (self.column_type == ColumnType::DateTime && self.server_default.is_some())
    }
}

/// How a relationship is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// This model holds the foreign key in `column`.
    ManyToOne { column: String },
    /// The target holds a foreign key to this model in `remote_column`.
    OneToMany { remote_column: String },
    /// Rows are linked through the `secondary` association table.
    ManyToMany {
        secondary: String,
        /// Column of `secondary` referencing this model
        local_column: String,
        /// Column of `secondary` referencing the target
        remote_column: String,
    },
}

/// Named relationship to another model.
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub name: String,
    /// Target model name
    pub target: String,
    pub kind: RelationKind,
    pub description: Option<String>,
}

impl RelationshipDef {
    pub fn many_to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ManyToOne {
                column: column.into(),
            },
            description: None,
        }
    }

    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::OneToMany {
                remote_column: remote_column.into(),
            },
            description: None,
        }
    }

    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        secondary: impl Into<String>,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ManyToMany {
                secondary: secondary.into(),
                local_column: local_column.into(),
                remote_column: remote_column.into(),
            },
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the relationship resolves to a list of rows.
    pub fn is_multiple(&self) -> bool {
        !matches!(self.kind, RelationKind::ManyToOne { .. })
    }
}

/// Metadata about a model (table).
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// Model name (e.g. "User"), used to derive API type names
    pub name: String,
    /// The SQL table name (e.g. "user")
    pub table: String,
    pub description: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub relationships: Vec<RelationshipDef>,
}

impl ModelDef {
    /// A model whose table name is the snake_case form of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = name.to_case(Case::Snake);
        Self {
            name,
            table,
            description: None,
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relationship_named(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Primary key column name, `"id"` when the model declares none.
    pub fn primary_key_name(&self) -> &str {
        self.primary_key().map(|c| c.name.as_str()).unwrap_or("id")
    }

    /// List of all column names in the table
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Types that carry static model metadata.
///
/// Implemented by `#[derive(Model)]`.
pub trait Model {
    fn model_def() -> ModelDef;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_name() {
        assert_eq!(ModelDef::new("User").table, "user");
        assert_eq!(ModelDef::new("BlogPost").table, "blog_post");
        assert_eq!(ModelDef::new("HTTPLog").table, "http_log");
    }

    #[test]
    fn test_integer_primary_key_is_server_generated() {
        let id = ColumnDef::new("id", ColumnType::Integer).primary_key();
        assert!(id.autoincrement);
        assert!(id.is_server_generated());

        let code = ColumnDef::new("code", ColumnType::String).primary_key();
        assert!(!code.autoincrement);
        assert!(!code.is_server_generated());
    }

    #[test]
    fn test_timestamp_with_default_is_server_generated() {
        let created = ColumnDef::new("created_at", ColumnType::DateTime)
            .nullable()
            .server_default("CURRENT_TIMESTAMP");
        assert!(created.is_server_generated());

        let published = ColumnDef::new("published_at", ColumnType::DateTime).nullable();
        assert!(!published.is_server_generated());
    }

    #[test]
    fn test_foreign_key_implies_global_id() {
        let author = ColumnDef::new("author_id", ColumnType::Integer).foreign_key("User", "id");
        assert!(author.global_id);
        assert_eq!(author.foreign_key.unwrap().model, "User");
    }
}
