//! Error types

/// Result type alias for library operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level library error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    GlobalId(#[from] GlobalIdError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// The dynamic schema failed to build
    #[error("schema error: {0}")]
    Schema(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("mutation {0} is overridden twice")]
    DuplicateOverride(String),
}

/// Invalid model metadata, detected when the catalog is built
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model {0} is registered twice")]
    DuplicateModel(String),

    #[error("model {0} has no primary key")]
    MissingPrimaryKey(String),

    #[error("model {0} must have an integer primary key")]
    NonIntegerPrimaryKey(String),

    #[error("model {model} references unknown model {target}")]
    UnknownModel { model: String, target: String },

    #[error("model {model} has no column {column}")]
    UnknownColumn { model: String, column: String },
}

/// Malformed filter descriptor
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FilterError {
    #[error("filters must be a list")]
    NotAList,

    #[error("filter item must be an object or a list of objects")]
    InvalidItem,

    #[error("filter is missing `{0}`")]
    MissingField(&'static str),

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("{model} has no column {column}")]
    UnknownColumn { model: String, column: String },

    #[error("invalid operand for `{op}`: {reason}")]
    InvalidOperand { op: String, reason: String },
}

/// Malformed relay global id
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GlobalIdError {
    #[error("malformed global id: {0}")]
    Malformed(String),

    #[error("global id refers to {found}, expected {expected}")]
    TypeMismatch { expected: String, found: String },
}

/// Mutation input that cannot be applied to a model
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AssignError {
    #[error("{model} has no field {field}")]
    UnknownField { model: String, field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("input nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("{field}: {source}")]
    GlobalId {
        field: String,
        #[source]
        source: GlobalIdError,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PaginationError {
    #[error("{name} must not be negative (got {value})")]
    Negative { name: &'static str, value: i64 },

    #[error("invalid cursor: {0}")]
    InvalidCursor(&'static str),
}
