//! Model ORM layer
//!
//! Static model metadata plus a small runtime over SQLite:
//! - [`ModelDef`] / [`Model`]: table, column and relationship metadata,
//!   usually produced by `#[derive(Model)]`
//! - [`ModelCatalog`]: the validated set of models served by the API
//! - [`SelectQuery`]: parameterized SELECT/COUNT building
//! - [`Session`]: unit-of-work writes committed in one transaction
//!
//! ```rust,ignore
//! let catalog = ModelCatalog::builder().model::<User>().model::<Role>().build()?;
//! let user = catalog.get("User").unwrap();
//! let rows = session.query(user).limit(10).fetch_all(session.pool()).await?;
//! ```

mod builder;
mod catalog;
mod model;
mod predicate;
mod session;
mod value;

pub use builder::{SelectQuery, SortDirection};
pub use catalog::{ModelCatalog, ModelCatalogBuilder};
pub use model::{
    ColumnDef, ColumnType, ForeignKey, Model, ModelDef, RelationKind, RelationshipDef,
};
pub use predicate::{CompareOp, Predicate, quote_ident};
pub use session::{CommitReceipt, Instance, Related, Session, Staged, load_related};
pub use value::{BindParam, Record, SqlValue};

// Derive macro shares the trait's name, like serde's Serialize
pub use modelgraph_macros::Model;
