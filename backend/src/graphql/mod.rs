//! GraphQL API synthesized from the model catalog
//!
//! Nothing here is written per model: [`SchemaSynthesizer`] reads the
//! catalog, the [`TypeRegistry`] holds one output/input descriptor per model,
//! list queries go through the filter compiler and offset pagination, and
//! mutations through the generic [`MutationExecutor`].

pub mod assign;
pub mod filters;
pub mod global_id;
pub mod mutation;
pub mod pagination;
pub mod registry;
pub mod schema;
pub mod types;

pub use filters::{FilterDescriptor, FilterItem, FilterOp, compile, parse_filters};
pub use global_id::{from_global_id, to_global_id};
pub use mutation::{MutationAction, MutationArgs, MutationExecutor, MutationHooks, MutationResult};
pub use pagination::{ListPage, PageInfo};
pub use registry::TypeRegistry;
pub use schema::SchemaSynthesizer;
pub use types::{InputShape, InputType, OutputType, TypeNames};
