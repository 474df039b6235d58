//! modelgraph - a GraphQL API synthesized from relational model metadata
//!
//! Models are plain structs with `#[derive(Model)]`; a [`orm::ModelCatalog`]
//! collects them and [`graphql::SchemaSynthesizer`] turns the catalog into an
//! executable schema with filtered, paginated list queries and generic
//! create/update/delete mutations over SQLite.

// Lets `#[derive(Model)]` expansions name `::modelgraph` inside this crate
extern crate self as modelgraph;

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod graphql;
pub mod orm;

pub use error::{Error, Result};
