//! Example model set: users with roles, and the articles they write

mod article;
mod role;
mod user;

pub use article::Article;
pub use role::Role;
pub use user::{DefaultUserName, User};

use crate::error::ModelError;
use crate::orm::ModelCatalog;

/// Catalog of every example model
pub fn catalog() -> Result<ModelCatalog, ModelError> {
    ModelCatalog::builder()
        .model::<User>()
        .model::<Role>()
        .model::<Article>()
        .build()
}
