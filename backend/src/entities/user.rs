use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Article, Role};
use crate::graphql::{MutationAction, MutationArgs, MutationHooks};
use crate::orm::{Instance, Model, Session, SqlValue};

/// A registered user
#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
pub struct User {
    #[column(primary_key)]
    pub id: i64,

    /// Display name
    #[column(length = 20)]
    pub name: Option<String>,

    #[column(length = 100)]
    pub password: String,

    /// Roles granted to the user
    #[serde(skip)]
    #[relationship(many_to_many, secondary = "user_role", local = "user_id", remote = "role_id")]
    pub roles: Vec<Role>,

    /// Articles written by the user
    #[serde(skip)]
    #[relationship(one_to_many = "author_id")]
    pub articles: Vec<Article>,
}

pub const DEFAULT_USER_NAME: &str = "defaultname";

/// Names users created without one
pub struct DefaultUserName;

#[async_trait]
impl MutationHooks for DefaultUserName {
    async fn before_commit(
        &self,
        _session: &mut Session,
        instance: &mut Instance,
        args: &MutationArgs,
    ) {
        let unnamed = instance.get("name").is_none_or(SqlValue::is_null);
        if args.action == MutationAction::Create && unnamed {
            instance.set("name", SqlValue::String(DEFAULT_USER_NAME.to_string()));
        }
    }
}
