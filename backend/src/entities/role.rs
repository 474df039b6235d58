use serde::{Deserialize, Serialize};

use super::User;
use crate::orm::Model;

/// A named permission group
#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
pub struct Role {
    #[column(primary_key)]
    pub id: i64,

    #[column(length = 255, unique)]
    pub name: Option<String>,

    #[serde(skip)]
    #[relationship(many_to_many, secondary = "user_role", local = "role_id", remote = "user_id")]
    pub users: Vec<User>,
}
