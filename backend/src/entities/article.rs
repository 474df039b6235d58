use serde::{Deserialize, Serialize};

use super::User;
use crate::orm::Model;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
pub struct Article {
    #[column(primary_key)]
    pub id: i64,

    #[column(length = 255)]
    pub title: String,

    #[column(length = 255)]
    pub description: Option<String>,

    #[column(foreign_key = "User.id")]
    pub author_id: i64,

    /// Comma separated tags
    #[column(length = 255)]
    pub tags: Option<String>,

    #[column(sql_type = "text")]
    pub text: String,

    #[column(sql_type = "datetime", server_default = "CURRENT_TIMESTAMP")]
    pub create_time: Option<String>,

    #[column(sql_type = "datetime", server_default = "CURRENT_TIMESTAMP")]
    pub update_time: Option<String>,

    #[serde(skip)]
    #[relationship(many_to_one = "author_id")]
    pub author: Option<Box<User>>,
}
