use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A user, as far as evaluation listings need to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub full_name: String,
    #[serde(default)]
    pub branch_id: Option<Id>,
}

/// A teaching branch (also used as the lesson of a question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "_id")]
    pub id: Id,
    pub code: String,
    pub name: String,
}
