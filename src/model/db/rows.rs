//! Read-only projections joining evaluation requests with questions, users and branches.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::GroupCode, mongodb::Id};

/// A request of a single question, with the elector's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvaluationRow {
    #[serde(rename = "_id")]
    pub id: Id,
    pub elector_id: Id,
    pub elector_name: String,
    pub code: GroupCode,
    pub comment: Option<String>,
    pub point: Option<u8>,
    pub is_open: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A request in the cross-question listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestListRow {
    #[serde(rename = "_id")]
    pub id: Id,
    pub question_id: Id,
    pub creator_id: Id,
    pub elector_id: Id,
    pub creator_name: String,
    pub elector_name: String,
    pub code: GroupCode,
    pub point: Option<u8>,
    pub comment: Option<String>,
    pub branch_name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Filters applied to the cross-question listing. `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestListFilter {
    pub elector_id: Option<Id>,
    pub lesson_id: Option<Id>,
}
