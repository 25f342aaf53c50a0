use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::GroupCode, mongodb::Id};

/// One elector's assignment to evaluate one question, and their response once given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(rename = "_id")]
    pub id: Id,
    pub question_id: Id,
    pub elector_id: Id,
    pub creator_id: Id,
    pub code: GroupCode,
    pub point: Option<u8>,
    pub comment: Option<String>,
    pub is_open: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRequest {
    /// A fresh, open request.
    pub fn open(question_id: Id, elector_id: Id, creator_id: Id, code: GroupCode) -> Self {
        let now = Utc::now();
        Self {
            id: Id::new(),
            question_id,
            elector_id,
            creator_id,
            code,
            point: None,
            comment: None,
            is_open: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The score, if the elector has responded.
    pub fn scored_point(&self) -> Option<u8> {
        if self.is_open {
            None
        } else {
            self.point
        }
    }
}

/// An elector's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResponse {
    pub point: u8,
    pub comment: String,
}
