use serde::{Deserialize, Serialize};

use crate::model::{common::QuestionStatus, mongodb::Id};

/// The parts of a question that evaluation reads and writes.
/// Questions themselves are owned by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    /// The branch (lesson) the question belongs to.
    pub lesson_id: Id,
    pub status: QuestionStatus,
    /// Mean evaluation score, written when an outcome is computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_point: Option<f64>,
}
