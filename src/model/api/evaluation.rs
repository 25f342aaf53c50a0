use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluation::{CalculationOutcome, Group, GroupRef};
use crate::model::{
    api::id::ApiId,
    common::{GroupCode, QuestionStatus},
    db::{EvaluationRequest, QuestionEvaluationRow, RequestListRow},
};

/// A reference to a prospective elector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectorRef {
    pub id: ApiId,
}

/// Body of a group creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub electors: Vec<ElectorRef>,
}

/// Which group an operation targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiGroupRef {
    /// Any existing member of the group.
    Member(ApiId),
    Code(GroupCode),
}

impl From<ApiGroupRef> for GroupRef {
    fn from(group: ApiGroupRef) -> Self {
        match group {
            ApiGroupRef::Member(id) => GroupRef::Member(id.into()),
            ApiGroupRef::Code(code) => GroupRef::Code(code),
        }
    }
}

/// Body of a request adding an elector to an existing group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddElectorRequest {
    pub group: ApiGroupRef,
    pub question_id: ApiId,
    pub elector_id: ApiId,
}

/// Body of an elector's response. Ranges are checked by the lifecycle manager
/// so that out-of-range values are reported as validation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponseRequest {
    pub point: i64,
    pub comment: String,
}

/// Body of a manual calculation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub question_id: ApiId,
    pub code: GroupCode,
}

/// A newly created group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDescription {
    pub code: GroupCode,
    pub question_id: ApiId,
    pub members: Vec<ApiId>,
}

impl From<Group> for GroupDescription {
    fn from(group: Group) -> Self {
        Self {
            code: group.code,
            question_id: group.question_id.into(),
            members: group.members.into_iter().map(|r| r.id.into()).collect(),
        }
    }
}

/// An evaluation request as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequestDescription {
    pub id: ApiId,
    pub question_id: ApiId,
    pub elector_id: ApiId,
    pub creator_id: ApiId,
    pub code: GroupCode,
    pub point: Option<u8>,
    pub comment: Option<String>,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EvaluationRequest> for EvaluationRequestDescription {
    fn from(request: EvaluationRequest) -> Self {
        Self {
            id: request.id.into(),
            question_id: request.question_id.into(),
            elector_id: request.elector_id.into(),
            creator_id: request.creator_id.into(),
            code: request.code,
            point: request.point,
            comment: request.comment,
            is_open: request.is_open,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Result of a deletion by group code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDeleted {
    pub deleted: u64,
}

/// Result of a manual calculation. Not having enough responses is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CalculationReport {
    Computed {
        status: QuestionStatus,
        score: f64,
        responses: usize,
    },
    Insufficient {
        responses: usize,
        required: u32,
    },
}

impl From<CalculationOutcome> for CalculationReport {
    fn from(outcome: CalculationOutcome) -> Self {
        match outcome {
            CalculationOutcome::Computed {
                status,
                score,
                responses,
            } => Self::Computed {
                status,
                score,
                responses,
            },
            CalculationOutcome::Insufficient {
                responses,
                required,
            } => Self::Insufficient {
                responses,
                required,
            },
        }
    }
}

/// A row of the per-question listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEvaluationEntry {
    pub id: ApiId,
    pub elector_id: ApiId,
    pub full_name: String,
    pub code: GroupCode,
    pub comment: Option<String>,
    pub point: Option<u8>,
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionEvaluationRow> for QuestionEvaluationEntry {
    fn from(row: QuestionEvaluationRow) -> Self {
        Self {
            id: row.id.into(),
            elector_id: row.elector_id.into(),
            full_name: row.elector_name,
            code: row.code,
            comment: row.comment,
            point: row.point,
            is_open: row.is_open,
            updated_at: row.updated_at,
        }
    }
}

/// A row of the cross-question listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestListEntry {
    pub id: ApiId,
    pub question_id: ApiId,
    pub creator_id: ApiId,
    pub elector_id: ApiId,
    pub creator_name: String,
    pub elector_name: String,
    pub code: GroupCode,
    pub point: Option<u8>,
    pub comment: Option<String>,
    pub branch_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<RequestListRow> for RequestListEntry {
    fn from(row: RequestListRow) -> Self {
        Self {
            id: row.id.into(),
            question_id: row.question_id.into(),
            creator_id: row.creator_id.into(),
            elector_id: row.elector_id.into(),
            creator_name: row.creator_name,
            elector_name: row.elector_name,
            code: row.code,
            point: row.point,
            comment: row.comment,
            branch_name: row.branch_name,
            created_at: row.created_at,
        }
    }
}
