//! Persistence abstraction for evaluation requests.
//!
//! Each method is one unit of work: implementations make every multi-row
//! mutation all-or-nothing.

#[cfg(test)]
mod memory;
mod mongo;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::error::Result;
use crate::model::{
    api::pagination::Pagination,
    common::{GroupCode, QuestionStatus},
    db::{
        EvaluationRequest, EvaluationResponse, Question, QuestionEvaluationRow,
        RequestListFilter, RequestListRow, Settings,
    },
    mongodb::Id,
};

/// Result of trying to close a request with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseResult {
    /// The request was open and is now closed.
    Closed(EvaluationRequest),
    /// The request exists but was already closed; nothing was written.
    AlreadyClosed(EvaluationRequest),
    Missing,
}

#[rocket::async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Get a question by ID.
    async fn question(&self, id: Id) -> Result<Option<Question>>;

    /// Insert all requests of a new group and move the question into election
    /// if its status allows it.
    async fn insert_group(&self, question_id: Id, requests: &[EvaluationRequest]) -> Result<()>;

    /// Insert a single request. Fails with `Conflict` if the elector is already in the group.
    async fn insert_request(&self, request: &EvaluationRequest) -> Result<()>;

    /// Get a request by ID.
    async fn request(&self, id: Id) -> Result<Option<EvaluationRequest>>;

    /// All requests of a group.
    async fn group_members(&self, question_id: Id, code: &GroupCode)
        -> Result<Vec<EvaluationRequest>>;

    /// Delete a single request, returning it if it existed.
    async fn delete_request(&self, id: Id) -> Result<Option<EvaluationRequest>>;

    /// Delete every request of a group and move the question out of election.
    /// Returns the number of requests deleted.
    async fn delete_group(&self, question_id: Id, code: &GroupCode) -> Result<u64>;

    /// Record a response on a request, only if it is still open.
    async fn close_request(&self, id: Id, response: &EvaluationResponse) -> Result<CloseResult>;

    /// Write an evaluation outcome onto a question.
    async fn apply_outcome(&self, question_id: Id, status: QuestionStatus, score: f64)
        -> Result<()>;

    /// IDs of the branches with any of the given codes.
    async fn branch_ids_with_codes(&self, codes: &[&str]) -> Result<Vec<Id>>;

    /// Requests of one question, joined with elector names.
    async fn question_rows(&self, question_id: Id) -> Result<Vec<QuestionEvaluationRow>>;

    /// One page of the cross-question listing, newest first, and the total matching count.
    async fn request_rows(
        &self,
        filter: &RequestListFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<RequestListRow>, usize)>;

    /// The settings record.
    async fn settings(&self) -> Result<Settings>;

    /// Replace the settings record.
    async fn save_settings(&self, settings: &Settings) -> Result<()>;
}
