//! The evaluation request lifecycle: forming groups of electors for a
//! question, collecting their responses, and turning those responses into an
//! outcome for the question.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info};

pub mod aggregation;
pub mod events;
pub mod scope;
pub mod store;

use aggregation::Aggregator;
use events::{AggregationEvent, EventCause, EventPublisher};
use store::{CloseResult, EvaluationStore};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Caller, Role},
        pagination::{Paginated, Pagination},
    },
    common::{GroupCode, QuestionStatus},
    db::{
        settings::{MAX_GROUP_SIZE, MIN_GROUP_SIZE},
        EvaluationRequest, EvaluationResponse, QuestionEvaluationRow, RequestListRow, Settings,
    },
    mongodb::Id,
};

/// Valid scores, inclusive.
pub const MIN_POINT: i64 = 1;
pub const MAX_POINT: i64 = 5;

/// Maximum length of a response comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 1000;

/// Requests created together for one question, sharing a code.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub code: GroupCode,
    pub question_id: Id,
    pub members: Vec<EvaluationRequest>,
}

/// How an operation identifies an existing group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// Any current member of the group.
    Member(Id),
    Code(GroupCode),
}

/// Result of evaluating a group's responses.
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationOutcome {
    /// Enough responses were closed; the question now carries this status and score.
    Computed {
        status: QuestionStatus,
        score: f64,
        responses: usize,
    },
    /// Too few closed responses. Nothing was written.
    Insufficient { responses: usize, required: u32 },
}

/// The lifecycle manager. Every operation takes the caller's identity explicitly.
pub struct Evaluations {
    store: Arc<dyn EvaluationStore>,
    events: Arc<dyn EventPublisher>,
    aggregator: Aggregator,
}

impl Evaluations {
    pub fn new(store: Arc<dyn EvaluationStore>, events: Arc<dyn EventPublisher>) -> Self {
        let aggregator = Aggregator::new(store.clone());
        Self {
            store,
            events,
            aggregator,
        }
    }

    /// Assign a fresh group of electors to a question.
    ///
    /// Inserts one open request per elector and moves the question into
    /// election if its status allows, all or nothing.
    pub async fn create_group(
        &self,
        caller: &Caller,
        question_id: Id,
        electors: &[Id],
    ) -> Result<Group> {
        caller.require(Role::Admin)?;

        let max_size = self.max_group_size().await?;
        if !(MIN_GROUP_SIZE..=max_size).contains(&electors.len()) {
            return Err(Error::Validation(format!(
                "a group needs {MIN_GROUP_SIZE} to {max_size} electors, got {}",
                electors.len()
            )));
        }
        let distinct: HashSet<_> = electors.iter().collect();
        if distinct.len() != electors.len() {
            return Err(Error::Validation(
                "an elector may only appear once in a group".to_string(),
            ));
        }
        if self.store.question(question_id).await?.is_none() {
            return Err(Error::not_found(format!("Question {question_id}")));
        }

        let code = GroupCode::random();
        let members: Vec<_> = electors
            .iter()
            .map(|&elector_id| {
                EvaluationRequest::open(question_id, elector_id, caller.id, code.clone())
            })
            .collect();
        self.store.insert_group(question_id, &members).await?;
        info!(
            "Created group {code} of {} electors for question {question_id}",
            members.len()
        );

        Ok(Group {
            code,
            question_id,
            members,
        })
    }

    /// The configured largest group, never more than `MAX_GROUP_SIZE`.
    async fn max_group_size(&self) -> Result<usize> {
        let settings = self.store.settings().await?;
        let configured = usize::try_from(settings.max_elector_count).unwrap_or(MAX_GROUP_SIZE);
        Ok(configured.clamp(MIN_GROUP_SIZE, MAX_GROUP_SIZE))
    }

    /// Add one more elector to an existing group, e.g. to replace one who was removed.
    pub async fn add_elector(
        &self,
        caller: &Caller,
        group: GroupRef,
        question_id: Id,
        elector_id: Id,
    ) -> Result<EvaluationRequest> {
        caller.require(Role::Admin)?;

        let code = match group {
            GroupRef::Member(member_id) => {
                let member = self
                    .store
                    .request(member_id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("Evaluation request {member_id}")))?;
                if member.question_id != question_id {
                    return Err(Error::Validation(format!(
                        "evaluation request {member_id} belongs to another question"
                    )));
                }
                member.code
            }
            GroupRef::Code(code) => code,
        };

        let members = self.store.group_members(question_id, &code).await?;
        if members.is_empty() {
            return Err(Error::not_found(format!("Group {code}")));
        }
        if members.iter().any(|member| member.elector_id == elector_id) {
            return Err(Error::Conflict(format!(
                "elector {elector_id} is already a member of group {code}"
            )));
        }

        let request = EvaluationRequest::open(question_id, elector_id, caller.id, code);
        self.store.insert_request(&request).await?;
        info!("Added elector {elector_id} to group {}", request.code);
        Ok(request)
    }

    /// Remove a single elector's request.
    pub async fn delete_member(&self, caller: &Caller, id: Id) -> Result<EvaluationRequest> {
        caller.require(Role::Admin)?;

        let deleted = self
            .store
            .delete_request(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Evaluation request {id}")))?;
        info!("Deleted evaluation request {id} from group {}", deleted.code);

        self.events.publish(AggregationEvent {
            question_id: deleted.question_id,
            code: deleted.code.clone(),
            cause: EventCause::MemberDeleted { request_id: id },
        });
        Ok(deleted)
    }

    /// Remove a whole group and take the question out of election.
    /// Returns the number of requests deleted.
    pub async fn delete_group(
        &self,
        caller: &Caller,
        question_id: Id,
        code: &GroupCode,
    ) -> Result<u64> {
        caller.require(Role::Admin)?;

        let deleted = self.store.delete_group(question_id, code).await?;
        info!("Deleted group {code} ({deleted} requests) of question {question_id}");

        self.events.publish(AggregationEvent {
            question_id,
            code: code.clone(),
            cause: EventCause::GroupDeleted,
        });
        Ok(deleted)
    }

    /// Record an elector's score and comment, closing their request.
    pub async fn submit_response(
        &self,
        caller: &Caller,
        id: Id,
        point: i64,
        comment: &str,
    ) -> Result<EvaluationRequest> {
        let response = validate_response(point, comment)?;

        let request = self
            .store
            .request(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Evaluation request {id}")))?;
        if request.elector_id != caller.id {
            return Err(Error::Forbidden(format!(
                "evaluation request {id} is assigned to someone else"
            )));
        }

        let closed = match self.store.close_request(id, &response).await? {
            CloseResult::Closed(request) => request,
            CloseResult::AlreadyClosed(_) => {
                return Err(Error::Conflict(format!(
                    "evaluation request {id} has already been answered"
                )))
            }
            CloseResult::Missing => {
                return Err(Error::not_found(format!("Evaluation request {id}")))
            }
        };
        debug!("Elector {} answered request {id}", caller.id);

        self.events.publish(AggregationEvent {
            question_id: closed.question_id,
            code: closed.code.clone(),
            cause: EventCause::ResponseSubmitted { request_id: id },
        });
        Ok(closed)
    }

    /// Evaluate a group on demand, bypassing the trigger.
    pub async fn manual_calculate(
        &self,
        caller: &Caller,
        question_id: Id,
        code: &GroupCode,
    ) -> Result<CalculationOutcome> {
        caller.require(Role::Admin)?;

        self.aggregator
            .recalculate(question_id, code)
            .await
            .map_err(|e| {
                error!("Manual calculation of group {code} for question {question_id} failed: {e}");
                Error::Calculation(format!("could not evaluate group {code}"))
            })
    }

    /// Every request of one question, with elector names.
    pub async fn list_by_question(
        &self,
        caller: &Caller,
        question_id: Id,
    ) -> Result<Vec<QuestionEvaluationRow>> {
        caller.require(Role::Admin)?;
        self.store.question_rows(question_id).await
    }

    /// One page of the requests visible to the caller, newest first.
    pub async fn list_requests(
        &self,
        caller: &Caller,
        branch_id: Option<Id>,
        pagination: Pagination,
    ) -> Result<Paginated<RequestListRow>> {
        let filter = scope::resolve_list_filter(self.store.as_ref(), caller, branch_id).await?;
        let (rows, total) = self.store.request_rows(&filter, &pagination).await?;
        Ok(Paginated {
            rows,
            pagination: pagination.result(total),
        })
    }

    /// The current settings record.
    pub async fn settings(&self) -> Result<Settings> {
        self.store.settings().await
    }

    /// Replace the settings record.
    pub async fn update_settings(&self, caller: &Caller, settings: Settings) -> Result<Settings> {
        caller.require(Role::Admin)?;
        settings.validate()?;
        self.store.save_settings(&settings).await?;
        info!("Settings updated by {}", caller.id);
        Ok(settings)
    }
}

/// Check a score and comment, converting them into a response.
fn validate_response(point: i64, comment: &str) -> Result<EvaluationResponse> {
    if !(MIN_POINT..=MAX_POINT).contains(&point) {
        return Err(Error::Validation(format!(
            "point must be between {MIN_POINT} and {MAX_POINT}, got {point}"
        )));
    }
    if comment.trim().is_empty() {
        return Err(Error::Validation("comment is required".to_string()));
    }
    let length = comment.chars().count();
    if length > MAX_COMMENT_LENGTH {
        return Err(Error::Validation(format!(
            "comment may be at most {MAX_COMMENT_LENGTH} characters, got {length}"
        )));
    }
    Ok(EvaluationResponse {
        // Range checked above.
        point: point as u8,
        comment: comment.to_string(),
    })
}
