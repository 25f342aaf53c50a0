//! In-memory implementation of `EvaluationStore`, for tests.
//!
//! Every operation takes a single lock over all tables, so multi-row
//! mutations are trivially atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rocket::tokio::sync::{Notify, RwLock};

use super::{CloseResult, EvaluationStore};
use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    common::{GroupCode, QuestionStatus},
    db::{
        Branch, EvaluationRequest, EvaluationResponse, Question, QuestionEvaluationRow,
        RequestListFilter, RequestListRow, Settings, User,
    },
    mongodb::Id,
};

#[derive(Default)]
struct Tables {
    requests: HashMap<Id, EvaluationRequest>,
    questions: HashMap<Id, Question>,
    users: HashMap<Id, User>,
    branches: HashMap<Id, Branch>,
    settings: Option<Settings>,
}

impl Tables {
    fn is_member(&self, code: &GroupCode, elector_id: Id) -> bool {
        self.requests
            .values()
            .any(|r| &r.code == code && r.elector_id == elector_id)
    }

    fn user_name(&self, id: Id) -> Option<String> {
        self.users.get(&id).map(|user| user.full_name.clone())
    }
}

/// In-memory evaluation store.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Number of outcome writes applied to questions.
    outcome_writes: AtomicUsize,
    /// When set, every write fails before touching any table.
    fail_writes: AtomicBool,
    /// Signalled when the next group read completes, and waited on before it returns.
    group_read_pause: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            outcome_writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            group_read_pause: Mutex::new(None),
        }
    }

    pub async fn add_question(&self, question: Question) {
        self.tables
            .write()
            .await
            .questions
            .insert(question.id, question);
    }

    pub async fn add_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn add_branch(&self, branch: Branch) {
        self.tables.write().await.branches.insert(branch.id, branch);
    }

    /// Every stored request, in no particular order.
    pub async fn all_requests(&self) -> Vec<EvaluationRequest> {
        self.tables.read().await.requests.values().cloned().collect()
    }

    /// How many times an outcome has been written onto a question.
    pub fn outcome_writes(&self) -> usize {
        self.outcome_writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold the next `group_members` call after it has read its rows.
    /// Returns `(reached, release)`: `reached` is notified once the rows are
    /// read, and the call returns only after `release` is notified.
    pub fn pause_next_group_read(&self) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.group_read_pause.lock().unwrap() = Some((reached.clone(), release.clone()));
        (reached, release)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Persistence("memory store is refusing writes".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl EvaluationStore for MemoryStore {
    async fn question(&self, id: Id) -> Result<Option<Question>> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn insert_group(&self, question_id: Id, requests: &[EvaluationRequest]) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        for request in requests {
            if tables.is_member(&request.code, request.elector_id) {
                return Err(Error::Conflict(format!(
                    "elector {} is already in group {}",
                    request.elector_id, request.code
                )));
            }
        }
        for request in requests {
            tables.requests.insert(request.id, request.clone());
        }
        if let Some(question) = tables.questions.get_mut(&question_id) {
            if question.status.is_electable() {
                question.status = QuestionStatus::InElection;
            }
        }
        Ok(())
    }

    async fn insert_request(&self, request: &EvaluationRequest) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.is_member(&request.code, request.elector_id) {
            return Err(Error::Conflict(format!(
                "elector {} is already in group {}",
                request.elector_id, request.code
            )));
        }
        tables.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn request(&self, id: Id) -> Result<Option<EvaluationRequest>> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn group_members(
        &self,
        question_id: Id,
        code: &GroupCode,
    ) -> Result<Vec<EvaluationRequest>> {
        let mut members: Vec<_> = self
            .tables
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.question_id == question_id && &r.code == code)
            .cloned()
            .collect();
        members.sort_by_key(|r| r.created_at);

        let pause = self.group_read_pause.lock().unwrap().take();
        if let Some((reached, release)) = pause {
            reached.notify_one();
            release.notified().await;
        }
        Ok(members)
    }

    async fn delete_request(&self, id: Id) -> Result<Option<EvaluationRequest>> {
        self.check_writable()?;
        Ok(self.tables.write().await.requests.remove(&id))
    }

    async fn delete_group(&self, question_id: Id, code: &GroupCode) -> Result<u64> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let before = tables.requests.len();
        tables
            .requests
            .retain(|_, r| !(r.question_id == question_id && &r.code == code));
        let deleted = (before - tables.requests.len()) as u64;
        if let Some(question) = tables.questions.get_mut(&question_id) {
            if question.status == QuestionStatus::InElection {
                question.status = QuestionStatus::WaitingForAction;
            }
        }
        Ok(deleted)
    }

    async fn close_request(&self, id: Id, response: &EvaluationResponse) -> Result<CloseResult> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let request = match tables.requests.get_mut(&id) {
            Some(request) => request,
            None => return Ok(CloseResult::Missing),
        };
        if !request.is_open {
            return Ok(CloseResult::AlreadyClosed(request.clone()));
        }
        request.point = Some(response.point);
        request.comment = Some(response.comment.clone());
        request.is_open = false;
        request.updated_at = Utc::now();
        Ok(CloseResult::Closed(request.clone()))
    }

    async fn apply_outcome(
        &self,
        question_id: Id,
        status: QuestionStatus,
        score: f64,
    ) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let question = tables
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| Error::not_found(format!("Question {question_id}")))?;
        question.status = status;
        question.eval_point = Some(score);
        self.outcome_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn branch_ids_with_codes(&self, codes: &[&str]) -> Result<Vec<Id>> {
        let tables = self.tables.read().await;
        Ok(tables
            .branches
            .values()
            .filter(|b| codes.contains(&b.code.as_str()))
            .map(|b| b.id)
            .collect())
    }

    async fn question_rows(&self, question_id: Id) -> Result<Vec<QuestionEvaluationRow>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<_> = tables
            .requests
            .values()
            .filter(|r| r.question_id == question_id)
            .collect();
        requests.sort_by_key(|r| r.created_at);
        // Inner join: requests whose elector is unknown are skipped.
        Ok(requests
            .into_iter()
            .filter_map(|r| {
                Some(QuestionEvaluationRow {
                    id: r.id,
                    elector_id: r.elector_id,
                    elector_name: tables.user_name(r.elector_id)?,
                    code: r.code.clone(),
                    comment: r.comment.clone(),
                    point: r.point,
                    is_open: r.is_open,
                    updated_at: r.updated_at,
                })
            })
            .collect())
    }

    async fn request_rows(
        &self,
        filter: &RequestListFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<RequestListRow>, usize)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RequestListRow> = tables
            .requests
            .values()
            .filter(|r| filter.elector_id.map_or(true, |id| r.elector_id == id))
            .filter_map(|r| {
                let question = tables.questions.get(&r.question_id)?;
                if filter.lesson_id.map_or(false, |id| question.lesson_id != id) {
                    return None;
                }
                Some(RequestListRow {
                    id: r.id,
                    question_id: r.question_id,
                    creator_id: r.creator_id,
                    elector_id: r.elector_id,
                    creator_name: tables.user_name(r.creator_id)?,
                    elector_name: tables.user_name(r.elector_id)?,
                    code: r.code.clone(),
                    point: r.point,
                    comment: r.comment.clone(),
                    branch_name: tables.branches.get(&question.lesson_id)?.name.clone(),
                    created_at: r.created_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len();
        let page = rows
            .into_iter()
            .skip(pagination.skip())
            .take(pagination.page_size())
            .collect();
        Ok((page, total))
    }

    async fn settings(&self) -> Result<Settings> {
        Ok(self
            .tables
            .read()
            .await
            .settings
            .clone()
            .unwrap_or_else(Settings::initial))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.check_writable()?;
        self.tables.write().await.settings = Some(settings.clone());
        Ok(())
    }
}
