//! MongoDB implementation of `EvaluationStore`.

use chrono::Utc;
use log::debug;
use mongodb::{
    bson::{doc, from_document, Bson, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use super::{CloseResult, EvaluationStore};
use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    common::{GroupCode, QuestionStatus},
    db::{
        Branch, EvaluationRequest, EvaluationResponse, Question, QuestionEvaluationRow,
        RequestListFilter, RequestListRow, Settings, User,
    },
    mongodb::{is_duplicate_key_error, Coll, Id, MongoCollection},
};

/// Evaluation store backed by a MongoDB replica set (transactions need one).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn requests(&self) -> Coll<EvaluationRequest> {
        Coll::from_db(&self.db)
    }

    fn questions(&self) -> Coll<Question> {
        Coll::from_db(&self.db)
    }

    fn branches(&self) -> Coll<Branch> {
        Coll::from_db(&self.db)
    }

    fn settings_coll(&self) -> Coll<Settings> {
        Coll::from_db(&self.db)
    }

    /// Run an aggregation over the requests collection and decode each result.
    async fn aggregate_requests<T>(&self, pipeline: Vec<Document>) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let documents: Vec<Document> = self
            .requests()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;
        documents
            .into_iter()
            .map(|document| {
                from_document(document).map_err(|err| Error::Persistence(err.to_string()))
            })
            .collect()
    }
}

/// Map a duplicate key violation to a membership conflict.
fn membership_error(err: mongodb::error::Error, code: &GroupCode) -> Error {
    if is_duplicate_key_error(&err) {
        Error::Conflict(format!("Elector is already a member of group {code}"))
    } else {
        err.into()
    }
}

/// `$lookup` a single document from another collection into `field`.
/// Rows without a match are dropped.
fn join_one(from: &str, local_field: &str, field: &str) -> [Document; 2] {
    [
        doc! {
            "$lookup": {
                "from": from,
                "localField": local_field,
                "foreignField": "_id",
                "as": field,
            }
        },
        doc! { "$unwind": format!("${field}") },
    ]
}

/// Decode the `{rows, total}` document produced by the paged listing's `$facet`.
fn decode_listing_facet(facet: &Document) -> Result<(Vec<RequestListRow>, usize)> {
    let malformed = |what: &str| Error::Persistence(format!("listing facet has malformed {what}"));

    // `$count` emits nothing at all when no rows match.
    let total = match facet.get_array("total").map_err(|_| malformed("total"))?.first() {
        None => 0,
        Some(count) => {
            let count = count
                .as_document()
                .and_then(|count| count.get("count"))
                .and_then(|count| count.as_i32().map(i64::from).or_else(|| count.as_i64()))
                .ok_or_else(|| malformed("total"))?;
            usize::try_from(count).map_err(|_| malformed("total"))?
        }
    };
    let rows = facet
        .get_array("rows")
        .map_err(|_| malformed("rows"))?
        .iter()
        .map(|row| {
            let row = row.as_document().ok_or_else(|| malformed("rows"))?;
            from_document(row.clone()).map_err(|err| Error::Persistence(err.to_string()))
        })
        .collect::<Result<Vec<RequestListRow>>>()?;
    Ok((rows, total))
}

#[rocket::async_trait]
impl EvaluationStore for MongoStore {
    async fn question(&self, id: Id) -> Result<Option<Question>> {
        Ok(self.questions().find_one(id.as_doc(), None).await?)
    }

    async fn insert_group(&self, question_id: Id, requests: &[EvaluationRequest]) -> Result<()> {
        let code = match requests.first() {
            Some(request) => request.code.clone(),
            None => return Ok(()),
        };

        // Atomically insert every member and move the question into election.
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        self.requests()
            .insert_many_with_session(requests, None, &mut session)
            .await
            .map_err(|err| membership_error(err, &code))?;

        let electable: Vec<Bson> = QuestionStatus::ELECTABLE
            .iter()
            .map(|status| Bson::from(*status))
            .collect();
        let filter = doc! {
            "_id": question_id,
            "status": { "$in": electable },
        };
        let update = doc! {
            "$set": { "status": QuestionStatus::InElection },
        };
        self.questions()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(())
    }

    async fn insert_request(&self, request: &EvaluationRequest) -> Result<()> {
        self.requests()
            .insert_one(request, None)
            .await
            .map_err(|err| membership_error(err, &request.code))?;
        Ok(())
    }

    async fn request(&self, id: Id) -> Result<Option<EvaluationRequest>> {
        Ok(self.requests().find_one(id.as_doc(), None).await?)
    }

    async fn group_members(
        &self,
        question_id: Id,
        code: &GroupCode,
    ) -> Result<Vec<EvaluationRequest>> {
        let filter = doc! {
            "question_id": question_id,
            "code": code,
        };
        Ok(self
            .requests()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn delete_request(&self, id: Id) -> Result<Option<EvaluationRequest>> {
        Ok(self.requests().find_one_and_delete(id.as_doc(), None).await?)
    }

    async fn delete_group(&self, question_id: Id, code: &GroupCode) -> Result<u64> {
        // Atomically delete the group and take the question out of election.
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "question_id": question_id,
            "code": code,
        };
        let result = self
            .requests()
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        let filter = doc! {
            "_id": question_id,
            "status": QuestionStatus::InElection,
        };
        let update = doc! {
            "$set": { "status": QuestionStatus::WaitingForAction },
        };
        self.questions()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(result.deleted_count)
    }

    async fn close_request(&self, id: Id, response: &EvaluationResponse) -> Result<CloseResult> {
        // Only an open request may be closed; the filter makes this a single atomic step.
        let filter = doc! {
            "_id": id,
            "is_open": true,
        };
        let update = doc! {
            "$set": {
                "point": i32::from(response.point),
                "comment": response.comment.clone(),
                "is_open": false,
                "updated_at": BsonDateTime::from_chrono(Utc::now()),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let closed = self
            .requests()
            .find_one_and_update(filter, update, options)
            .await?;

        Ok(match closed {
            Some(request) => CloseResult::Closed(request),
            None => match self.request(id).await? {
                Some(request) => CloseResult::AlreadyClosed(request),
                None => CloseResult::Missing,
            },
        })
    }

    async fn apply_outcome(
        &self,
        question_id: Id,
        status: QuestionStatus,
        score: f64,
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                "status": status,
                "eval_point": score,
            }
        };
        let result = self
            .questions()
            .update_one(question_id.as_doc(), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Question {question_id}")));
        }
        debug!("Question {question_id} evaluated as {status:?} with {score}");
        Ok(())
    }

    async fn branch_ids_with_codes(&self, codes: &[&str]) -> Result<Vec<Id>> {
        let codes: Vec<Bson> = codes.iter().map(|code| Bson::from(*code)).collect();
        let filter = doc! {
            "code": { "$in": codes },
        };
        let branches: Vec<Branch> = self
            .branches()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(branches.into_iter().map(|branch| branch.id).collect())
    }

    async fn question_rows(&self, question_id: Id) -> Result<Vec<QuestionEvaluationRow>> {
        let mut pipeline = vec![doc! { "$match": { "question_id": question_id } }];
        pipeline.extend(join_one(User::NAME, "elector_id", "elector"));
        pipeline.push(doc! { "$sort": { "created_at": 1 } });
        pipeline.push(doc! {
            "$project": {
                "_id": 1,
                "elector_id": 1,
                "elector_name": "$elector.full_name",
                "code": 1,
                "comment": 1,
                "point": 1,
                "is_open": 1,
                "updated_at": 1,
            }
        });
        self.aggregate_requests(pipeline).await
    }

    async fn request_rows(
        &self,
        filter: &RequestListFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<RequestListRow>, usize)> {
        let mut pipeline = Vec::new();
        if let Some(elector_id) = filter.elector_id {
            pipeline.push(doc! { "$match": { "elector_id": elector_id } });
        }
        pipeline.extend(join_one(Question::NAME, "question_id", "question"));
        if let Some(lesson_id) = filter.lesson_id {
            pipeline.push(doc! { "$match": { "question.lesson_id": lesson_id } });
        }
        pipeline.extend(join_one(User::NAME, "creator_id", "creator"));
        pipeline.extend(join_one(User::NAME, "elector_id", "elector"));
        pipeline.extend(join_one(Branch::NAME, "question.lesson_id", "branch"));
        pipeline.push(doc! { "$sort": { "created_at": -1 } });
        let skip = pagination.skip() as i64;
        let limit = pagination.page_size() as i64;
        pipeline.push(doc! {
            "$facet": {
                "rows": [
                    { "$skip": skip },
                    { "$limit": limit },
                    {
                        "$project": {
                            "_id": 1,
                            "question_id": 1,
                            "creator_id": 1,
                            "elector_id": 1,
                            "creator_name": "$creator.full_name",
                            "elector_name": "$elector.full_name",
                            "code": 1,
                            "point": 1,
                            "comment": 1,
                            "branch_name": "$branch.name",
                            "created_at": 1,
                        }
                    },
                ],
                "total": [{ "$count": "count" }],
            }
        });

        let facet: Vec<Document> = self
            .requests()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;
        // `$facet` always yields exactly one document.
        let facet = facet
            .into_iter()
            .next()
            .ok_or_else(|| Error::Persistence("listing returned no facet document".to_string()))?;
        decode_listing_facet(&facet)
    }

    async fn settings(&self) -> Result<Settings> {
        self.settings_coll()
            .find_one(None, None)
            .await?
            .ok_or_else(|| Error::not_found("Settings"))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.settings_coll()
            .replace_one(doc! {}, settings, options)
            .await?;
        Ok(())
    }
}
