use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::evaluation::Evaluations;
use crate::model::{
    api::{
        auth::Caller,
        evaluation::{
            AddElectorRequest, CalculateRequest, CalculationReport, CreateGroupRequest,
            EvaluationRequestDescription, GroupDeleted, GroupDescription, QuestionEvaluationEntry,
            RequestListEntry, SubmitResponseRequest,
        },
        pagination::{Paginated, Pagination},
    },
    common::GroupCode,
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_group,
        add_elector,
        delete_member,
        delete_group,
        submit_response,
        calculate,
        question_evaluations,
        evaluation_requests,
    ]
}

#[post("/questions/<question_id>/evaluations", data = "<body>", format = "json")]
async fn create_group(
    caller: Caller,
    question_id: Id,
    body: Json<CreateGroupRequest>,
    evaluations: &State<Evaluations>,
) -> Result<(Status, Json<GroupDescription>)> {
    let electors: Vec<Id> = body.0.electors.into_iter().map(|e| e.id.into()).collect();
    let group = evaluations
        .create_group(&caller, question_id, &electors)
        .await?;
    Ok((Status::Created, Json(group.into())))
}

#[post("/evaluations/electors", data = "<body>", format = "json")]
async fn add_elector(
    caller: Caller,
    body: Json<AddElectorRequest>,
    evaluations: &State<Evaluations>,
) -> Result<Json<EvaluationRequestDescription>> {
    let body = body.0;
    let request = evaluations
        .add_elector(
            &caller,
            body.group.into(),
            body.question_id.into(),
            body.elector_id.into(),
        )
        .await?;
    Ok(Json(request.into()))
}

#[delete("/evaluations/<id>")]
async fn delete_member(
    caller: Caller,
    id: Id,
    evaluations: &State<Evaluations>,
) -> Result<Json<EvaluationRequestDescription>> {
    let deleted = evaluations.delete_member(&caller, id).await?;
    Ok(Json(deleted.into()))
}

#[delete("/questions/<question_id>/evaluations/<code>")]
async fn delete_group(
    caller: Caller,
    question_id: Id,
    code: GroupCode,
    evaluations: &State<Evaluations>,
) -> Result<Json<GroupDeleted>> {
    let deleted = evaluations.delete_group(&caller, question_id, &code).await?;
    Ok(Json(GroupDeleted { deleted }))
}

#[put("/evaluations/<id>/response", data = "<body>", format = "json")]
async fn submit_response(
    caller: Caller,
    id: Id,
    body: Json<SubmitResponseRequest>,
    evaluations: &State<Evaluations>,
) -> Result<(Status, Json<EvaluationRequestDescription>)> {
    let closed = evaluations
        .submit_response(&caller, id, body.point, &body.comment)
        .await?;
    Ok((Status::Created, Json(closed.into())))
}

#[post("/evaluations/calculate", data = "<body>", format = "json")]
async fn calculate(
    caller: Caller,
    body: Json<CalculateRequest>,
    evaluations: &State<Evaluations>,
) -> Result<Json<CalculationReport>> {
    let body = body.0;
    let outcome = evaluations
        .manual_calculate(&caller, body.question_id.into(), &body.code)
        .await?;
    Ok(Json(outcome.into()))
}

#[get("/questions/<question_id>/evaluations")]
async fn question_evaluations(
    caller: Caller,
    question_id: Id,
    evaluations: &State<Evaluations>,
) -> Result<Json<Vec<QuestionEvaluationEntry>>> {
    let rows = evaluations.list_by_question(&caller, question_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[get("/evaluations?<branch_id>")]
async fn evaluation_requests(
    caller: Caller,
    branch_id: Option<Id>,
    pagination: Pagination,
    evaluations: &State<Evaluations>,
) -> Result<Json<Paginated<RequestListEntry>>> {
    let page = evaluations
        .list_requests(&caller, branch_id, pagination)
        .await?;
    Ok(Json(Paginated {
        rows: page.rows.into_iter().map(Into::into).collect(),
        pagination: page.pagination,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Cookie, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, serde_json, Value},
    };

    use super::*;
    use crate::model::{
        api::auth::Role,
        common::QuestionStatus,
        db::{Branch, EvaluationRequest, Question, User},
    };
    use crate::evaluation::events::{AggregationEvent, EventCause};
    use crate::evaluation::store::EvaluationStore;
    use crate::test_support::{cookie_for, TestEvents, TestStore};

    async fn seed_question(store: &TestStore) -> Id {
        let question = Question::example(Id::new());
        let id = question.id;
        store.add_question(question).await;
        id
    }

    async fn body_json(response: LocalResponse<'_>) -> Value {
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn post_group<'c>(
        client: &'c Client,
        auth: Cookie<'static>,
        question_id: Id,
        electors: &[Id],
    ) -> LocalResponse<'c> {
        let electors: Vec<_> = electors
            .iter()
            .map(|id| json!({ "id": id.to_string() }))
            .collect();
        client
            .post(format!("/questions/{question_id}/evaluations"))
            .header(ContentType::JSON)
            .cookie(auth)
            .body(json!({ "electors": electors }).to_string())
            .dispatch()
            .await
    }

    /// Create a group through the API, returning its code and requests.
    async fn create_group(
        client: &Client,
        store: &TestStore,
        question_id: Id,
        electors: &[&Caller],
    ) -> (GroupCode, Vec<EvaluationRequest>) {
        let ids: Vec<_> = electors.iter().map(|e| e.id).collect();
        let admin = cookie_for(client, Caller::example_admin());
        let response = post_group(client, admin, question_id, &ids).await;
        assert_eq!(Status::Created, response.status());
        let group: GroupDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let members = store
            .group_members(question_id, &group.code)
            .await
            .unwrap();
        assert_eq!(members.len(), electors.len());
        (group.code, members)
    }

    async fn submit(
        client: &Client,
        caller: &Caller,
        id: Id,
        point: i64,
        comment: &str,
    ) -> Status {
        client
            .put(format!("/evaluations/{id}/response"))
            .header(ContentType::JSON)
            .cookie(cookie_for(client, caller.clone()))
            .body(json!({ "point": point, "comment": comment }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn create_group_starts_election(client: Client, store: TestStore, events: TestEvents) {
        let question_id = seed_question(&store).await;
        let admin = cookie_for(&client, Caller::example_admin());

        let response = post_group(&client, admin, question_id, &[Id::new(), Id::new()]).await;
        assert_eq!(Status::Created, response.status());
        let body = body_json(response).await;
        assert_eq!(body["question_id"], question_id.to_string());
        assert_eq!(body["members"].as_array().unwrap().len(), 2);
        assert_eq!(body["code"].as_str().unwrap().len(), 6);

        let question = store.question(question_id).await.unwrap().unwrap();
        assert_eq!(question.status, QuestionStatus::InElection);
        assert!(events.events().is_empty());
    }

    #[backend_test]
    async fn create_group_errors(client: Client, store: TestStore) {
        let question_id = seed_question(&store).await;
        let electors = [Id::new(), Id::new()];

        // No identity.
        let response = client
            .post(format!("/questions/{question_id}/evaluations"))
            .header(ContentType::JSON)
            .body(json!({ "electors": [] }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // Not an admin.
        let teacher = cookie_for(&client, Caller::example_teacher("MAT"));
        let response = post_group(&client, teacher, question_id, &electors).await;
        assert_eq!(Status::Forbidden, response.status());

        // Too few electors.
        let admin = cookie_for(&client, Caller::example_admin());
        let response = post_group(&client, admin.clone(), question_id, &electors[..1]).await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("electors"));

        // Unknown question.
        let response = post_group(&client, admin, Id::new(), &electors).await;
        assert_eq!(Status::NotFound, response.status());

        assert!(store.all_requests().await.is_empty());
    }

    #[backend_test]
    async fn bearer_token_is_accepted(client: Client, store: TestStore) {
        let question_id = seed_question(&store).await;
        let config = client.rocket().state::<crate::Config>().unwrap();
        let token = Caller::example_admin().into_token(config, chrono::Duration::minutes(5));

        let response = client
            .get(format!("/questions/{question_id}/evaluations"))
            .header(rocket::http::Header::new(
                "Authorization",
                format!("Bearer {token}"),
            ))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test]
    async fn submit_response_lifecycle(client: Client, store: TestStore, events: TestEvents) {
        let question_id = seed_question(&store).await;
        let alice = Caller::example_teacher("MAT");
        let bob = Caller::example_teacher("MAT");
        let (code, members) = create_group(&client, &store, question_id, &[&alice, &bob]).await;
        let alices = members.iter().find(|m| m.elector_id == alice.id).unwrap();

        assert_eq!(
            Status::UnprocessableEntity,
            submit(&client, &alice, alices.id, 6, "Too generous").await
        );
        assert_eq!(
            Status::UnprocessableEntity,
            submit(&client, &alice, alices.id, 3, "").await
        );
        assert_eq!(
            Status::Forbidden,
            submit(&client, &bob, alices.id, 3, "Not mine").await
        );
        assert_eq!(
            Status::NotFound,
            submit(&client, &alice, Id::new(), 3, "Nowhere").await
        );
        assert_eq!(
            Status::Created,
            submit(&client, &alice, alices.id, 4, "Clear wording").await
        );
        assert_eq!(
            Status::Conflict,
            submit(&client, &alice, alices.id, 5, "Changed my mind").await
        );

        let stored = store.request(alices.id).await.unwrap().unwrap();
        assert!(!stored.is_open);
        assert_eq!(stored.point, Some(4));
        assert_eq!(
            events.events(),
            vec![AggregationEvent {
                question_id,
                code,
                cause: EventCause::ResponseSubmitted {
                    request_id: alices.id
                },
            }]
        );
    }

    #[backend_test]
    async fn add_and_delete_electors(client: Client, store: TestStore, events: TestEvents) {
        let question_id = seed_question(&store).await;
        let alice = Caller::example_teacher("MAT");
        let bob = Caller::example_teacher("MAT");
        let (code, members) = create_group(&client, &store, question_id, &[&alice, &bob]).await;
        let admin = cookie_for(&client, Caller::example_admin());

        // Replace Alice with Carol.
        let alices = members.iter().find(|m| m.elector_id == alice.id).unwrap();
        let response = client
            .delete(format!("/evaluations/{}", alices.id))
            .cookie(admin.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let response = client
            .delete(format!("/evaluations/{}", alices.id))
            .cookie(admin.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let carol = Id::new();
        let bobs = members.iter().find(|m| m.elector_id == bob.id).unwrap();
        let response = client
            .post("/evaluations/electors")
            .header(ContentType::JSON)
            .cookie(admin.clone())
            .body(
                json!({
                    "group": { "member": bobs.id.to_string() },
                    "question_id": question_id.to_string(),
                    "elector_id": carol.to_string(),
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = body_json(response).await;
        assert_eq!(body["code"], code.to_string());
        assert_eq!(body["is_open"], true);

        // Carol is already a member.
        let response = client
            .post("/evaluations/electors")
            .header(ContentType::JSON)
            .cookie(admin.clone())
            .body(
                json!({
                    "group": { "code": code.to_string() },
                    "question_id": question_id.to_string(),
                    "elector_id": carol.to_string(),
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // Delete the rest of the group.
        let response = client
            .delete(format!("/questions/{question_id}/evaluations/{code}"))
            .cookie(admin)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(body_json(response).await["deleted"], 2);
        assert!(store.all_requests().await.is_empty());
        let question = store.question(question_id).await.unwrap().unwrap();
        assert_eq!(question.status, QuestionStatus::WaitingForAction);

        let causes: Vec<_> = events.events().into_iter().map(|e| e.cause).collect();
        assert_eq!(
            causes,
            vec![
                EventCause::MemberDeleted {
                    request_id: alices.id
                },
                EventCause::GroupDeleted,
            ]
        );
    }

    #[backend_test]
    async fn manual_calculation(client: Client, store: TestStore) {
        let question_id = seed_question(&store).await;
        let alice = Caller::example_teacher("MAT");
        let bob = Caller::example_teacher("MAT");
        let (code, members) = create_group(&client, &store, question_id, &[&alice, &bob]).await;
        let admin = cookie_for(&client, Caller::example_admin());

        let calculate = |cookie: Cookie<'static>| {
            client
                .post("/evaluations/calculate")
                .header(ContentType::JSON)
                .cookie(cookie)
                .body(
                    json!({
                        "question_id": question_id.to_string(),
                        "code": code.to_string(),
                    })
                    .to_string(),
                )
                .dispatch()
        };

        let response = calculate(admin.clone()).await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            body_json(response).await,
            json!({ "outcome": "insufficient", "responses": 0, "required": 2 })
        );

        for (elector, point) in [(&alice, 5), (&bob, 4)] {
            let member = members.iter().find(|m| m.elector_id == elector.id).unwrap();
            assert_eq!(
                Status::Created,
                submit(&client, elector, member.id, point, "Fine").await
            );
        }
        let response = calculate(admin).await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            body_json(response).await,
            json!({
                "outcome": "computed",
                "status": "Approved",
                "score": 4.5,
                "responses": 2,
            })
        );
        let question = store.question(question_id).await.unwrap().unwrap();
        assert_eq!(question.status, QuestionStatus::Approved);
        assert_eq!(question.eval_point, Some(4.5));

        let teacher = cookie_for(&client, alice);
        assert_eq!(Status::Forbidden, calculate(teacher).await.status());
    }

    #[backend_test]
    async fn listings(client: Client, store: TestStore) {
        let social = Branch::example("SB", "Social Studies");
        let maths = Branch::example("MAT", "Mathematics");
        let (social_id, maths_id) = (social.id, maths.id);
        store.add_branch(social).await;
        store.add_branch(maths).await;

        let creator = User::example("Admin Kaya");
        let admin = Caller {
            id: creator.id,
            roles: vec![Role::Teacher, Role::Admin],
            branch_code: None,
        };
        store.add_user(creator).await;
        let elector = User::example("Selin Şahin");
        let teacher = Caller {
            id: elector.id,
            roles: vec![Role::Teacher],
            branch_code: Some("SB".to_string()),
        };
        let other = User::example("Emre Ekinci");
        let other_id = other.id;
        store.add_user(elector).await;
        store.add_user(other).await;

        let mut questions = Vec::new();
        for lesson in [social_id, maths_id] {
            let question = Question::example(lesson);
            questions.push(question.id);
            store.add_question(question).await;
            let response = post_group(
                &client,
                cookie_for(&client, admin.clone()),
                questions[questions.len() - 1],
                &[teacher.id, other_id],
            )
            .await;
            assert_eq!(Status::Created, response.status());
        }

        // Per question, for admins only.
        let response = client
            .get(format!("/questions/{}/evaluations", questions[0]))
            .cookie(cookie_for(&client, admin.clone()))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let rows = body_json(response).await;
        let mut names: Vec<_> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["full_name"].as_str().unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["Emre Ekinci", "Selin Şahin"]);
        let response = client
            .get(format!("/questions/{}/evaluations", questions[0]))
            .cookie(cookie_for(&client, teacher.clone()))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        // Admins see everything, optionally by branch.
        let response = client
            .get("/evaluations?page_size=3")
            .cookie(cookie_for(&client, admin.clone()))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let page = body_json(response).await;
        assert_eq!(page["rows"].as_array().unwrap().len(), 3);
        assert_eq!(page["pagination"]["total"], 4);
        let response = client
            .get(format!("/evaluations?branch_id={maths_id}"))
            .cookie(cookie_for(&client, admin.clone()))
            .dispatch()
            .await;
        let page = body_json(response).await;
        assert_eq!(page["pagination"]["total"], 2);
        assert_eq!(page["rows"][0]["branch_name"], "Mathematics");
        assert_eq!(page["rows"][0]["creator_name"], "Admin Kaya");

        // A scoped teacher sees only their own requests, and may narrow to an allowed branch.
        let response = client
            .get("/evaluations")
            .cookie(cookie_for(&client, teacher.clone()))
            .dispatch()
            .await;
        let page = body_json(response).await;
        assert_eq!(page["pagination"]["total"], 2);
        let response = client
            .get(format!("/evaluations?branch_id={social_id}"))
            .cookie(cookie_for(&client, teacher.clone()))
            .dispatch()
            .await;
        let page = body_json(response).await;
        assert_eq!(page["pagination"]["total"], 1);
        assert_eq!(page["rows"][0]["elector_name"], "Selin Şahin");
        // Mathematics is outside the allow-list, so the filter is ignored.
        let response = client
            .get(format!("/evaluations?branch_id={maths_id}"))
            .cookie(cookie_for(&client, teacher.clone()))
            .dispatch()
            .await;
        assert_eq!(body_json(response).await["pagination"]["total"], 2);

        // Bad paging.
        let response = client
            .get("/evaluations?page_size=0")
            .cookie(cookie_for(&client, teacher))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }
}
