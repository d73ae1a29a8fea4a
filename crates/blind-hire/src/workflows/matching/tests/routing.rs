use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::json;

use super::common::*;
use crate::workflows::matching::router::{CANDIDATE_HEADER, COMPANY_HEADER};
use crate::workflows::matching::stage::PipelineStage;

#[tokio::test]
async fn express_interest_route_returns_created() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");

    let response = send(
        &fx.service,
        company_json_request(
            "POST",
            "/api/v1/interest",
            &company,
            &json!({
                "company_id": company,
                "candidate_id": candidate.handle,
                "job_id": job,
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert!(payload["interest_id"]
        .as_str()
        .is_some_and(|id| id.starts_with("int-")));
}

#[tokio::test]
async fn express_interest_route_maps_workflow_errors() {
    let fx = fixture();
    let company = fx.company("Acme");
    let draft = fx.draft_job(&company, "Backend engineer");
    let open = fx.open_job(&company, "Data engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let body = |job: &crate::workflows::matching::JobId| {
        json!({
            "company_id": company,
            "candidate_id": candidate.handle,
            "job_id": job,
        })
    };

    let response = send(
        &fx.service,
        company_json_request("POST", "/api/v1/interest", &company, &body(&draft)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json_body(response).await["error"], "InvalidJobStateError");

    let first = send(
        &fx.service,
        company_json_request("POST", "/api/v1/interest", &company, &body(&open)),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let duplicate = send(
        &fx.service,
        company_json_request("POST", "/api/v1/interest", &company, &body(&open)),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let payload = read_json_body(duplicate).await;
    assert_eq!(payload["error"], "DuplicateInterestError");
    assert!(payload["message"].is_string());
}

#[tokio::test]
async fn caller_headers_are_required_and_must_match() {
    let fx = fixture();
    let company = fx.company("Acme");
    let other = fx.company("Globex");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let payload = json!({
        "company_id": company,
        "candidate_id": candidate.handle,
        "job_id": job,
    });

    let anonymous = Request::builder()
        .method("POST")
        .uri("/api/v1/interest")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = send(&fx.service, anonymous).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &fx.service,
        company_json_request("POST", "/api/v1/interest", &other, &payload),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(fx
        .service
        .interest()
        .inbox(&candidate.candidate_id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn accept_route_grants_consent_once() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let event = fx
        .service
        .express_interest(&company, &candidate.handle, &job)
        .expect("interest");
    let uri = format!("/api/v1/interest/{}/accept", event.id);

    let response = send(
        &fx.service,
        candidate_request("POST", &uri, &candidate.candidate_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["consent"], true);
    assert_eq!(payload["stage"], "interview");

    let again = send(
        &fx.service,
        candidate_request("POST", &uri, &candidate.candidate_id),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(again).await["error"], "AlreadyResolvedError");
}

#[tokio::test]
async fn reject_handler_reports_no_consent() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let event = fx
        .service
        .express_interest(&company, &candidate.handle, &job)
        .expect("interest");

    let mut headers = HeaderMap::new();
    headers.insert(
        CANDIDATE_HEADER,
        HeaderValue::from_str(candidate.candidate_id.as_str()).unwrap(),
    );
    let response = crate::workflows::matching::router::reject_interest_handler::<
        crate::workflows::matching::memory::InMemoryMatchingStore,
        MemoryNotices,
    >(State(fx.service.clone()), headers, Path(event.id.to_string()))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["consent"], false);
}

#[tokio::test]
async fn patch_route_reports_stale_and_invalid_moves() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let application = fx
        .service
        .pipeline()
        .apply(&candidate.candidate_id, &job)
        .expect("applied");
    let uri = format!("/api/v1/applications/{}", application.id);

    let moved = send(
        &fx.service,
        company_json_request(
            "PATCH",
            &uri,
            &company,
            &json!({"expected_stage": "pending", "new_stage": "finalist"}),
        ),
    )
    .await;
    assert_eq!(moved.status(), StatusCode::OK);
    assert_eq!(read_json_body(moved).await["stage"], "finalist");

    let stale = send(
        &fx.service,
        company_json_request(
            "PATCH",
            &uri,
            &company,
            &json!({"expected_stage": "pending", "new_stage": "review"}),
        ),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(stale).await["error"], "StaleStageError");

    let backwards = send(
        &fx.service,
        company_json_request(
            "PATCH",
            &uri,
            &company,
            &json!({"expected_stage": "finalist", "new_stage": "review"}),
        ),
    )
    .await;
    assert_eq!(backwards.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        read_json_body(backwards).await["error"],
        "InvalidTransitionError"
    );
}

#[tokio::test]
async fn hire_and_reactivate_routes_follow_the_lock() {
    let fx = fixture();
    let company_a = fx.company("Acme");
    let company_b = fx.company("Globex");
    let job_a = fx.open_job(&company_a, "Backend engineer");
    let job_b = fx.open_job(&company_b, "Platform engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    fx.disclosed(&company_a, &candidate, &job_a);
    fx.disclosed(&company_b, &candidate, &job_b);
    let app_a = fx.move_to(&company_a, &candidate.candidate_id, &job_a, PipelineStage::Finalist);
    let app_b = fx.move_to(&company_b, &candidate.candidate_id, &job_b, PipelineStage::Finalist);

    let early = send(
        &fx.service,
        candidate_request("POST", "/api/v1/candidate/reactivate", &candidate.candidate_id),
    )
    .await;
    assert_eq!(early.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json_body(early).await["error"], "NoActiveHireError");

    let hired = send(
        &fx.service,
        company_request(
            "POST",
            &format!("/api/v1/applications/{}/hire", app_a.id),
            &company_a,
        ),
    )
    .await;
    assert_eq!(hired.status(), StatusCode::OK);
    let payload = read_json_body(hired).await;
    assert_eq!(payload["stage"], "hired");
    assert!(payload.get("candidate_id").is_none());

    let conflict = send(
        &fx.service,
        company_request(
            "POST",
            &format!("/api/v1/applications/{}/hire", app_b.id),
            &company_b,
        ),
    )
    .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(conflict).await["error"], "ConflictError");
    assert_eq!(
        fx.application(&candidate.candidate_id, &job_b).stage,
        PipelineStage::ClosedSuperseded
    );

    let reactivated = send(
        &fx.service,
        candidate_request("POST", "/api/v1/candidate/reactivate", &candidate.candidate_id),
    )
    .await;
    assert_eq!(reactivated.status(), StatusCode::OK);
    assert_eq!(read_json_body(reactivated).await["visibility"], "active");
}

#[tokio::test]
async fn application_listing_discloses_only_through_the_gate() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let event = fx
        .service
        .express_interest(&company, &candidate.handle, &job)
        .expect("interest");
    let uri = format!("/api/v1/jobs/{job}/applications");

    let before = send(&fx.service, company_request("GET", &uri, &company)).await;
    assert_eq!(before.status(), StatusCode::OK);
    let payload = read_json_body(before).await;
    let entry = &payload["applications"][0];
    assert_eq!(entry["candidate"]["disclosure"], "anonymous");
    assert_eq!(entry["candidate"]["handle"], candidate.handle.as_str());
    assert!(!payload.to_string().contains("Ana Souza"));

    fx.service
        .interest()
        .accept(&candidate.candidate_id, &event.id)
        .expect("accepted");

    let after = send(&fx.service, company_request("GET", &uri, &company)).await;
    let payload = read_json_body(after).await;
    let entry = &payload["applications"][0];
    assert_eq!(entry["candidate"]["disclosure"], "disclosed");
    assert_eq!(entry["candidate"]["identity"]["full_name"], "Ana Souza");
    assert_eq!(entry["stage"], "interview");
}

#[tokio::test]
async fn history_route_hides_actor_ids() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    fx.disclosed(&company, &candidate, &job);
    let application = fx.application(&candidate.candidate_id, &job);

    let response = send(
        &fx.service,
        company_request(
            "GET",
            &format!("/api/v1/applications/{}/history", application.id),
            &company,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let history = payload["history"].as_array().expect("history array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["actor"], "candidate");
    assert!(!payload
        .to_string()
        .contains(candidate.candidate_id.as_str()));
}

#[tokio::test]
async fn unknown_handle_resolves_anonymously_over_http() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");

    let response = send(
        &fx.service,
        company_request(
            "GET",
            &format!("/api/v1/candidates/anon-unknown?job_id={job}"),
            &company,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["disclosure"], "anonymous");
    assert_eq!(payload["competencies"], json!([]));
}

#[tokio::test]
async fn self_service_routes_cover_the_candidate_journey() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");

    let registered = send(
        &fx.service,
        Request::builder()
            .method("POST")
            .uri("/api/v1/candidates")
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "identity": {"full_name": "Ana Souza", "email": "ana@example.com"},
                    "competencies": {"Rust": 4},
                }))
                .unwrap(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let payload = read_json_body(registered).await;
    let candidate = crate::workflows::matching::CandidateId(
        payload["candidate_id"].as_str().expect("id").to_string(),
    );

    let applied = send(
        &fx.service,
        candidate_request("POST", &format!("/api/v1/jobs/{job}/apply"), &candidate),
    )
    .await;
    assert_eq!(applied.status(), StatusCode::OK);
    assert_eq!(read_json_body(applied).await["status"], "pending");

    let listed = send(
        &fx.service,
        candidate_request("GET", "/api/v1/candidate/applications", &candidate),
    )
    .await;
    let payload = read_json_body(listed).await;
    assert_eq!(payload["applications"][0]["job_title"], "Backend engineer");

    let profile = send(
        &fx.service,
        candidate_request("GET", "/api/v1/candidate/profile", &candidate),
    )
    .await;
    let payload = read_json_body(profile).await;
    assert_eq!(payload["identity"]["email"], "ana@example.com");
    assert_eq!(payload["competencies"][0]["skill"], "rust");

    let browse = send(
        &fx.service,
        Request::builder()
            .uri("/api/v1/candidates?limit=5")
            .header(COMPANY_HEADER, company.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(browse.status(), StatusCode::OK);
    let payload = read_json_body(browse).await;
    assert_eq!(payload["candidates"].as_array().map(Vec::len), Some(1));
    assert!(!payload.to_string().contains("ana@example.com"));
}
