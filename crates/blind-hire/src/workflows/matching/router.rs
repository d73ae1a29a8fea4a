use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AnonymousHandle, ApplicationId, CandidateId, CompanyId, IdentityProfile, InterestId, JobId,
    Principal,
};
use super::error::{ErrorCategory, MatchingError};
use super::jobs::CompanyRegistration;
use super::repository::{MatchingStore, NotificationPublisher};
use super::service::MatchingService;
use super::stage::PipelineStage;
use super::vault::CandidateRegistration;

/// Header carrying the authenticated company, set by the session collaborator.
pub const COMPANY_HEADER: &str = "x-company-id";
/// Header carrying the authenticated candidate.
pub const CANDIDATE_HEADER: &str = "x-candidate-id";
/// Header carrying the back-office operator allowed to import assessment results.
pub const OPERATOR_HEADER: &str = "x-operator-id";

#[derive(Debug, Deserialize)]
pub struct ExpressInterestRequest {
    pub company_id: CompanyId,
    /// The anonymous handle the company was shown.
    pub candidate_id: AnonymousHandle,
    pub job_id: JobId,
}

#[derive(Debug, Deserialize)]
pub struct StageChangeRequest {
    pub expected_stage: PipelineStage,
    pub new_stage: PipelineStage,
}

#[derive(Debug, Deserialize)]
pub struct DeclareCompetenciesRequest {
    pub competencies: BTreeMap<String, u8>,
}

#[derive(Debug, Deserialize)]
pub struct PostJobRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub job_id: JobId,
}

/// Router builder exposing the matching workflow under `/api/v1`.
pub fn matching_router<S, N>(service: Arc<MatchingService<S, N>>) -> Router
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/interest", post(express_interest_handler::<S, N>))
        .route(
            "/api/v1/interest/:interest_id/accept",
            post(accept_interest_handler::<S, N>),
        )
        .route(
            "/api/v1/interest/:interest_id/reject",
            post(reject_interest_handler::<S, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            get(job_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            patch(move_stage_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/hire",
            post(hire_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/history",
            get(history_handler::<S, N>),
        )
        .route(
            "/api/v1/candidates",
            post(register_candidate_handler::<S, N>).get(browse_handler::<S, N>),
        )
        .route(
            "/api/v1/candidates/:handle",
            get(resolve_candidate_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/reactivate",
            post(reactivate_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/profile",
            get(candidate_profile_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/identity",
            put(update_identity_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/competencies",
            put(declare_competencies_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/applications",
            get(candidate_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/candidate/interest",
            get(interest_inbox_handler::<S, N>),
        )
        .route("/api/v1/jobs/:job_id/apply", post(apply_handler::<S, N>))
        .route(
            "/api/v1/companies",
            post(register_company_handler::<S, N>),
        )
        .route("/api/v1/jobs", post(post_job_handler::<S, N>))
        .route("/api/v1/jobs/:job_id/open", post(open_job_handler::<S, N>))
        .route("/api/v1/jobs/:job_id/close", post(close_job_handler::<S, N>))
        .with_state(service)
}

/// Map a workflow error onto the HTTP surface: `{"error": <code>, "message": <detail>}`.
pub fn error_response(error: &MatchingError) -> Response {
    let status = match error.category() {
        ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": error.code(),
        "message": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn caller_error(status: StatusCode, code: &str, message: &str) -> Response {
    let payload = json!({
        "error": code,
        "message": message,
    });
    (status, Json(payload)).into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn company_caller(headers: &HeaderMap) -> Result<CompanyId, Response> {
    header_value(headers, COMPANY_HEADER)
        .map(CompanyId)
        .ok_or_else(|| {
            caller_error(
                StatusCode::UNAUTHORIZED,
                "UnauthorizedError",
                "company session required",
            )
        })
}

fn candidate_caller(headers: &HeaderMap) -> Result<CandidateId, Response> {
    header_value(headers, CANDIDATE_HEADER)
        .map(CandidateId)
        .ok_or_else(|| {
            caller_error(
                StatusCode::UNAUTHORIZED,
                "UnauthorizedError",
                "candidate session required",
            )
        })
}

/// Resolves the operator behind a back-office request, or the 401 to send back.
pub fn operator_caller(headers: &HeaderMap) -> Result<String, Response> {
    header_value(headers, OPERATOR_HEADER).ok_or_else(|| {
        caller_error(
            StatusCode::UNAUTHORIZED,
            "UnauthorizedError",
            "operator session required",
        )
    })
}

fn any_caller(headers: &HeaderMap) -> Result<Principal, Response> {
    if let Some(company) = header_value(headers, COMPANY_HEADER) {
        return Ok(Principal::Company(CompanyId(company)));
    }
    candidate_caller(headers).map(Principal::Candidate)
}

pub(crate) async fn express_interest_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Json(request): Json<ExpressInterestRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    if request.company_id != company {
        return caller_error(
            StatusCode::FORBIDDEN,
            "ForbiddenError",
            "company_id does not match the authenticated company",
        );
    }

    match service.express_interest(&company, &request.candidate_id, &request.job_id) {
        Ok(event) => {
            (StatusCode::CREATED, Json(json!({ "interest_id": event.id }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn accept_interest_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(interest_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service
        .interest()
        .accept(&candidate, &InterestId(interest_id))
    {
        Ok(resolution) => (
            StatusCode::OK,
            Json(json!({
                "consent": resolution.consent,
                "stage": resolution.stage,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn reject_interest_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(interest_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service
        .interest()
        .reject(&candidate, &InterestId(interest_id))
    {
        Ok(resolution) => (
            StatusCode::OK,
            Json(json!({
                "consent": resolution.consent,
                "stage": resolution.stage,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn job_applications_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    let job_id = JobId(job_id);
    match service.applications_for_job(&company, &job_id) {
        Ok(applications) => (
            StatusCode::OK,
            Json(json!({
                "job_id": job_id,
                "applications": applications,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn move_stage_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<StageChangeRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    match service.pipeline().move_stage(
        &company,
        &ApplicationId(application_id),
        request.expected_stage,
        request.new_stage,
    ) {
        Ok(application) => (
            StatusCode::OK,
            Json(json!({
                "application_id": application.id,
                "stage": application.stage,
                "updated_at": application.updated_at,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn hire_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    let application_id = ApplicationId(application_id);
    match service.hires().hire_application(&company, &application_id) {
        Ok(hire) => (
            StatusCode::OK,
            Json(json!({
                "hire_id": hire.id,
                "application_id": application_id,
                "job_id": hire.job_id,
                "stage": PipelineStage::Hired,
                "hired_at": hire.hired_at,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn history_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let viewer = match any_caller(&headers) {
        Ok(viewer) => viewer,
        Err(rejection) => return rejection,
    };
    let application_id = ApplicationId(application_id);
    match service.pipeline().history(&viewer, &application_id) {
        Ok(history) => {
            // Actor ids stay internal; companies must not learn candidate keys from the log.
            let entries: Vec<_> = history
                .iter()
                .map(|entry| {
                    json!({
                        "stage": entry.stage,
                        "actor": entry.actor.label(),
                        "at": entry.at,
                    })
                })
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "application_id": application_id,
                    "history": entries,
                })),
            )
                .into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn register_candidate_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    Json(registration): Json<CandidateRegistration>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.vault().register(registration) {
        Ok(registered) => (StatusCode::CREATED, Json(registered)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn browse_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Query(query): Query<BrowseQuery>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(rejection) = company_caller(&headers) {
        return rejection;
    }
    match service.browse(query.limit) {
        Ok(candidates) => {
            (StatusCode::OK, Json(json!({ "candidates": candidates }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn resolve_candidate_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(handle): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    match service.resolve_candidate(&company, &AnonymousHandle(handle), &query.job_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn reactivate_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.hires().reactivate(&candidate) {
        Ok(hire) => (
            StatusCode::OK,
            Json(json!({
                "hire_id": hire.id,
                "deactivated_at": hire.deactivated_at,
                "visibility": "active",
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn candidate_profile_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    let profile = service.vault().own_identity(&candidate).and_then(|identity| {
        let competencies = service.ledger().profile(&candidate)?;
        let hires = service.hires().hire_history(&candidate)?;
        Ok(json!({
            "identity": identity,
            "competencies": competencies,
            "hires": hires,
        }))
    });
    match profile {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn update_identity_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Json(identity): Json<IdentityProfile>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.vault().update_identity(&candidate, identity) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn declare_competencies_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Json(request): Json<DeclareCompetenciesRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.ledger().declare(&candidate, &request.competencies) {
        Ok(competencies) => {
            (StatusCode::OK, Json(json!({ "competencies": competencies }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn candidate_applications_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.pipeline().candidate_applications(&candidate) {
        Ok(applications) => {
            (StatusCode::OK, Json(json!({ "applications": applications }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn interest_inbox_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.interest().inbox(&candidate) {
        Ok(entries) => (StatusCode::OK, Json(json!({ "interest": entries }))).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn apply_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let candidate = match candidate_caller(&headers) {
        Ok(candidate) => candidate,
        Err(rejection) => return rejection,
    };
    match service.pipeline().apply(&candidate, &JobId(job_id)) {
        Ok(application) => (
            StatusCode::OK,
            Json(json!({
                "application_id": application.id,
                "job_id": application.job_id,
                "status": application.stage.candidate_label(),
                "updated_at": application.updated_at,
            })),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn register_company_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    Json(registration): Json<CompanyRegistration>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.jobs().register_company(registration) {
        Ok(company) => (StatusCode::CREATED, Json(company)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn post_job_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Json(request): Json<PostJobRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    match service.jobs().post_job(&company, &request.title) {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn open_job_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    match service.jobs().open_job(&company, &JobId(job_id)) {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn close_job_handler<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let company = match company_caller(&headers) {
        Ok(company) => company,
        Err(rejection) => return rejection,
    };
    match service.jobs().close_job(&company, &JobId(job_id)) {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(error) => error_response(&error),
    }
}
