use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::MatchingConfig;
use crate::workflows::matching::disclosure::DisclosurePolicy;
use crate::workflows::matching::domain::{
    AnonymousHandle, Application, ApplicationId, CandidateId, CandidateRecord, Company, CompanyId,
    ConsentRecord, DisclosureKey, HireRecord, IdentityProfile, InterestEvent, InterestId, Job,
    JobId,
};
use crate::workflows::matching::jobs::CompanyRegistration;
use crate::workflows::matching::memory::InMemoryMatchingStore;
use crate::workflows::matching::repository::{
    MatchingNotice, MatchingStore, NotificationError, NotificationPublisher, RepositoryError,
    WriteBatch,
};
use crate::workflows::matching::router::{matching_router, CANDIDATE_HEADER, COMPANY_HEADER};
use crate::workflows::matching::service::MatchingService;
use crate::workflows::matching::stage::PipelineStage;
use crate::workflows::matching::vault::{CandidateRegistration, RegisteredCandidate};

#[derive(Default)]
pub(super) struct MemoryNotices {
    pub(super) notices: Mutex<Vec<MatchingNotice>>,
}

impl MemoryNotices {
    pub(super) fn templates(&self) -> Vec<String> {
        self.notices
            .lock()
            .expect("notices lock")
            .iter()
            .map(|notice| notice.template.clone())
            .collect()
    }

    pub(super) fn last(&self, template: &str) -> Option<MatchingNotice> {
        self.notices
            .lock()
            .expect("notices lock")
            .iter()
            .rev()
            .find(|notice| notice.template == template)
            .cloned()
    }
}

impl NotificationPublisher for MemoryNotices {
    fn publish(&self, notice: MatchingNotice) -> Result<(), NotificationError> {
        self.notices.lock().expect("notices lock").push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotices;

impl NotificationPublisher for FailingNotices {
    fn publish(&self, _notice: MatchingNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

type CommitHook = Box<dyn FnOnce() + Send>;

/// Delegates to the shared in-memory store, but runs a one-shot hook right before the next
/// commit is forwarded. Lets a test land another transition between a workflow's reads and its
/// write.
pub(super) struct InterleavingStore {
    inner: Arc<InMemoryMatchingStore>,
    before_commit: Mutex<Option<CommitHook>>,
}

impl InterleavingStore {
    pub(super) fn new(inner: Arc<InMemoryMatchingStore>) -> Self {
        Self {
            inner,
            before_commit: Mutex::new(None),
        }
    }

    pub(super) fn before_next_commit(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_commit.lock().expect("hook lock") = Some(Box::new(hook));
    }
}

impl MatchingStore for InterleavingStore {
    fn candidate(&self, id: &CandidateId) -> Result<Option<CandidateRecord>, RepositoryError> {
        self.inner.candidate(id)
    }

    fn candidate_by_handle(
        &self,
        handle: &AnonymousHandle,
    ) -> Result<Option<CandidateRecord>, RepositoryError> {
        self.inner.candidate_by_handle(handle)
    }

    fn candidates(&self) -> Result<Vec<CandidateRecord>, RepositoryError> {
        self.inner.candidates()
    }

    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.company(id)
    }

    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        self.inner.job(id)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.application(id)
    }

    fn application_for(
        &self,
        candidate: &CandidateId,
        job: &JobId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.application_for(candidate, job)
    }

    fn applications_for_job(&self, job: &JobId) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_for_job(job)
    }

    fn applications_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_for_candidate(candidate)
    }

    fn interest(&self, id: &InterestId) -> Result<Option<InterestEvent>, RepositoryError> {
        self.inner.interest(id)
    }

    fn open_interest(
        &self,
        key: &DisclosureKey,
    ) -> Result<Option<InterestEvent>, RepositoryError> {
        self.inner.open_interest(key)
    }

    fn interests_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<InterestEvent>, RepositoryError> {
        self.inner.interests_for_candidate(candidate)
    }

    fn consent(&self, key: &DisclosureKey) -> Result<Option<ConsentRecord>, RepositoryError> {
        self.inner.consent(key)
    }

    fn active_hire(&self, candidate: &CandidateId) -> Result<Option<HireRecord>, RepositoryError> {
        self.inner.active_hire(candidate)
    }

    fn hires_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<HireRecord>, RepositoryError> {
        self.inner.hires_for_candidate(candidate)
    }

    fn latest_hire_at(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, RepositoryError> {
        self.inner.latest_hire_at(candidate)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let hook = self.before_commit.lock().expect("hook lock").take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.commit(batch)
    }
}

pub(super) type TestService = MatchingService<InMemoryMatchingStore, MemoryNotices>;

pub(super) struct Fixture {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryMatchingStore>,
    pub(super) notices: Arc<MemoryNotices>,
}

pub(super) fn fixture() -> Fixture {
    fixture_with(MatchingConfig::default())
}

pub(super) fn fixture_with(config: MatchingConfig) -> Fixture {
    let store = Arc::new(InMemoryMatchingStore::default());
    let notices = Arc::new(MemoryNotices::default());
    let service = Arc::new(MatchingService::new(store.clone(), notices.clone(), config));
    Fixture {
        service,
        store,
        notices,
    }
}

pub(super) fn identity(name: &str, email: &str) -> IdentityProfile {
    IdentityProfile {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: Some("+55 11 99999-0000".to_string()),
        documents: Vec::new(),
    }
}

impl Fixture {
    pub(super) fn company(&self, name: &str) -> CompanyId {
        self.service
            .jobs()
            .register_company(CompanyRegistration {
                legal_name: format!("{name} Ltda"),
                trade_name: name.to_string(),
                sector: "technology".to_string(),
            })
            .expect("company registers")
            .id
    }

    pub(super) fn draft_job(&self, company: &CompanyId, title: &str) -> JobId {
        self.service
            .jobs()
            .post_job(company, title)
            .expect("job posts")
            .id
    }

    pub(super) fn open_job(&self, company: &CompanyId, title: &str) -> JobId {
        let job = self.draft_job(company, title);
        self.service
            .jobs()
            .open_job(company, &job)
            .expect("job opens");
        job
    }

    pub(super) fn candidate(&self, name: &str, email: &str) -> RegisteredCandidate {
        let mut competencies = BTreeMap::new();
        competencies.insert("Rust".to_string(), 4);
        competencies.insert("SQL".to_string(), 3);
        self.service
            .vault()
            .register(CandidateRegistration {
                identity: identity(name, email),
                competencies,
            })
            .expect("candidate registers")
    }

    pub(super) fn is_open(
        &self,
        candidate: &CandidateId,
        company: &CompanyId,
        job: &JobId,
    ) -> bool {
        self.service
            .gate()
            .is_open(&DisclosureKey {
                candidate_id: candidate.clone(),
                company_id: company.clone(),
                job_id: job.clone(),
            })
            .expect("gate readable")
    }

    pub(super) fn application(&self, candidate: &CandidateId, job: &JobId) -> Application {
        self.store
            .application_for(candidate, job)
            .expect("store readable")
            .expect("application exists")
    }

    /// Company expresses interest and the candidate accepts; leaves the application at interview.
    pub(super) fn disclosed(
        &self,
        company: &CompanyId,
        candidate: &RegisteredCandidate,
        job: &JobId,
    ) -> InterestId {
        let event = self
            .service
            .express_interest(company, &candidate.handle, job)
            .expect("interest expressed");
        self.service
            .interest()
            .accept(&candidate.candidate_id, &event.id)
            .expect("interest accepted");
        event.id
    }

    /// Drive an application to `target` through company moves.
    pub(super) fn move_to(
        &self,
        company: &CompanyId,
        candidate: &CandidateId,
        job: &JobId,
        target: PipelineStage,
    ) -> Application {
        let current = self.application(candidate, job);
        self.service
            .pipeline()
            .move_stage(company, &current.id, current.stage, target)
            .expect("stage move")
    }
}

pub(super) fn company_request(method: &str, uri: &str, company: &CompanyId) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(COMPANY_HEADER, company.as_str())
        .body(Body::empty())
        .expect("request builds")
}

pub(super) fn candidate_request(method: &str, uri: &str, candidate: &CandidateId) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CANDIDATE_HEADER, candidate.as_str())
        .body(Body::empty())
        .expect("request builds")
}

pub(super) fn company_json_request(
    method: &str,
    uri: &str,
    company: &CompanyId,
    payload: &Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(COMPANY_HEADER, company.as_str())
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).expect("json body")))
        .expect("request builds")
}

pub(super) async fn send(service: &Arc<TestService>, request: Request<Body>) -> Response {
    matching_router(service.clone())
        .oneshot(request)
        .await
        .expect("route executes")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
