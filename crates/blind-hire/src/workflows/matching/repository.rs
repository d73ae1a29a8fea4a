use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    AnonymousHandle, Application, ApplicationId, CandidateId, CandidateRecord, Company, CompanyId,
    ConsentRecord, DisclosureKey, HireId, HireRecord, InterestEvent, InterestId, InterestStatus,
    Job, JobId, JobStatus, StageEntry,
};
use super::stage::HistoryViolation;

/// Storage abstraction for every matching aggregate.
///
/// Reads are plain lookups. All writes go through [`MatchingStore::commit`], which must apply a
/// [`WriteBatch`] as one unit: either every mutation's guard holds and every mutation lands, or
/// nothing changes.
pub trait MatchingStore: Send + Sync {
    fn candidate(&self, id: &CandidateId) -> Result<Option<CandidateRecord>, RepositoryError>;
    fn candidate_by_handle(
        &self,
        handle: &AnonymousHandle,
    ) -> Result<Option<CandidateRecord>, RepositoryError>;
    fn candidates(&self) -> Result<Vec<CandidateRecord>, RepositoryError>;

    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn application_for(
        &self,
        candidate: &CandidateId,
        job: &JobId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn applications_for_job(&self, job: &JobId) -> Result<Vec<Application>, RepositoryError>;
    fn applications_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<Application>, RepositoryError>;

    fn interest(&self, id: &InterestId) -> Result<Option<InterestEvent>, RepositoryError>;
    fn open_interest(&self, key: &DisclosureKey)
        -> Result<Option<InterestEvent>, RepositoryError>;
    fn interests_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<InterestEvent>, RepositoryError>;

    fn consent(&self, key: &DisclosureKey) -> Result<Option<ConsentRecord>, RepositoryError>;

    fn active_hire(&self, candidate: &CandidateId) -> Result<Option<HireRecord>, RepositoryError>;
    fn hires_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<HireRecord>, RepositoryError>;

    /// Most recent `hired_at` across the candidate's hires, active or not. Sits on the disclosure
    /// hot path; stores should answer it from an index.
    fn latest_hire_at(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .hires_for_candidate(candidate)?
            .iter()
            .map(|hire| hire.hired_at)
            .max())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError>;
}

/// A single guarded write. Each variant names the condition the store checks before applying it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Fails when the id or handle is already taken.
    InsertCandidate(CandidateRecord),
    /// Compare-and-swap on the candidate revision.
    UpdateCandidate {
        record: CandidateRecord,
        expected_revision: u64,
    },
    /// Write-free guard: the candidate must still be in the matching pool at commit time.
    RequireActiveCandidate { candidate_id: CandidateId },
    InsertCompany(Company),
    /// Requires the owning company to exist.
    InsertJob(Job),
    SetJobStatus {
        job_id: JobId,
        expected: JobStatus,
        status: JobStatus,
    },
    /// Write-free guard on the job status.
    RequireJobStatus { job_id: JobId, expected: JobStatus },
    /// Unique per (candidate, job); history must end at `stage`.
    InsertApplication(Application),
    /// Append-only; `expected_version` must equal the stored history length.
    AppendStage {
        application_id: ApplicationId,
        expected_version: usize,
        entry: StageEntry,
    },
    TouchApplication {
        application_id: ApplicationId,
        at: DateTime<Utc>,
    },
    /// At most one open event per (candidate, company, job).
    InsertInterest(InterestEvent),
    /// Only an open event can be resolved, and only to a terminal status.
    ResolveInterest {
        interest_id: InterestId,
        status: InterestStatus,
        at: DateTime<Utc>,
    },
    /// Flips disclosure to true; an existing grant keeps its original timestamp.
    GrantConsent {
        key: DisclosureKey,
        at: DateTime<Utc>,
    },
    /// At most one active hire per candidate.
    InsertHire(HireRecord),
    DeactivateHire {
        hire_id: HireId,
        at: DateTime<Utc>,
    },
}

/// Ordered set of mutations committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

impl From<Vec<Mutation>> for WriteBatch {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }
}

/// Store-enforced invariant that refused a mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Constraint {
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("an application already exists for this candidate and job")]
    DuplicateApplication { existing: ApplicationId },
    #[error("application history does not end at its current stage")]
    HistoryMismatch,
    #[error("illegal stage history: {0}")]
    IllegalHistory(HistoryViolation),
    #[error("stage history moved on (expected version {expected}, found {actual})")]
    StaleHistory { expected: usize, actual: usize },
    #[error("candidate revision moved on (expected {expected}, found {actual})")]
    StaleRevision { expected: u64, actual: u64 },
    #[error("candidate is suspended after a hire")]
    CandidateSuspended,
    #[error("job status is {actual}, expected {expected}")]
    StaleJobStatus {
        expected: JobStatus,
        actual: JobStatus,
    },
    #[error("an open interest already exists ({existing})")]
    OpenInterestExists { existing: InterestId },
    #[error("interest was already resolved as {status:?}")]
    InterestResolved { status: InterestStatus },
    #[error("interest cannot be resolved to an open status")]
    InterestStillOpen,
    #[error("candidate already holds active hire {existing}")]
    ActiveHireExists { existing: HireId },
    #[error("hire record is not active")]
    HireInactive,
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("constraint violated: {0}")]
    Constraint(#[from] Constraint),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Outbound hook for the notification collaborator (e-mail, in-app inbox).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: MatchingNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NoticeRecipient {
    Company(CompanyId),
    Candidate(CandidateId),
}

/// Payload handed to the notification collaborator. Company-bound notices carry the anonymous
/// handle only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingNotice {
    pub template: String,
    pub recipient: NoticeRecipient,
    pub details: BTreeMap<String, String>,
}

impl MatchingNotice {
    pub fn new(template: &str, recipient: NoticeRecipient) -> Self {
        Self {
            template: template.to_string(),
            recipient,
            details: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Hand notices over after a transition committed. Failures are logged and dropped.
pub(crate) fn dispatch<N>(publisher: &N, notices: Vec<MatchingNotice>)
where
    N: NotificationPublisher + ?Sized,
{
    for notice in notices {
        let template = notice.template.clone();
        if let Err(err) = publisher.publish(notice) {
            warn!(
                target: "blind_hire::matching",
                %template,
                error = %err,
                "notice delivery failed"
            );
        }
    }
}
