use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::PipelineStage;

static ENTITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_entity_id(prefix: &str) -> String {
    let id = ENTITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub(crate) fn generate() -> Self {
                Self(next_entity_id($prefix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Internal candidate key. Never shown to companies.
    CandidateId,
    "cand"
);
string_id!(CompanyId, "co");
string_id!(JobId, "job");
string_id!(ApplicationId, "app");
string_id!(InterestId, "int");
string_id!(HireId, "hire");

/// Opaque candidate reference shown to companies before consent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonymousHandle(pub String);

impl AnonymousHandle {
    pub(crate) fn issue() -> Self {
        Self(format!("anon-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnonymousHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Personal fields held by the identity vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// Pointer to a resume or certificate kept by the external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub storage_key: String,
}

/// Self-declared level plus the optional externally verified score for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competency {
    pub declared_level: u8,
    pub verified_score: Option<u8>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Active,
    Suspended,
}

impl Visibility {
    pub const fn label(self) -> &'static str {
        match self {
            Visibility::Active => "active",
            Visibility::Suspended => "suspended",
        }
    }
}

/// Persisted candidate row. The identity block is only reachable from inside the matching
/// module; everything outside works with the handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: CandidateId,
    pub handle: AnonymousHandle,
    pub(super) identity: IdentityProfile,
    pub competencies: BTreeMap<String, Competency>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every committed update.
    pub revision: u64,
}

impl CandidateRecord {
    pub(super) fn new(
        identity: IdentityProfile,
        competencies: BTreeMap<String, Competency>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CandidateId::generate(),
            handle: AnonymousHandle::issue(),
            identity,
            competencies,
            visibility: Visibility::Active,
            created_at,
            revision: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.visibility == Visibility::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub legal_name: String,
    pub trade_name: String,
    pub sector: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Open,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }

    /// Jobs only move forward: draft -> open -> closed, or straight from draft to closed.
    pub const fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Draft, JobStatus::Open)
                | (JobStatus::Draft, JobStatus::Closed)
                | (JobStatus::Open, JobStatus::Closed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub company_id: CompanyId,
    pub title: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Authenticated caller as handed to the core by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    Company(CompanyId),
    Candidate(CandidateId),
}

/// Who caused a stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StageActor {
    Company(CompanyId),
    Candidate(CandidateId),
    /// Cascades triggered by a hire elsewhere.
    System,
}

impl StageActor {
    pub const fn label(&self) -> &'static str {
        match self {
            StageActor::Company(_) => "company",
            StageActor::Candidate(_) => "candidate",
            StageActor::System => "system",
        }
    }
}

/// One immutable line of an application's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: PipelineStage,
    pub actor: StageActor,
    pub at: DateTime<Utc>,
}

/// The (candidate, job) pipeline record. `stage` always equals the last history entry; the
/// store refuses writes that would break that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub stage: PipelineStage,
    pub history: Vec<StageEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub(crate) fn open(
        candidate_id: CandidateId,
        job: &Job,
        actor: StageActor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::generate(),
            candidate_id,
            job_id: job.id.clone(),
            company_id: job.company_id.clone(),
            stage: PipelineStage::Pending,
            history: vec![StageEntry {
                stage: PipelineStage::Pending,
                actor,
                at,
            }],
            created_at: at,
            updated_at: at,
        }
    }

    /// Number of history entries; the optimistic-concurrency token for appends.
    pub fn version(&self) -> usize {
        self.history.len()
    }

    pub fn replayed_stage(&self) -> Option<PipelineStage> {
        super::stage::replay(&self.history)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestStatus {
    Open,
    Accepted,
    Rejected,
    RejectedSuperseded,
}

impl InterestStatus {
    pub const fn is_open(self) -> bool {
        matches!(self, InterestStatus::Open)
    }

    pub const fn label(self) -> &'static str {
        match self {
            InterestStatus::Open => "interest_expressed",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
            InterestStatus::RejectedSuperseded => "rejected_superseded",
        }
    }
}

/// Key for everything decided per (candidate, company, job).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisclosureKey {
    pub candidate_id: CandidateId,
    pub company_id: CompanyId,
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestEvent {
    pub id: InterestId,
    pub company_id: CompanyId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub status: InterestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InterestEvent {
    pub(crate) fn open(key: DisclosureKey, at: DateTime<Utc>) -> Self {
        Self {
            id: InterestId::generate(),
            company_id: key.company_id,
            candidate_id: key.candidate_id,
            job_id: key.job_id,
            status: InterestStatus::Open,
            created_at: at,
            resolved_at: None,
        }
    }

    pub fn key(&self) -> DisclosureKey {
        DisclosureKey {
            candidate_id: self.candidate_id.clone(),
            company_id: self.company_id.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub key: DisclosureKey,
    pub disclosed: bool,
    pub disclosed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireRecord {
    pub id: HireId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub hired_at: DateTime<Utc>,
    pub active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
}
