//! Anonymized candidate matching: identity vault, competency ledger, disclosure gate, and the
//! interest, pipeline, and hire workflows that sit on top of them.
//!
//! Every state change is a single [`WriteBatch`] committed through [`MatchingStore::commit`].
//! The store evaluates each mutation's guard inside the commit, so concurrent requests that race
//! on the same application, interest, or candidate either all land or leave nothing behind.

pub mod competency;
pub mod disclosure;
pub mod domain;
pub mod error;
pub mod hire;
pub mod interest;
pub mod jobs;
pub mod memory;
pub mod pipeline;
pub mod repository;
pub mod router;
pub mod service;
pub mod stage;
pub mod vault;

#[cfg(test)]
mod tests;

pub use competency::{CompetencyLedger, CompetencySummary};
pub use disclosure::{DisclosureGate, DisclosurePolicy};
pub use domain::{
    AnonymousHandle, Application, ApplicationId, CandidateId, Company, CompanyId, Competency,
    ConsentRecord, DisclosureKey, DocumentRef, HireId, HireRecord, IdentityProfile,
    InterestEvent, InterestId, InterestStatus, Job, JobId, JobStatus, Principal, StageActor,
    StageEntry, Visibility,
};
pub use error::{ErrorCategory, MatchingError, ValidationError};
pub use hire::HireLockController;
pub use interest::{InterestInboxEntry, InterestResolution, InterestWorkflow};
pub use jobs::{CompanyRegistration, JobBoard};
pub use memory::InMemoryMatchingStore;
pub use pipeline::{CandidateApplicationView, PipelineMachine};
pub use repository::{
    Constraint, MatchingNotice, MatchingStore, Mutation, NoticeRecipient, NotificationError,
    NotificationPublisher, RepositoryError, WriteBatch,
};
pub use router::{error_response, matching_router, operator_caller, OPERATOR_HEADER};
pub use service::{ApplicationSummary, MatchingService};
pub use stage::{HistoryViolation, PipelineStage, StageMove, TransitionError};
pub use vault::{
    AnonymousCandidate, CandidateRegistration, CandidateView, DisclosedCandidate, IdentityVault,
    RegisteredCandidate,
};
