use super::domain::{ApplicationId, InterestId, JobId, JobStatus};
use super::repository::{Constraint, RepositoryError};
use super::stage::{PipelineStage, TransitionError};

/// Input rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("candidate name must not be empty")]
    EmptyName,
    #[error("'{0}' is not a usable e-mail address")]
    InvalidEmail(String),
    #[error("skill name must not be empty")]
    EmptySkill,
    #[error("declared level for {skill} must be between 1 and 5, got {level}")]
    LevelOutOfRange { skill: String, level: u8 },
    #[error("verified score for {skill} must be between 0 and 100, got {score}")]
    ScoreOutOfRange { skill: String, score: u8 },
    #[error("no declared competency for {skill}; declare a level before recording scores")]
    UndeclaredSkill { skill: String },
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },
}

/// Coarse grouping used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Unavailable,
}

/// Error raised by the matching workflow.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("job {job} is {status} and does not accept interest or applications")]
    InvalidJobState { job: JobId, status: JobStatus },
    #[error("job {job} cannot move from {from} to {to}")]
    InvalidJobTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("an open interest already exists for this candidate and job ({existing})")]
    DuplicateInterest { existing: InterestId },
    #[error("interest {0} has already been resolved")]
    AlreadyResolved(InterestId),
    #[error("application {application} is at {actual}, not {expected}")]
    StaleStage {
        application: ApplicationId,
        expected: PipelineStage,
        actual: PipelineStage,
    },
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("hire refused: {0}")]
    HireConflict(String),
    #[error("candidate has no active hire to reactivate")]
    NoActiveHire,
    #[error("record changed concurrently: {0}")]
    ConcurrentUpdate(Constraint),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("caller may not {action}")]
    Forbidden { action: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MatchingError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(action: &'static str) -> Self {
        Self::Forbidden { action }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MatchingError::Validation(_)
            | MatchingError::InvalidJobState { .. }
            | MatchingError::InvalidJobTransition { .. }
            | MatchingError::InvalidTransition(_)
            | MatchingError::NoActiveHire => ErrorCategory::Validation,
            MatchingError::DuplicateInterest { .. }
            | MatchingError::AlreadyResolved(_)
            | MatchingError::StaleStage { .. }
            | MatchingError::HireConflict(_)
            | MatchingError::ConcurrentUpdate(_) => ErrorCategory::Conflict,
            MatchingError::NotFound { .. } => ErrorCategory::NotFound,
            MatchingError::Forbidden { .. } => ErrorCategory::Forbidden,
            MatchingError::Repository(RepositoryError::Constraint(_)) => ErrorCategory::Conflict,
            MatchingError::Repository(RepositoryError::NotFound { .. }) => ErrorCategory::NotFound,
            MatchingError::Repository(RepositoryError::Unavailable(_)) => {
                ErrorCategory::Unavailable
            }
        }
    }

    /// Stable machine-readable name surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            MatchingError::Validation(_) => "ValidationError",
            MatchingError::InvalidJobState { .. } => "InvalidJobStateError",
            MatchingError::InvalidJobTransition { .. } => "InvalidJobTransitionError",
            MatchingError::DuplicateInterest { .. } => "DuplicateInterestError",
            MatchingError::AlreadyResolved(_) => "AlreadyResolvedError",
            MatchingError::StaleStage { .. } => "StaleStageError",
            MatchingError::InvalidTransition(_) => "InvalidTransitionError",
            MatchingError::HireConflict(_) => "ConflictError",
            MatchingError::NoActiveHire => "NoActiveHireError",
            MatchingError::ConcurrentUpdate(_) => "ConcurrentUpdateError",
            MatchingError::NotFound { .. } => "NotFoundError",
            MatchingError::Forbidden { .. } => "ForbiddenError",
            MatchingError::Repository(RepositoryError::Constraint(_)) => "ConflictError",
            MatchingError::Repository(RepositoryError::NotFound { .. }) => "NotFoundError",
            MatchingError::Repository(RepositoryError::Unavailable(_)) => "StoreUnavailableError",
        }
    }
}
