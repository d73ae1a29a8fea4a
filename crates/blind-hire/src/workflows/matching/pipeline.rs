use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Application, ApplicationId, CandidateId, CompanyId, JobId, JobStatus, Principal, StageActor,
    StageEntry,
};
use super::error::MatchingError;
use super::repository::{Constraint, MatchingStore, Mutation, RepositoryError, WriteBatch};
use super::stage::{company_move, PipelineStage, StageMove};

/// Candidate's own view of one of their pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateApplicationView {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub job_title: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Per-application stage machine. Companies drive it; candidates enter it by applying.
pub struct PipelineMachine<S> {
    store: Arc<S>,
}

impl<S> PipelineMachine<S>
where
    S: MatchingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Candidate self-application. Applying again to the same job refreshes the existing
    /// application instead of creating a second one.
    pub fn apply(
        &self,
        candidate: &CandidateId,
        job_id: &JobId,
    ) -> Result<Application, MatchingError> {
        let record = self
            .store
            .candidate(candidate)?
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))?;
        if !record.is_active() {
            return Err(MatchingError::HireConflict(
                "profile is suspended after a hire; reactivate before applying".to_string(),
            ));
        }

        let job = self
            .store
            .job(job_id)?
            .ok_or_else(|| MatchingError::not_found("job", job_id))?;
        if job.status != JobStatus::Open {
            return Err(MatchingError::InvalidJobState {
                job: job.id,
                status: job.status,
            });
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::RequireJobStatus {
            job_id: job.id.clone(),
            expected: JobStatus::Open,
        });
        batch.push(Mutation::RequireActiveCandidate {
            candidate_id: candidate.clone(),
        });
        let application = match self.store.application_for(candidate, job_id)? {
            Some(mut existing) => {
                batch.push(Mutation::TouchApplication {
                    application_id: existing.id.clone(),
                    at: now,
                });
                existing.updated_at = now;
                existing
            }
            None => {
                let actor = StageActor::Candidate(candidate.clone());
                let application = Application::open(candidate.clone(), &job, actor, now);
                batch.push(Mutation::InsertApplication(application.clone()));
                application
            }
        };

        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(constraint @ Constraint::DuplicateApplication { .. }) => {
                MatchingError::ConcurrentUpdate(constraint)
            }
            RepositoryError::Constraint(Constraint::StaleJobStatus { actual, .. }) => {
                MatchingError::InvalidJobState {
                    job: job.id.clone(),
                    status: actual,
                }
            }
            RepositoryError::Constraint(Constraint::CandidateSuspended) => {
                MatchingError::HireConflict(
                    "profile is suspended after a hire; reactivate before applying".to_string(),
                )
            }
            other => other.into(),
        })?;
        Ok(application)
    }

    /// Company-driven stage change with optimistic concurrency on `expected`.
    pub fn move_stage(
        &self,
        company: &CompanyId,
        application_id: &ApplicationId,
        expected: PipelineStage,
        target: PipelineStage,
    ) -> Result<Application, MatchingError> {
        let mut application = self.load(application_id)?;
        if &application.company_id != company {
            return Err(MatchingError::forbidden("move another company's application"));
        }
        if application.stage != expected {
            return Err(MatchingError::StaleStage {
                application: application.id,
                expected,
                actual: application.stage,
            });
        }

        let stage = match company_move(application.stage, target)? {
            StageMove::Unchanged => return Ok(application),
            StageMove::Advance(stage) => stage,
        };

        let entry = StageEntry {
            stage,
            actor: StageActor::Company(company.clone()),
            at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.push(Mutation::AppendStage {
            application_id: application.id.clone(),
            expected_version: application.version(),
            entry: entry.clone(),
        });

        if let Err(err) = self.store.commit(batch) {
            return Err(match err {
                RepositoryError::Constraint(Constraint::StaleHistory { .. }) => {
                    let actual = self.load(application_id)?.stage;
                    MatchingError::StaleStage {
                        application: application.id,
                        expected,
                        actual,
                    }
                }
                other => other.into(),
            });
        }

        info!(
            target: "blind_hire::matching",
            application = %application.id,
            from = application.stage.label(),
            to = stage.label(),
            "application stage moved"
        );
        application.stage = stage;
        application.updated_at = entry.at;
        application.history.push(entry);
        Ok(application)
    }

    pub fn application(&self, id: &ApplicationId) -> Result<Application, MatchingError> {
        self.load(id)
    }

    /// Audit log, visible to the owning company and the candidate. Anyone else sees `NotFound`.
    pub fn history(
        &self,
        viewer: &Principal,
        id: &ApplicationId,
    ) -> Result<Vec<StageEntry>, MatchingError> {
        let application = self.load(id)?;
        let permitted = match viewer {
            Principal::Company(company) => &application.company_id == company,
            Principal::Candidate(candidate) => &application.candidate_id == candidate,
        };
        if !permitted {
            return Err(MatchingError::not_found("application", id));
        }
        Ok(application.history)
    }

    pub fn candidate_applications(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<CandidateApplicationView>, MatchingError> {
        let mut views = Vec::new();
        for application in self.store.applications_for_candidate(candidate)? {
            let job_title = self
                .store
                .job(&application.job_id)?
                .map(|job| job.title)
                .unwrap_or_default();
            views.push(CandidateApplicationView {
                application_id: application.id,
                job_id: application.job_id,
                job_title,
                status: application.stage.candidate_label().to_string(),
                updated_at: application.updated_at,
            });
        }
        views.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(views)
    }

    fn load(&self, id: &ApplicationId) -> Result<Application, MatchingError> {
        self.store
            .application(id)?
            .ok_or_else(|| MatchingError::not_found("application", id))
    }
}
