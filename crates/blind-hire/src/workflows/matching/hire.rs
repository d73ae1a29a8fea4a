use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    ApplicationId, CandidateId, CompanyId, HireId, HireRecord, InterestStatus, JobId, StageActor,
    StageEntry, Visibility,
};
use super::error::MatchingError;
use super::repository::{
    dispatch, Constraint, MatchingNotice, MatchingStore, Mutation, NoticeRecipient,
    NotificationPublisher, RepositoryError, WriteBatch,
};
use super::stage::PipelineStage;

/// Enforces one active hire per candidate and the suspend/reactivate lifecycle around it.
pub struct HireLockController<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
}

impl<S, N> HireLockController<S, N>
where
    S: MatchingStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self { store, notices }
    }

    /// Hire through an application id, as exposed over HTTP.
    pub fn hire_application(
        &self,
        company: &CompanyId,
        application_id: &ApplicationId,
    ) -> Result<HireRecord, MatchingError> {
        let application = self
            .store
            .application(application_id)?
            .ok_or_else(|| MatchingError::not_found("application", application_id))?;
        self.mark_hired(&application.candidate_id, &application.job_id, company)
    }

    /// Hire `candidate` for `job`.
    ///
    /// Everything happens in one batch: the hire record (guarded by the store's one-active-hire
    /// constraint), the `hired` stage, profile suspension, superseding every other open
    /// application and every open interest. Preconditions are checked first and re-checked by the
    /// store's guards at commit, so a concurrent hire for the same candidate loses with
    /// `HireConflict` and leaves nothing behind.
    pub fn mark_hired(
        &self,
        candidate: &CandidateId,
        job: &JobId,
        company: &CompanyId,
    ) -> Result<HireRecord, MatchingError> {
        let application = self
            .store
            .application_for(candidate, job)?
            .ok_or_else(|| MatchingError::not_found("application", job))?;
        if &application.company_id != company {
            return Err(MatchingError::forbidden("hire for another company's job"));
        }
        if application.stage != PipelineStage::Finalist {
            return Err(MatchingError::HireConflict(format!(
                "application {} is {}, hires require finalist",
                application.id, application.stage
            )));
        }
        if let Some(existing) = self.store.active_hire(candidate)? {
            return Err(MatchingError::HireConflict(format!(
                "candidate already holds active hire {} for job {}",
                existing.id, existing.job_id
            )));
        }

        let mut record = self
            .store
            .candidate(candidate)?
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))?;
        let expected_revision = record.revision;
        record.visibility = Visibility::Suspended;

        let now = Utc::now();
        let hire = HireRecord {
            id: HireId::generate(),
            candidate_id: candidate.clone(),
            job_id: job.clone(),
            company_id: company.clone(),
            hired_at: now,
            active: true,
            deactivated_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertHire(hire.clone()));
        batch.push(Mutation::AppendStage {
            application_id: application.id.clone(),
            expected_version: application.version(),
            entry: StageEntry {
                stage: PipelineStage::Hired,
                actor: StageActor::Company(company.clone()),
                at: now,
            },
        });
        batch.push(Mutation::UpdateCandidate {
            record,
            expected_revision,
        });

        let mut notices = vec![MatchingNotice::new(
            "candidate_hired",
            NoticeRecipient::Candidate(candidate.clone()),
        )
        .with("hire_id", &hire.id)
        .with("job_id", job)];

        for other in self.store.applications_for_candidate(candidate)? {
            if other.id == application.id || other.stage.is_terminal() {
                continue;
            }
            batch.push(Mutation::AppendStage {
                application_id: other.id.clone(),
                expected_version: other.version(),
                entry: StageEntry {
                    stage: PipelineStage::ClosedSuperseded,
                    actor: StageActor::System,
                    at: now,
                },
            });
            notices.push(
                MatchingNotice::new(
                    "application_superseded",
                    NoticeRecipient::Company(other.company_id.clone()),
                )
                .with("application_id", &other.id)
                .with("job_id", &other.job_id),
            );
        }

        for event in self.store.interests_for_candidate(candidate)? {
            if event.status.is_open() {
                batch.push(Mutation::ResolveInterest {
                    interest_id: event.id,
                    status: InterestStatus::RejectedSuperseded,
                    at: now,
                });
            }
        }

        let mutations = batch.len();
        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(constraint) => {
                warn!(
                    target: "blind_hire::matching",
                    candidate = %candidate,
                    job = %job,
                    %constraint,
                    "hire lost a race"
                );
                MatchingError::HireConflict(constraint.to_string())
            }
            other => other.into(),
        })?;

        info!(
            target: "blind_hire::matching",
            hire = %hire.id,
            job = %job,
            company = %company,
            mutations,
            "candidate hired"
        );
        dispatch(self.notices.as_ref(), notices);
        Ok(hire)
    }

    /// Candidate-initiated return to the matching pool. The hire record is kept as history and
    /// superseded pipelines stay closed.
    pub fn reactivate(&self, candidate: &CandidateId) -> Result<HireRecord, MatchingError> {
        let mut hire = self
            .store
            .active_hire(candidate)?
            .ok_or(MatchingError::NoActiveHire)?;
        let mut record = self
            .store
            .candidate(candidate)?
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))?;
        let expected_revision = record.revision;
        record.visibility = Visibility::Active;

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeactivateHire {
            hire_id: hire.id.clone(),
            at: now,
        });
        batch.push(Mutation::UpdateCandidate {
            record,
            expected_revision,
        });
        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(Constraint::HireInactive) => MatchingError::NoActiveHire,
            RepositoryError::Constraint(constraint) => MatchingError::ConcurrentUpdate(constraint),
            other => other.into(),
        })?;

        info!(
            target: "blind_hire::matching",
            hire = %hire.id,
            candidate = %candidate,
            "candidate reactivated"
        );
        dispatch(
            self.notices.as_ref(),
            vec![MatchingNotice::new(
                "candidate_reactivated",
                NoticeRecipient::Candidate(candidate.clone()),
            )
            .with("hire_id", &hire.id)],
        );

        hire.active = false;
        hire.deactivated_at = Some(now);
        Ok(hire)
    }

    pub fn hire_history(&self, candidate: &CandidateId) -> Result<Vec<HireRecord>, MatchingError> {
        let mut hires = self.store.hires_for_candidate(candidate)?;
        hires.sort_by(|a, b| a.hired_at.cmp(&b.hired_at));
        Ok(hires)
    }
}
