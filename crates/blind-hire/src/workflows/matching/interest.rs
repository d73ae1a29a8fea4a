use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Application, CandidateId, CompanyId, DisclosureKey, InterestEvent, InterestId,
    InterestStatus, JobId, JobStatus, StageActor, StageEntry,
};
use super::error::MatchingError;
use super::repository::{
    dispatch, Constraint, MatchingNotice, MatchingStore, Mutation, NoticeRecipient,
    NotificationPublisher, RepositoryError, WriteBatch,
};
use super::stage::{after_acceptance, after_decline, PipelineStage, TransitionError};

/// Result of a candidate decision on an interest event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestResolution {
    pub interest: InterestEvent,
    pub consent: bool,
    pub stage: PipelineStage,
}

/// Pending request as it appears in the candidate's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestInboxEntry {
    pub interest_id: InterestId,
    pub job_id: JobId,
    pub job_title: String,
    pub company: String,
    pub created_at: DateTime<Utc>,
}

/// Company interest and candidate consent. The only writer of consent records.
pub struct InterestWorkflow<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
}

impl<S, N> InterestWorkflow<S, N>
where
    S: MatchingStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self { store, notices }
    }

    /// `none -> interest_expressed`. Opens the application at `pending` when the candidate never
    /// applied to this job.
    pub fn express(
        &self,
        company: &CompanyId,
        candidate: &CandidateId,
        job_id: &JobId,
    ) -> Result<InterestEvent, MatchingError> {
        let job = self
            .store
            .job(job_id)?
            .ok_or_else(|| MatchingError::not_found("job", job_id))?;
        if &job.company_id != company {
            return Err(MatchingError::forbidden(
                "express interest for another company's job",
            ));
        }
        if job.status != JobStatus::Open {
            return Err(MatchingError::InvalidJobState {
                job: job.id,
                status: job.status,
            });
        }

        let record = self
            .store
            .candidate(candidate)?
            .filter(|record| record.is_active())
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))?;

        let key = DisclosureKey {
            candidate_id: record.id.clone(),
            company_id: company.clone(),
            job_id: job.id.clone(),
        };
        if let Some(existing) = self.store.open_interest(&key)? {
            return Err(MatchingError::DuplicateInterest {
                existing: existing.id,
            });
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::RequireJobStatus {
            job_id: job.id.clone(),
            expected: JobStatus::Open,
        });
        batch.push(Mutation::RequireActiveCandidate {
            candidate_id: record.id.clone(),
        });
        match self.store.application_for(&record.id, &job.id)? {
            Some(application) if application.stage.is_terminal() => {
                return Err(TransitionError {
                    from: application.stage,
                    to: PipelineStage::Interview,
                }
                .into());
            }
            Some(_) => {}
            None => {
                let actor = StageActor::Company(company.clone());
                batch.push(Mutation::InsertApplication(Application::open(
                    record.id.clone(),
                    &job,
                    actor,
                    now,
                )));
            }
        }

        let event = InterestEvent::open(key, now);
        batch.push(Mutation::InsertInterest(event.clone()));
        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(Constraint::OpenInterestExists { existing }) => {
                MatchingError::DuplicateInterest { existing }
            }
            RepositoryError::Constraint(Constraint::StaleJobStatus { actual, .. }) => {
                MatchingError::InvalidJobState {
                    job: job.id.clone(),
                    status: actual,
                }
            }
            RepositoryError::Constraint(Constraint::CandidateSuspended) => {
                MatchingError::not_found("candidate", &record.id)
            }
            RepositoryError::Constraint(
                constraint @ Constraint::DuplicateApplication { .. },
            ) => MatchingError::ConcurrentUpdate(constraint),
            other => other.into(),
        })?;

        info!(
            target: "blind_hire::matching",
            interest = %event.id,
            company = %company,
            job = %job.id,
            "interest expressed"
        );
        dispatch(
            self.notices.as_ref(),
            vec![
                MatchingNotice::new("interest_expressed", NoticeRecipient::Candidate(record.id))
                    .with("interest_id", &event.id)
                    .with("job_id", &job.id)
                    .with("job_title", &job.title),
            ],
        );
        Ok(event)
    }

    /// `interest_expressed -> accepted`: grants disclosure and moves the application to
    /// `interview`.
    pub fn accept(
        &self,
        candidate: &CandidateId,
        interest_id: &InterestId,
    ) -> Result<InterestResolution, MatchingError> {
        self.resolve(candidate, interest_id, InterestStatus::Accepted)
    }

    /// `interest_expressed -> rejected`: no disclosure, application closed as `rejected`.
    pub fn reject(
        &self,
        candidate: &CandidateId,
        interest_id: &InterestId,
    ) -> Result<InterestResolution, MatchingError> {
        self.resolve(candidate, interest_id, InterestStatus::Rejected)
    }

    pub fn inbox(&self, candidate: &CandidateId) -> Result<Vec<InterestInboxEntry>, MatchingError> {
        let mut entries = Vec::new();
        for event in self.store.interests_for_candidate(candidate)? {
            if !event.status.is_open() {
                continue;
            }
            let job_title = self
                .store
                .job(&event.job_id)?
                .map(|job| job.title)
                .unwrap_or_default();
            let company = self
                .store
                .company(&event.company_id)?
                .map(|company| company.trade_name)
                .unwrap_or_default();
            entries.push(InterestInboxEntry {
                interest_id: event.id,
                job_id: event.job_id,
                job_title,
                company,
                created_at: event.created_at,
            });
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    fn resolve(
        &self,
        candidate: &CandidateId,
        interest_id: &InterestId,
        outcome: InterestStatus,
    ) -> Result<InterestResolution, MatchingError> {
        let mut event = self
            .store
            .interest(interest_id)?
            .ok_or_else(|| MatchingError::not_found("interest", interest_id))?;
        if &event.candidate_id != candidate {
            return Err(MatchingError::forbidden("resolve another candidate's interest"));
        }
        if !event.status.is_open() {
            return Err(MatchingError::AlreadyResolved(event.id));
        }

        let application = self
            .store
            .application_for(&event.candidate_id, &event.job_id)?
            .ok_or_else(|| MatchingError::not_found("application", &event.job_id))?;
        let handle = self
            .store
            .candidate(candidate)?
            .map(|record| record.handle)
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))?;

        let accepted = outcome == InterestStatus::Accepted;
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::ResolveInterest {
            interest_id: event.id.clone(),
            status: outcome,
            at: now,
        });
        if accepted {
            batch.push(Mutation::RequireActiveCandidate {
                candidate_id: candidate.clone(),
            });
            batch.push(Mutation::GrantConsent {
                key: event.key(),
                at: now,
            });
        }

        let next_stage = if accepted {
            after_acceptance(application.stage)
        } else {
            after_decline(application.stage)
        };
        if let Some(stage) = next_stage {
            batch.push(Mutation::AppendStage {
                application_id: application.id.clone(),
                expected_version: application.version(),
                entry: StageEntry {
                    stage,
                    actor: StageActor::Candidate(candidate.clone()),
                    at: now,
                },
            });
        }

        if let Err(err) = self.store.commit(batch) {
            return Err(match err {
                RepositoryError::Constraint(Constraint::InterestResolved { .. }) => {
                    MatchingError::AlreadyResolved(event.id)
                }
                RepositoryError::Constraint(Constraint::CandidateSuspended) => {
                    MatchingError::HireConflict(
                        "profile is suspended after a hire; consent cannot be granted"
                            .to_string(),
                    )
                }
                RepositoryError::Constraint(Constraint::StaleHistory { .. }) => {
                    let actual = self
                        .store
                        .application(&application.id)?
                        .map(|current| current.stage)
                        .unwrap_or(application.stage);
                    MatchingError::StaleStage {
                        application: application.id,
                        expected: application.stage,
                        actual,
                    }
                }
                other => other.into(),
            });
        }

        event.status = outcome;
        event.resolved_at = Some(now);
        let stage = next_stage.unwrap_or(application.stage);

        info!(
            target: "blind_hire::matching",
            interest = %event.id,
            outcome = outcome.label(),
            stage = stage.label(),
            "interest resolved"
        );
        dispatch(
            self.notices.as_ref(),
            vec![MatchingNotice::new(
                if accepted {
                    "interest_accepted"
                } else {
                    "interest_rejected"
                },
                NoticeRecipient::Company(event.company_id.clone()),
            )
            .with("interest_id", &event.id)
            .with("application_id", &application.id)
            .with("candidate_handle", &handle)],
        );

        Ok(InterestResolution {
            interest: event,
            consent: accepted,
            stage,
        })
    }
}
