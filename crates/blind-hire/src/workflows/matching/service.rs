use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::competency::{CompetencyLedger, CompetencySummary};
use super::disclosure::DisclosureGate;
use super::domain::{AnonymousHandle, ApplicationId, CompanyId, InterestEvent, JobId};
use super::error::MatchingError;
use super::hire::HireLockController;
use super::interest::InterestWorkflow;
use super::jobs::JobBoard;
use super::pipeline::PipelineMachine;
use super::repository::{MatchingStore, NotificationPublisher};
use super::stage::PipelineStage;
use super::vault::{AnonymousCandidate, CandidateView, IdentityVault};
use crate::config::MatchingConfig;

/// Row of a company's per-job pipeline listing. The candidate block went through the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub stage: PipelineStage,
    pub candidate: CandidateView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Service composing the vault, ledger, gate, and the three workflows over one store.
pub struct MatchingService<S, N> {
    store: Arc<S>,
    gate: Arc<DisclosureGate<S>>,
    vault: IdentityVault<S, DisclosureGate<S>>,
    ledger: CompetencyLedger<S>,
    interest: InterestWorkflow<S, N>,
    pipeline: PipelineMachine<S>,
    hires: HireLockController<S, N>,
    jobs: JobBoard<S>,
    config: MatchingConfig,
}

impl<S, N> MatchingService<S, N>
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notices: Arc<N>, config: MatchingConfig) -> Self {
        let gate = Arc::new(DisclosureGate::new(store.clone()));

        Self {
            vault: IdentityVault::new(store.clone(), gate.clone()),
            ledger: CompetencyLedger::new(store.clone()),
            interest: InterestWorkflow::new(store.clone(), notices.clone()),
            pipeline: PipelineMachine::new(store.clone()),
            hires: HireLockController::new(store.clone(), notices),
            jobs: JobBoard::new(store.clone()),
            gate,
            store,
            config,
        }
    }

    pub fn vault(&self) -> &IdentityVault<S, DisclosureGate<S>> {
        &self.vault
    }

    pub fn gate(&self) -> &DisclosureGate<S> {
        &self.gate
    }

    pub fn ledger(&self) -> &CompetencyLedger<S> {
        &self.ledger
    }

    pub fn interest(&self) -> &InterestWorkflow<S, N> {
        &self.interest
    }

    pub fn pipeline(&self) -> &PipelineMachine<S> {
        &self.pipeline
    }

    pub fn hires(&self) -> &HireLockController<S, N> {
        &self.hires
    }

    pub fn jobs(&self) -> &JobBoard<S> {
        &self.jobs
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Company-facing interest, addressed by the handle the company saw while browsing.
    pub fn express_interest(
        &self,
        company: &CompanyId,
        handle: &AnonymousHandle,
        job: &JobId,
    ) -> Result<InterestEvent, MatchingError> {
        let candidate = self.vault.active_candidate(handle)?;
        self.interest.express(company, &candidate.id, job)
    }

    /// Every application on `job`, oldest first, each candidate resolved through the gate.
    pub fn applications_for_job(
        &self,
        company: &CompanyId,
        job: &JobId,
    ) -> Result<Vec<ApplicationSummary>, MatchingError> {
        let job = self.jobs.owned_job(company, job)?;
        let mut applications = self.store.applications_for_job(&job.id)?;
        applications.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        applications
            .into_iter()
            .map(|application| {
                let candidate = self
                    .vault
                    .resolve(&application.candidate_id, company, &job.id)?;
                Ok(ApplicationSummary {
                    application_id: application.id,
                    job_id: application.job_id,
                    stage: application.stage,
                    candidate,
                    created_at: application.created_at,
                    updated_at: application.updated_at,
                })
            })
            .collect()
    }

    /// Anonymized pool listing. `limit` is capped by the configured browse limit.
    pub fn browse(&self, limit: Option<usize>) -> Result<Vec<AnonymousCandidate>, MatchingError> {
        let cap = self.config.browse_limit;
        let limit = limit.map_or(cap, |requested| requested.min(cap));
        self.vault.browse(limit)
    }

    pub fn resolve_candidate(
        &self,
        company: &CompanyId,
        handle: &AnonymousHandle,
        job: &JobId,
    ) -> Result<CandidateView, MatchingError> {
        self.vault.resolve_handle(handle, company, job)
    }

    /// Record an externally administered score against the candidate behind `handle`.
    pub fn record_verified_score(
        &self,
        handle: &AnonymousHandle,
        skill: &str,
        score: u8,
        assessed_at: DateTime<Utc>,
    ) -> Result<CompetencySummary, MatchingError> {
        let candidate = self
            .store
            .candidate_by_handle(handle)?
            .ok_or_else(|| MatchingError::not_found("candidate", handle))?;
        self.ledger
            .record_verified_score(&candidate.id, skill, score, assessed_at)
    }
}
