use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Company, CompanyId, Job, JobId, JobStatus};
use super::error::{MatchingError, ValidationError};
use super::repository::{Constraint, MatchingStore, Mutation, RepositoryError, WriteBatch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRegistration {
    pub legal_name: String,
    pub trade_name: String,
    pub sector: String,
}

/// Minimal company and job registry; just enough lifecycle for the matching rules to read.
pub struct JobBoard<S> {
    store: Arc<S>,
}

impl<S> JobBoard<S>
where
    S: MatchingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register_company(
        &self,
        registration: CompanyRegistration,
    ) -> Result<Company, MatchingError> {
        let legal_name = required(&registration.legal_name, "legal_name")?;
        let trade_name = match registration.trade_name.trim() {
            "" => legal_name.clone(),
            trade => trade.to_string(),
        };
        let company = Company {
            id: CompanyId::generate(),
            legal_name,
            trade_name,
            sector: registration.sector.trim().to_string(),
        };

        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertCompany(company.clone()));
        self.store.commit(batch)?;
        Ok(company)
    }

    /// New postings start as drafts.
    pub fn post_job(&self, company: &CompanyId, title: &str) -> Result<Job, MatchingError> {
        let title = required(title, "title")?;
        if self.store.company(company)?.is_none() {
            return Err(MatchingError::not_found("company", company));
        }
        let job = Job {
            id: JobId::generate(),
            company_id: company.clone(),
            title,
            status: JobStatus::Draft,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertJob(job.clone()));
        self.store.commit(batch)?;
        Ok(job)
    }

    pub fn open_job(&self, company: &CompanyId, job: &JobId) -> Result<Job, MatchingError> {
        self.set_status(company, job, JobStatus::Open)
    }

    pub fn close_job(&self, company: &CompanyId, job: &JobId) -> Result<Job, MatchingError> {
        self.set_status(company, job, JobStatus::Closed)
    }

    /// Load a job and check it belongs to `company`.
    pub fn owned_job(&self, company: &CompanyId, job: &JobId) -> Result<Job, MatchingError> {
        let job = self
            .store
            .job(job)?
            .ok_or_else(|| MatchingError::not_found("job", job))?;
        if &job.company_id != company {
            return Err(MatchingError::forbidden("manage another company's job"));
        }
        Ok(job)
    }

    fn set_status(
        &self,
        company: &CompanyId,
        job_id: &JobId,
        status: JobStatus,
    ) -> Result<Job, MatchingError> {
        let mut job = self.owned_job(company, job_id)?;
        if !job.status.can_become(status) {
            return Err(MatchingError::InvalidJobTransition {
                job: job.id,
                from: job.status,
                to: status,
            });
        }

        let mut batch = WriteBatch::new();
        batch.push(Mutation::SetJobStatus {
            job_id: job.id.clone(),
            expected: job.status,
            status,
        });
        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(constraint @ Constraint::StaleJobStatus { .. }) => {
                MatchingError::ConcurrentUpdate(constraint)
            }
            other => other.into(),
        })?;

        info!(
            target: "blind_hire::matching",
            job = %job.id,
            from = job.status.label(),
            to = status.label(),
            "job status changed"
        );
        job.status = status;
        Ok(job)
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}
