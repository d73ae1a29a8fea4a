use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::domain::{
    AnonymousHandle, Application, ApplicationId, CandidateId, CandidateRecord, Company, CompanyId,
    ConsentRecord, DisclosureKey, HireId, HireRecord, InterestEvent, InterestId, Job, JobId,
};
use super::repository::{Constraint, MatchingStore, Mutation, RepositoryError, WriteBatch};
use super::stage::{audit, audit_step};

/// Process-local store used by the service binary, the demo, and tests.
///
/// Commits stage every mutation on a copy of the tables and swap the copy in only when the whole
/// batch applied, which gives the same all-or-nothing behaviour as a single database transaction.
#[derive(Default, Clone)]
pub struct InMemoryMatchingStore {
    tables: Arc<RwLock<Tables>>,
    fault: Arc<Mutex<Option<usize>>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    candidates: BTreeMap<CandidateId, CandidateRecord>,
    handles: HashMap<AnonymousHandle, CandidateId>,
    companies: BTreeMap<CompanyId, Company>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    application_index: HashMap<(CandidateId, JobId), ApplicationId>,
    interests: BTreeMap<InterestId, InterestEvent>,
    open_interests: HashMap<DisclosureKey, InterestId>,
    consents: HashMap<DisclosureKey, ConsentRecord>,
    hires: BTreeMap<HireId, HireRecord>,
    hires_by_candidate: HashMap<CandidateId, Vec<HireId>>,
    latest_hire: HashMap<CandidateId, DateTime<Utc>>,
    active_hires: HashMap<CandidateId, HireId>,
}

impl InMemoryMatchingStore {
    /// Make the next commit fail with `Unavailable` when it reaches the mutation at `index`.
    /// Mutations before it will already have been staged, so this exercises rollback.
    pub fn fail_next_commit_at(&self, index: usize) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = Some(index);
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn take_fault(&self) -> Option<usize> {
        self.fault.lock().ok().and_then(|mut fault| fault.take())
    }
}

impl Tables {
    fn apply(&mut self, mutation: Mutation) -> Result<(), RepositoryError> {
        match mutation {
            Mutation::InsertCandidate(record) => {
                if self.candidates.contains_key(&record.id)
                    || self.handles.contains_key(&record.handle)
                {
                    return Err(Constraint::AlreadyExists {
                        entity: "candidate",
                        id: record.id.to_string(),
                    }
                    .into());
                }
                self.handles.insert(record.handle.clone(), record.id.clone());
                self.candidates.insert(record.id.clone(), record);
            }
            Mutation::UpdateCandidate {
                mut record,
                expected_revision,
            } => {
                let current = self
                    .candidates
                    .get(&record.id)
                    .ok_or_else(|| RepositoryError::not_found("candidate", &record.id))?;
                if current.revision != expected_revision {
                    return Err(Constraint::StaleRevision {
                        expected: expected_revision,
                        actual: current.revision,
                    }
                    .into());
                }
                // handles are issued once and never reassigned
                record.handle = current.handle.clone();
                record.revision = expected_revision + 1;
                self.candidates.insert(record.id.clone(), record);
            }
            Mutation::RequireActiveCandidate { candidate_id } => {
                let current = self
                    .candidates
                    .get(&candidate_id)
                    .ok_or_else(|| RepositoryError::not_found("candidate", &candidate_id))?;
                if !current.is_active() {
                    return Err(Constraint::CandidateSuspended.into());
                }
            }
            Mutation::InsertCompany(company) => {
                if self.companies.contains_key(&company.id) {
                    return Err(Constraint::AlreadyExists {
                        entity: "company",
                        id: company.id.to_string(),
                    }
                    .into());
                }
                self.companies.insert(company.id.clone(), company);
            }
            Mutation::InsertJob(job) => {
                if !self.companies.contains_key(&job.company_id) {
                    return Err(RepositoryError::not_found("company", &job.company_id));
                }
                if self.jobs.contains_key(&job.id) {
                    return Err(Constraint::AlreadyExists {
                        entity: "job",
                        id: job.id.to_string(),
                    }
                    .into());
                }
                self.jobs.insert(job.id.clone(), job);
            }
            Mutation::SetJobStatus {
                job_id,
                expected,
                status,
            } => {
                let job = self
                    .jobs
                    .get_mut(&job_id)
                    .ok_or_else(|| RepositoryError::not_found("job", &job_id))?;
                if job.status != expected {
                    return Err(Constraint::StaleJobStatus {
                        expected,
                        actual: job.status,
                    }
                    .into());
                }
                job.status = status;
            }
            Mutation::RequireJobStatus { job_id, expected } => {
                let job = self
                    .jobs
                    .get(&job_id)
                    .ok_or_else(|| RepositoryError::not_found("job", &job_id))?;
                if job.status != expected {
                    return Err(Constraint::StaleJobStatus {
                        expected,
                        actual: job.status,
                    }
                    .into());
                }
            }
            Mutation::InsertApplication(application) => {
                let pair = (
                    application.candidate_id.clone(),
                    application.job_id.clone(),
                );
                if let Some(existing) = self.application_index.get(&pair) {
                    return Err(Constraint::DuplicateApplication {
                        existing: existing.clone(),
                    }
                    .into());
                }
                if self.applications.contains_key(&application.id) {
                    return Err(Constraint::AlreadyExists {
                        entity: "application",
                        id: application.id.to_string(),
                    }
                    .into());
                }
                let audited = audit(&application.history).map_err(Constraint::IllegalHistory)?;
                if audited != application.stage {
                    return Err(Constraint::HistoryMismatch.into());
                }
                self.application_index.insert(pair, application.id.clone());
                self.applications
                    .insert(application.id.clone(), application);
            }
            Mutation::AppendStage {
                application_id,
                expected_version,
                entry,
            } => {
                let application = self
                    .applications
                    .get_mut(&application_id)
                    .ok_or_else(|| RepositoryError::not_found("application", &application_id))?;
                if application.history.len() != expected_version {
                    return Err(Constraint::StaleHistory {
                        expected: expected_version,
                        actual: application.history.len(),
                    }
                    .into());
                }
                audit_step(expected_version, application.stage, entry.stage)
                    .map_err(Constraint::IllegalHistory)?;
                application.stage = entry.stage;
                application.updated_at = entry.at;
                application.history.push(entry);
            }
            Mutation::TouchApplication { application_id, at } => {
                let application = self
                    .applications
                    .get_mut(&application_id)
                    .ok_or_else(|| RepositoryError::not_found("application", &application_id))?;
                application.updated_at = at;
            }
            Mutation::InsertInterest(event) => {
                let key = event.key();
                if let Some(existing) = self.open_interests.get(&key) {
                    return Err(Constraint::OpenInterestExists {
                        existing: existing.clone(),
                    }
                    .into());
                }
                if self.interests.contains_key(&event.id) {
                    return Err(Constraint::AlreadyExists {
                        entity: "interest",
                        id: event.id.to_string(),
                    }
                    .into());
                }
                if event.status.is_open() {
                    self.open_interests.insert(key, event.id.clone());
                }
                self.interests.insert(event.id.clone(), event);
            }
            Mutation::ResolveInterest {
                interest_id,
                status,
                at,
            } => {
                if status.is_open() {
                    return Err(Constraint::InterestStillOpen.into());
                }
                let event = self
                    .interests
                    .get_mut(&interest_id)
                    .ok_or_else(|| RepositoryError::not_found("interest", &interest_id))?;
                if !event.status.is_open() {
                    return Err(Constraint::InterestResolved {
                        status: event.status,
                    }
                    .into());
                }
                event.status = status;
                event.resolved_at = Some(at);
                let key = event.key();
                self.open_interests.remove(&key);
            }
            Mutation::GrantConsent { key, at } => {
                let record = self
                    .consents
                    .entry(key.clone())
                    .or_insert_with(|| ConsentRecord {
                        key,
                        disclosed: false,
                        disclosed_at: None,
                    });
                if !record.disclosed {
                    record.disclosed = true;
                    record.disclosed_at = Some(at);
                }
            }
            Mutation::InsertHire(hire) => {
                if let Some(existing) = self.active_hires.get(&hire.candidate_id) {
                    return Err(Constraint::ActiveHireExists {
                        existing: existing.clone(),
                    }
                    .into());
                }
                if self.hires.contains_key(&hire.id) {
                    return Err(Constraint::AlreadyExists {
                        entity: "hire",
                        id: hire.id.to_string(),
                    }
                    .into());
                }
                if hire.active {
                    self.active_hires
                        .insert(hire.candidate_id.clone(), hire.id.clone());
                }
                self.hires_by_candidate
                    .entry(hire.candidate_id.clone())
                    .or_default()
                    .push(hire.id.clone());
                let latest = self
                    .latest_hire
                    .entry(hire.candidate_id.clone())
                    .or_insert(hire.hired_at);
                if hire.hired_at > *latest {
                    *latest = hire.hired_at;
                }
                self.hires.insert(hire.id.clone(), hire);
            }
            Mutation::DeactivateHire { hire_id, at } => {
                let hire = self
                    .hires
                    .get_mut(&hire_id)
                    .ok_or_else(|| RepositoryError::not_found("hire", &hire_id))?;
                if !hire.active {
                    return Err(Constraint::HireInactive.into());
                }
                hire.active = false;
                hire.deactivated_at = Some(at);
                self.active_hires.remove(&hire.candidate_id);
            }
        }
        Ok(())
    }
}

impl MatchingStore for InMemoryMatchingStore {
    fn candidate(&self, id: &CandidateId) -> Result<Option<CandidateRecord>, RepositoryError> {
        Ok(self.read()?.candidates.get(id).cloned())
    }

    fn candidate_by_handle(
        &self,
        handle: &AnonymousHandle,
    ) -> Result<Option<CandidateRecord>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .handles
            .get(handle)
            .and_then(|id| tables.candidates.get(id))
            .cloned())
    }

    fn candidates(&self) -> Result<Vec<CandidateRecord>, RepositoryError> {
        Ok(self.read()?.candidates.values().cloned().collect())
    }

    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.read()?.companies.get(id).cloned())
    }

    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.read()?.jobs.get(id).cloned())
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.read()?.applications.get(id).cloned())
    }

    fn application_for(
        &self,
        candidate: &CandidateId,
        job: &JobId,
    ) -> Result<Option<Application>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .application_index
            .get(&(candidate.clone(), job.clone()))
            .and_then(|id| tables.applications.get(id))
            .cloned())
    }

    fn applications_for_job(&self, job: &JobId) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .read()?
            .applications
            .values()
            .filter(|application| &application.job_id == job)
            .cloned()
            .collect())
    }

    fn applications_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .read()?
            .applications
            .values()
            .filter(|application| &application.candidate_id == candidate)
            .cloned()
            .collect())
    }

    fn interest(&self, id: &InterestId) -> Result<Option<InterestEvent>, RepositoryError> {
        Ok(self.read()?.interests.get(id).cloned())
    }

    fn open_interest(
        &self,
        key: &DisclosureKey,
    ) -> Result<Option<InterestEvent>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .open_interests
            .get(key)
            .and_then(|id| tables.interests.get(id))
            .cloned())
    }

    fn interests_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<InterestEvent>, RepositoryError> {
        Ok(self
            .read()?
            .interests
            .values()
            .filter(|event| &event.candidate_id == candidate)
            .cloned()
            .collect())
    }

    fn consent(&self, key: &DisclosureKey) -> Result<Option<ConsentRecord>, RepositoryError> {
        Ok(self.read()?.consents.get(key).cloned())
    }

    fn active_hire(&self, candidate: &CandidateId) -> Result<Option<HireRecord>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .active_hires
            .get(candidate)
            .and_then(|id| tables.hires.get(id))
            .cloned())
    }

    fn hires_for_candidate(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<HireRecord>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .hires_by_candidate
            .get(candidate)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.hires.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_hire_at(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self.read()?.latest_hire.get(candidate).copied())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let fault = self.take_fault();
        let mut tables = self
            .tables
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;

        let mut staged = tables.clone();
        for (index, mutation) in batch.into_mutations().into_iter().enumerate() {
            if fault == Some(index) {
                return Err(RepositoryError::Unavailable(format!(
                    "store went away while applying mutation {index}"
                )));
            }
            staged.apply(mutation)?;
        }

        *tables = staged;
        Ok(())
    }
}
