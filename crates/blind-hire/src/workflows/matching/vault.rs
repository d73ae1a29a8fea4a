use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::competency::{declared_competencies, summaries, CompetencySummary};
use super::disclosure::DisclosurePolicy;
use super::domain::{
    AnonymousHandle, CandidateId, CandidateRecord, CompanyId, DisclosureKey, IdentityProfile,
    JobId,
};
use super::error::{MatchingError, ValidationError};
use super::repository::{Constraint, MatchingStore, Mutation, RepositoryError, WriteBatch};

/// Registration payload from the candidate sign-up flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegistration {
    pub identity: IdentityProfile,
    #[serde(default)]
    pub competencies: BTreeMap<String, u8>,
}

/// What the candidate gets back after registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredCandidate {
    pub candidate_id: CandidateId,
    pub handle: AnonymousHandle,
}

/// De-identified candidate record shown to companies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousCandidate {
    pub handle: AnonymousHandle,
    pub competencies: Vec<CompetencySummary>,
}

/// Candidate record with identity, returned only through an open disclosure gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedCandidate {
    pub handle: AnonymousHandle,
    pub identity: IdentityProfile,
    pub competencies: Vec<CompetencySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disclosure", rename_all = "snake_case")]
pub enum CandidateView {
    Anonymous(AnonymousCandidate),
    Disclosed(DisclosedCandidate),
}

impl CandidateView {
    pub fn handle(&self) -> &AnonymousHandle {
        match self {
            CandidateView::Anonymous(view) => &view.handle,
            CandidateView::Disclosed(view) => &view.handle,
        }
    }

    pub fn is_disclosed(&self) -> bool {
        matches!(self, CandidateView::Disclosed(_))
    }
}

/// Sole owner of personal fields. Every outbound view is decided by the disclosure policy.
pub struct IdentityVault<S, P> {
    store: Arc<S>,
    policy: Arc<P>,
}

impl<S, P> IdentityVault<S, P>
where
    S: MatchingStore,
    P: DisclosurePolicy,
{
    pub fn new(store: Arc<S>, policy: Arc<P>) -> Self {
        Self { store, policy }
    }

    pub fn register(
        &self,
        registration: CandidateRegistration,
    ) -> Result<RegisteredCandidate, MatchingError> {
        let identity = validate_identity(registration.identity)?;
        let competencies = declared_competencies(&registration.competencies)?;
        let record = CandidateRecord::new(identity, competencies, Utc::now());
        let registered = RegisteredCandidate {
            candidate_id: record.id.clone(),
            handle: record.handle.clone(),
        };

        let mut batch = WriteBatch::new();
        batch.push(Mutation::InsertCandidate(record));
        self.store.commit(batch)?;
        Ok(registered)
    }

    /// Candidate self-service edit of personal fields.
    pub fn update_identity(
        &self,
        candidate: &CandidateId,
        identity: IdentityProfile,
    ) -> Result<(), MatchingError> {
        let identity = validate_identity(identity)?;
        let mut record = self.load(candidate)?;
        let expected_revision = record.revision;
        record.identity = identity;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::UpdateCandidate {
            record,
            expected_revision,
        });
        self.store.commit(batch).map_err(|err| match err {
            RepositoryError::Constraint(constraint @ Constraint::StaleRevision { .. }) => {
                MatchingError::ConcurrentUpdate(constraint)
            }
            other => other.into(),
        })
    }

    /// The candidate's own identity, for their profile page.
    pub fn own_identity(&self, candidate: &CandidateId) -> Result<IdentityProfile, MatchingError> {
        Ok(self.load(candidate)?.identity)
    }

    /// Resolve by internal id. Unknown ids are a `NotFound`; callers facing companies should use
    /// [`IdentityVault::resolve_handle`] instead.
    pub fn resolve(
        &self,
        candidate: &CandidateId,
        company: &CompanyId,
        job: &JobId,
    ) -> Result<CandidateView, MatchingError> {
        let record = self.load(candidate)?;
        self.view(&record, company, job)
    }

    /// Company-facing lookup. An unknown handle yields an empty anonymous view rather than an
    /// error so handles cannot be tested for existence.
    pub fn resolve_handle(
        &self,
        handle: &AnonymousHandle,
        company: &CompanyId,
        job: &JobId,
    ) -> Result<CandidateView, MatchingError> {
        match self.store.candidate_by_handle(handle)? {
            Some(record) => self.view(&record, company, job),
            None => Ok(CandidateView::Anonymous(AnonymousCandidate {
                handle: handle.clone(),
                competencies: Vec::new(),
            })),
        }
    }

    /// Anonymized browse of the active matching pool.
    pub fn browse(&self, limit: usize) -> Result<Vec<AnonymousCandidate>, MatchingError> {
        Ok(self
            .store
            .candidates()?
            .iter()
            .filter(|record| record.is_active())
            .take(limit)
            .map(anonymous)
            .collect())
    }

    /// Map a company-supplied handle to the candidate it names, if that candidate is currently in
    /// the matching pool.
    pub(crate) fn active_candidate(
        &self,
        handle: &AnonymousHandle,
    ) -> Result<CandidateRecord, MatchingError> {
        self.store
            .candidate_by_handle(handle)?
            .filter(CandidateRecord::is_active)
            .ok_or_else(|| MatchingError::not_found("candidate", handle))
    }

    fn view(
        &self,
        record: &CandidateRecord,
        company: &CompanyId,
        job: &JobId,
    ) -> Result<CandidateView, MatchingError> {
        let key = DisclosureKey {
            candidate_id: record.id.clone(),
            company_id: company.clone(),
            job_id: job.clone(),
        };
        if self.policy.is_open(&key)? {
            Ok(CandidateView::Disclosed(DisclosedCandidate {
                handle: record.handle.clone(),
                identity: record.identity.clone(),
                competencies: summaries(record),
            }))
        } else {
            Ok(CandidateView::Anonymous(anonymous(record)))
        }
    }

    fn load(&self, candidate: &CandidateId) -> Result<CandidateRecord, MatchingError> {
        self.store
            .candidate(candidate)?
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))
    }
}

fn anonymous(record: &CandidateRecord) -> AnonymousCandidate {
    AnonymousCandidate {
        handle: record.handle.clone(),
        competencies: summaries(record),
    }
}

fn validate_identity(identity: IdentityProfile) -> Result<IdentityProfile, ValidationError> {
    let full_name = identity.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let email = identity.email.trim().to_ascii_lowercase();
    let plausible = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if !plausible {
        return Err(ValidationError::InvalidEmail(identity.email));
    }

    let phone = identity
        .phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());

    Ok(IdentityProfile {
        full_name,
        email,
        phone,
        documents: identity.documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, email: &str) -> IdentityProfile {
        IdentityProfile {
            full_name: name.to_string(),
            email: email.to_string(),
            phone: Some("  ".to_string()),
            documents: Vec::new(),
        }
    }

    #[test]
    fn identity_is_trimmed_and_normalized() {
        let cleaned = validate_identity(identity("  Ana Souza ", "Ana@Example.com "))
            .expect("valid identity");
        assert_eq!(cleaned.full_name, "Ana Souza");
        assert_eq!(cleaned.email, "ana@example.com");
        assert_eq!(cleaned.phone, None);
    }

    #[test]
    fn identity_requires_name_and_plausible_email() {
        assert_eq!(
            validate_identity(identity(" ", "ana@example.com")),
            Err(ValidationError::EmptyName)
        );
        for email in ["ana", "@example.com", "ana@example", "ana@example."] {
            assert!(matches!(
                validate_identity(identity("Ana", email)),
                Err(ValidationError::InvalidEmail(_))
            ));
        }
    }
}
