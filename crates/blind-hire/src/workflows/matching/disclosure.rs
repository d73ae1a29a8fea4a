use std::sync::Arc;

use super::domain::{DisclosureKey, Visibility};
use super::repository::{MatchingStore, RepositoryError};

/// Capability check consulted before identity-bearing data leaves the vault.
pub trait DisclosurePolicy: Send + Sync {
    fn is_open(&self, key: &DisclosureKey) -> Result<bool, RepositoryError>;
}

/// Store-backed gate: open only while a disclosed consent exists for the exact
/// (candidate, company, job) triple and the candidate is not suspended.
///
/// Consent is a point-in-time read permission. A suspended candidate is closed to every company,
/// including ones that were granted disclosure earlier. Consent granted before a hire stays void
/// after reactivation; the candidate re-enters matching with no standing disclosures.
pub struct DisclosureGate<S> {
    store: Arc<S>,
}

impl<S> DisclosureGate<S>
where
    S: MatchingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> DisclosurePolicy for DisclosureGate<S>
where
    S: MatchingStore,
{
    fn is_open(&self, key: &DisclosureKey) -> Result<bool, RepositoryError> {
        let Some(disclosed_at) = self
            .store
            .consent(key)?
            .filter(|consent| consent.disclosed)
            .and_then(|consent| consent.disclosed_at)
        else {
            return Ok(false);
        };

        let visible = self
            .store
            .candidate(&key.candidate_id)?
            .map(|candidate| candidate.visibility == Visibility::Active)
            .unwrap_or(false);
        if !visible {
            return Ok(false);
        }

        let voided_by_hire = self
            .store
            .latest_hire_at(&key.candidate_id)?
            .is_some_and(|hired_at| hired_at >= disclosed_at);
        Ok(!voided_by_hire)
    }
}
