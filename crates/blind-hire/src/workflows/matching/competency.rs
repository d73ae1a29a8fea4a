use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CandidateId, CandidateRecord, Competency};
use super::error::{MatchingError, ValidationError};
use super::repository::{Constraint, MatchingStore, Mutation, RepositoryError, WriteBatch};

pub const MIN_DECLARED_LEVEL: u8 = 1;
pub const MAX_DECLARED_LEVEL: u8 = 5;
pub const MAX_VERIFIED_SCORE: u8 = 100;

/// Company-safe projection of one competency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencySummary {
    pub skill: String,
    pub declared_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_score: Option<u8>,
}

/// Skill keys are case-insensitive and whitespace-trimmed.
pub fn normalize_skill(raw: &str) -> Result<String, ValidationError> {
    let skill = raw.trim().to_lowercase();
    if skill.is_empty() {
        Err(ValidationError::EmptySkill)
    } else {
        Ok(skill)
    }
}

pub fn validate_level(skill: &str, level: u8) -> Result<(), ValidationError> {
    if (MIN_DECLARED_LEVEL..=MAX_DECLARED_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(ValidationError::LevelOutOfRange {
            skill: skill.to_string(),
            level,
        })
    }
}

/// Validate and normalize a batch of self-declared levels.
pub fn declared_competencies(
    declared: &BTreeMap<String, u8>,
) -> Result<BTreeMap<String, Competency>, ValidationError> {
    let mut competencies = BTreeMap::new();
    for (raw, level) in declared {
        let skill = normalize_skill(raw)?;
        validate_level(&skill, *level)?;
        competencies.insert(
            skill,
            Competency {
                declared_level: *level,
                verified_score: None,
                verified_at: None,
            },
        );
    }
    Ok(competencies)
}

pub fn summaries(record: &CandidateRecord) -> Vec<CompetencySummary> {
    record
        .competencies
        .iter()
        .map(|(skill, competency)| CompetencySummary {
            skill: skill.clone(),
            declared_level: competency.declared_level,
            verified_score: competency.verified_score,
        })
        .collect()
}

/// Reads and candidate-driven writes of skill levels and verified scores. Matching only ever
/// reads through [`summaries`].
pub struct CompetencyLedger<S> {
    store: Arc<S>,
}

impl<S> CompetencyLedger<S>
where
    S: MatchingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn profile(
        &self,
        candidate: &CandidateId,
    ) -> Result<Vec<CompetencySummary>, MatchingError> {
        let record = self.load(candidate)?;
        Ok(summaries(&record))
    }

    /// Merge self-declared levels into the candidate's ledger. Existing verified scores are kept.
    pub fn declare(
        &self,
        candidate: &CandidateId,
        declared: &BTreeMap<String, u8>,
    ) -> Result<Vec<CompetencySummary>, MatchingError> {
        let incoming = declared_competencies(declared)?;
        let mut record = self.load(candidate)?;
        let expected_revision = record.revision;

        for (skill, competency) in incoming {
            record
                .competencies
                .entry(skill)
                .and_modify(|existing| existing.declared_level = competency.declared_level)
                .or_insert(competency);
        }

        let summary = summaries(&record);
        self.save(record, expected_revision)?;
        Ok(summary)
    }

    /// Attach an externally administered test score to an already declared skill.
    pub fn record_verified_score(
        &self,
        candidate: &CandidateId,
        skill: &str,
        score: u8,
        assessed_at: DateTime<Utc>,
    ) -> Result<CompetencySummary, MatchingError> {
        let skill = normalize_skill(skill)?;
        if score > MAX_VERIFIED_SCORE {
            return Err(ValidationError::ScoreOutOfRange { skill, score }.into());
        }

        let mut record = self.load(candidate)?;
        let expected_revision = record.revision;
        let competency = record
            .competencies
            .get_mut(&skill)
            .ok_or_else(|| ValidationError::UndeclaredSkill {
                skill: skill.clone(),
            })?;
        competency.verified_score = Some(score);
        competency.verified_at = Some(assessed_at);
        let summary = CompetencySummary {
            skill,
            declared_level: competency.declared_level,
            verified_score: competency.verified_score,
        };

        self.save(record, expected_revision)?;
        Ok(summary)
    }

    fn load(&self, candidate: &CandidateId) -> Result<CandidateRecord, MatchingError> {
        self.store
            .candidate(candidate)?
            .ok_or_else(|| MatchingError::not_found("candidate", candidate))
    }

    fn save(&self, record: CandidateRecord, expected_revision: u64) -> Result<(), MatchingError> {
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
}
