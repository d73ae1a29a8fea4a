//! Import of externally administered assessment scores into the competency ledger.
//!
//! Exports are CSV files with the columns `Candidate Handle,Skill,Score,Assessed At`. Each
//! accepted row is its own revision-guarded ledger write, so a failed row never blocks the others.

mod parser;

use std::io::Read;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::workflows::matching::{
    ErrorCategory, MatchingError, MatchingService, MatchingStore, NotificationPublisher,
    ValidationError,
};

/// Skip reason shared by unknown handles and undeclared skills, so an export cannot be used to
/// test which handles exist.
pub const UNMATCHED_ROW_REASON: &str = "no declared competency matches this handle and skill";

#[derive(Debug)]
pub enum ScoreImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Matching(MatchingError),
}

impl std::fmt::Display for ScoreImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreImportError::Io(err) => write!(f, "failed to read score export: {}", err),
            ScoreImportError::Csv(err) => write!(f, "invalid score CSV data: {}", err),
            ScoreImportError::Matching(err) => {
                write!(f, "could not record verified scores: {}", err)
            }
        }
    }
}

impl std::error::Error for ScoreImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScoreImportError::Io(err) => Some(err),
            ScoreImportError::Csv(err) => Some(err),
            ScoreImportError::Matching(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ScoreImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ScoreImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<MatchingError> for ScoreImportError {
    fn from(err: MatchingError) -> Self {
        Self::Matching(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub applied: usize,
    pub skipped: Vec<SkippedRow>,
}

pub struct VerifiedScoreImporter;

impl VerifiedScoreImporter {
    pub fn from_path<P, S, N>(
        path: P,
        service: &MatchingService<S, N>,
    ) -> Result<ImportSummary, ScoreImportError>
    where
        P: AsRef<Path>,
        S: MatchingStore + 'static,
        N: NotificationPublisher + 'static,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, service)
    }

    /// Rows naming unknown handles, undeclared skills, or out-of-range scores are skipped and
    /// reported; the first two share one reason. Only a store outage aborts the run; rows before
    /// it stay applied.
    pub fn from_reader<R, S, N>(
        reader: R,
        service: &MatchingService<S, N>,
    ) -> Result<ImportSummary, ScoreImportError>
    where
        R: Read,
        S: MatchingStore + 'static,
        N: NotificationPublisher + 'static,
    {
        let mut summary = ImportSummary::default();

        for row in parser::parse_records(reader)? {
            let record = match row {
                Ok(record) => record,
                Err(rejected) => {
                    summary.skipped.push(SkippedRow {
                        line: rejected.line,
                        reason: rejected.reason,
                    });
                    continue;
                }
            };

            let assessed_at = record.assessed_at.unwrap_or_else(Utc::now);
            match service.record_verified_score(
                &record.handle,
                &record.skill,
                record.score,
                assessed_at,
            ) {
                Ok(_) => summary.applied += 1,
                Err(err) if err.category() == ErrorCategory::Unavailable => {
                    return Err(err.into());
                }
                Err(MatchingError::NotFound { .. })
                | Err(MatchingError::Validation(ValidationError::UndeclaredSkill { .. })) => {
                    summary.skipped.push(SkippedRow {
                        line: record.line,
                        reason: UNMATCHED_ROW_REASON.to_string(),
                    })
                }
                Err(err) => summary.skipped.push(SkippedRow {
                    line: record.line,
                    reason: err.to_string(),
                }),
            }
        }

        if !summary.skipped.is_empty() {
            warn!(
                target: "blind_hire::scores",
                skipped = summary.skipped.len(),
                "some score rows were not applied"
            );
        }
        info!(
            target: "blind_hire::scores",
            applied = summary.applied,
            "verified score import finished"
        );
        Ok(summary)
    }
}
