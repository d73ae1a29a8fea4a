//! Pipeline stage ordering and the transition rules applied to every application.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::StageEntry;

/// Position of a candidate in a company's per-job pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    Review,
    Interview,
    Finalist,
    Hired,
    Rejected,
    ClosedSuperseded,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            PipelineStage::Pending => "pending",
            PipelineStage::Review => "review",
            PipelineStage::Interview => "interview",
            PipelineStage::Finalist => "finalist",
            PipelineStage::Hired => "hired",
            PipelineStage::Rejected => "rejected",
            PipelineStage::ClosedSuperseded => "closed_superseded",
        }
    }

    /// Wording shown to the candidate on their own dashboard.
    pub const fn candidate_label(self) -> &'static str {
        match self {
            PipelineStage::ClosedSuperseded => "no_longer_available",
            other => other.label(),
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStage::Hired | PipelineStage::Rejected | PipelineStage::ClosedSuperseded
        )
    }

    /// Ordering among the open stages; terminal stages have no rank.
    pub const fn rank(self) -> Option<u8> {
        match self {
            PipelineStage::Pending => Some(0),
            PipelineStage::Review => Some(1),
            PipelineStage::Interview => Some(2),
            PipelineStage::Finalist => Some(3),
            PipelineStage::Hired | PipelineStage::Rejected | PipelineStage::ClosedSuperseded => {
                None
            }
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of validating a company-driven move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMove {
    /// Append a new history entry.
    Advance(PipelineStage),
    /// Target equals the current stage; nothing is written.
    Unchanged,
}

/// Rejected stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move application from {from} to {to}")]
pub struct TransitionError {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

/// Rules for moves requested by a company operator.
///
/// Forward and lateral moves between open stages are allowed, `rejected` is reachable from any
/// open stage, and terminal stages are final. `hired` and `closed_superseded` are reserved for the
/// hire lock controller.
pub fn company_move(from: PipelineStage, to: PipelineStage) -> Result<StageMove, TransitionError> {
    let refused = TransitionError { from, to };
    if from.is_terminal() {
        return Err(refused);
    }

    match to {
        PipelineStage::Rejected => Ok(StageMove::Advance(to)),
        PipelineStage::Hired | PipelineStage::ClosedSuperseded => Err(refused),
        _ if to == from => Ok(StageMove::Unchanged),
        _ => match (from.rank(), to.rank()) {
            (Some(current), Some(next)) if next > current => Ok(StageMove::Advance(to)),
            _ => Err(refused),
        },
    }
}

/// Stage reached when the candidate accepts a company's interest, if any.
pub fn after_acceptance(current: PipelineStage) -> Option<PipelineStage> {
    match (current.rank(), PipelineStage::Interview.rank()) {
        (Some(rank), Some(interview)) if rank < interview => Some(PipelineStage::Interview),
        _ => None,
    }
}

/// Stage reached when the candidate declines a company's interest, if any.
pub fn after_decline(current: PipelineStage) -> Option<PipelineStage> {
    if current.is_terminal() {
        None
    } else {
        Some(PipelineStage::Rejected)
    }
}

/// Current stage is the last logged stage.
pub fn replay(history: &[StageEntry]) -> Option<PipelineStage> {
    history.last().map(|entry| entry.stage)
}

/// Problems found while auditing a stage log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryViolation {
    #[error("stage history is empty")]
    Empty,
    #[error("stage history must start at pending, found {0}")]
    InvalidStart(PipelineStage),
    #[error("entry {index} follows terminal stage {terminal}")]
    AfterTerminal {
        index: usize,
        terminal: PipelineStage,
    },
    #[error("entry {index} moves backwards from {from} to {to}")]
    Backwards {
        index: usize,
        from: PipelineStage,
        to: PipelineStage,
    },
}

/// Walk the whole log and confirm every step was a legal transition, returning the final stage.
pub(crate) fn audit(history: &[StageEntry]) -> Result<PipelineStage, HistoryViolation> {
    let first = history.first().ok_or(HistoryViolation::Empty)?;
    if first.stage != PipelineStage::Pending {
        return Err(HistoryViolation::InvalidStart(first.stage));
    }

    let mut current = first.stage;
    for (index, entry) in history.iter().enumerate().skip(1) {
        audit_step(index, current, entry.stage)?;
        current = entry.stage;
    }

    Ok(current)
}

/// Check that appending `next` as entry `index` after `current` keeps the log lawful.
pub(crate) fn audit_step(
    index: usize,
    current: PipelineStage,
    next: PipelineStage,
) -> Result<(), HistoryViolation> {
    if current.is_terminal() {
        return Err(HistoryViolation::AfterTerminal {
            index,
            terminal: current,
        });
    }
    if let (Some(from), Some(to)) = (current.rank(), next.rank()) {
        if to < from {
            return Err(HistoryViolation::Backwards {
                index,
                from: current,
                to: next,
            });
        }
    }
    Ok(())
}
