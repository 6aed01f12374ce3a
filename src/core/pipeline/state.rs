//! Batch lifecycle state machine

use crate::domain::errors::VeilError;
use crate::domain::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a batch
///
/// ```text
/// Received -> Classified -> Transformed -> RiskAssessed -> Finalized
///                                      \________________/
/// any non-terminal stage -> Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Batch accepted, nothing resolved yet
    Received,
    /// Every field has a resolved technique list
    Classified,
    /// Records went through the worker pool
    Transformed,
    /// Risk report computed and applied
    RiskAssessed,
    /// Output assembled
    Finalized,
    /// Aborted by a strict failure
    Errored,
}

impl BatchState {
    /// Whether no further transition is allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Errored)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: BatchState) -> bool {
        use BatchState::*;
        match (self, next) {
            (from, Errored) => !from.is_terminal(),
            (Received, Classified)
            | (Classified, Transformed)
            | (Transformed, RiskAssessed)
            | (Transformed, Finalized)
            | (RiskAssessed, Finalized) => true,
            _ => false,
        }
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// `Validation` for an illegal transition; the state is left unchanged.
    pub fn advance(&mut self, next: BatchState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(VeilError::Validation(format!(
                "illegal batch transition {self} -> {next}"
            )));
        }
        tracing::trace!(from = %self, to = %next, "Batch state transition");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::Transformed => "transformed",
            Self::RiskAssessed => "risk_assessed",
            Self::Finalized => "finalized",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}
