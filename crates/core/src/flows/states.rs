use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RequirementField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    CollectingHeader,
    Resolving,
    AwaitingAnswer,
    Ready,
    Finalized,
    Abandoned,
}

impl SessionStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Finalized | Self::Abandoned)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    HeaderSelected,
    Asked,
    Accepted,
    EmptyAnswer,
    Skipped,
    Revised,
    Rejected,
    Note,
    Abandoned,
    Compiled,
}

/// One entry of the conversation audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub index: u64,
    pub kind: TurnKind,
    pub field: Option<String>,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// What the resolver decided after a state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStep {
    Ask(RequirementField),
    Ready,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionOutcome {
    Incomplete { missing: Vec<crate::domain::HeaderDimension> },
    Resolved(ResolutionStep),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerOutcome {
    Accepted { field: String, turn: u64, next: ResolutionStep },
    /// Blank answer; the same question stays pending.
    NeedsValue { field: String, turn: u64 },
    Skipped { field: String, turn: u64, next: ResolutionStep },
    Revised { field: String, previous: String, turn: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteOutcome {
    Appended { turn: u64 },
    Empty,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub mandatory_total: usize,
    pub mandatory_satisfied: usize,
    pub optional_total: usize,
    pub optional_satisfied: usize,
    pub optional_skipped: usize,
    pub all_mandatory_complete: bool,
}
