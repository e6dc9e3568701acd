pub mod engine;
pub mod states;

pub use engine::ResolutionEngine;
pub use states::{
    AnswerOutcome, NoteOutcome, Progress, ResolutionStep, SelectionOutcome, SessionStatus, Turn,
    TurnKind,
};
