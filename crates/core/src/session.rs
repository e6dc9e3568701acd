//! The in-progress resolution aggregate.
//!
//! A `SessionState` is plain data: it serializes as a whole so a driver can
//! persist it between turns and resume later. All transitions go through
//! `ResolutionEngine`; the mutators here are crate-private.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{FieldValue, HeaderDraft, HeaderSelection, RequirementField};
use crate::flows::{SessionStatus, Turn, TurnKind};
use crate::registry::SchemaKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub(crate) id: SessionId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) status: SessionStatus,
    pub(crate) header_draft: HeaderDraft,
    pub(crate) header: Option<HeaderSelection>,
    pub(crate) schema_key: Option<SchemaKey>,
    pub(crate) fields: Vec<RequirementField>,
    /// Satisfaction order; this is the order of `user_specs`.
    pub(crate) values: Vec<FieldValue>,
    pub(crate) skipped: BTreeSet<String>,
    pub(crate) notes: Vec<String>,
    pub(crate) pending: Option<String>,
    pub(crate) conversation: Vec<Turn>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            id: SessionId::generate(),
            created_at: Utc::now(),
            status: SessionStatus::CollectingHeader,
            header_draft: HeaderDraft::default(),
            header: None,
            schema_key: None,
            fields: Vec::new(),
            values: Vec::new(),
            skipped: BTreeSet::new(),
            notes: Vec::new(),
            pending: None,
            conversation: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn header_draft(&self) -> &HeaderDraft {
        &self.header_draft
    }

    pub fn header(&self) -> Option<&HeaderSelection> {
        self.header.as_ref()
    }

    pub fn schema_key(&self) -> Option<&SchemaKey> {
        self.schema_key.as_ref()
    }

    pub fn fields(&self) -> &[RequirementField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&RequirementField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|value| value.field_name == name)
    }

    pub fn is_satisfied(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skipped.contains(name)
    }

    pub fn pending_field_name(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Notes joined into the single `additional_notes` value.
    pub fn additional_notes(&self) -> Option<String> {
        (!self.notes.is_empty()).then(|| self.notes.join("\n"))
    }

    pub fn conversation(&self) -> &[Turn] {
        &self.conversation
    }

    pub(crate) fn next_turn_index(&self) -> u64 {
        self.conversation.last().map(|turn| turn.index + 1).unwrap_or(1)
    }

    pub(crate) fn record_turn(
        &mut self,
        kind: TurnKind,
        field: Option<&str>,
        text: impl Into<String>,
    ) -> u64 {
        let index = self.next_turn_index();
        self.conversation.push(Turn {
            index,
            kind,
            field: field.map(str::to_string),
            text: text.into(),
            recorded_at: Utc::now(),
        });
        index
    }

    /// Replaces an existing value in place so `user_specs` order is stable.
    pub(crate) fn upsert_value(&mut self, value: FieldValue) -> Option<FieldValue> {
        match self.values.iter_mut().find(|existing| existing.field_name == value.field_name) {
            Some(existing) => Some(std::mem::replace(existing, value)),
            None => {
                self.values.push(value);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState;
    use crate::domain::FieldValue;
    use crate::flows::{SessionStatus, TurnKind};

    #[test]
    fn new_session_collects_header_with_empty_log() {
        let session = SessionState::new();
        assert_eq!(session.status(), SessionStatus::CollectingHeader);
        assert!(session.conversation().is_empty());
        assert!(session.header().is_none());
        assert!(session.additional_notes().is_none());
    }

    #[test]
    fn turn_indices_increase_monotonically() {
        let mut session = SessionState::new();
        let first = session.record_turn(TurnKind::Note, None, "a");
        let second = session.record_turn(TurnKind::Note, None, "b");
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn upsert_keeps_original_position() {
        let mut session = SessionState::new();
        session.upsert_value(FieldValue::user_stated("a", "1", 1));
        session.upsert_value(FieldValue::user_stated("b", "2", 2));
        let previous = session.upsert_value(FieldValue::user_stated("a", "3", 3));

        assert_eq!(previous.map(|value| value.value), Some("1".to_string()));
        let names: Vec<&str> =
            session.values().iter().map(|value| value.field_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(session.value("a").map(|value| value.value.as_str()), Some("3"));
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = SessionState::new();
        session.record_turn(TurnKind::Note, None, "keep me");
        let json = serde_json::to_string(&session).expect("serialize session");
        let restored: SessionState = serde_json::from_str(&json).expect("deserialize session");
        assert_eq!(restored, session);
    }
}
