use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved name for free-text notes; never part of a schema.
pub const ADDITIONAL_NOTES: &str = "additional_notes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementField {
    pub name: String,
    pub mandatory: bool,
    pub description: String,
    pub example: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    UserStated,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field_name: String,
    pub value: String,
    pub source: ValueSource,
    pub satisfied_at: u64,
    pub recorded_at: DateTime<Utc>,
}

impl FieldValue {
    pub fn user_stated(field_name: impl Into<String>, value: impl Into<String>, turn: u64) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
            source: ValueSource::UserStated,
            satisfied_at: turn,
            recorded_at: Utc::now(),
        }
    }
}
