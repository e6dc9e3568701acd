//! Contract compilation: turns a READY session into the artifact handed to
//! the downstream modeling agent.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{HeaderSelection, ADDITIONAL_NOTES};
use crate::errors::EngineError;
use crate::flows::{SessionStatus, TurnKind};
use crate::ordered::OrderedEntries;
use crate::resolver::FieldResolver;
use crate::session::SessionState;

/// Field name to value, serialized as a JSON object in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSpecs(Vec<(String, String)>);

impl UserSpecs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_session(session: &SessionState) -> Self {
        let mut entries: Vec<(String, String)> = session
            .values()
            .iter()
            .map(|value| (value.field_name.clone(), value.value.clone()))
            .collect();
        if let Some(notes) = session.additional_notes() {
            entries.push((ADDITIONAL_NOTES.to_string(), notes));
        }
        Self(entries)
    }
}

impl FromIterator<(String, String)> for UserSpecs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for UserSpecs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UserSpecs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        OrderedEntries::<String>::deserialize(deserializer).map(|entries| Self(entries.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub header: HeaderSelection,
    pub user_specs: UserSpecs,
}

impl Contract {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `final_contract_{model_type}_{portfolio}_{purpose}_{timestamp}.json`
    pub fn file_name(&self, compiled_at: DateTime<Utc>) -> String {
        format!(
            "final_contract_{}_{}_{}_{}.json",
            self.header.model_type.as_str(),
            self.header.portfolio.as_str(),
            self.header.purpose.as_str(),
            compiled_at.format("%Y%m%d_%H%M%S")
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub mandatory_complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMeta {
    pub last_updated: DateTime<Utc>,
    pub completion_status: CompletionStatus,
}

/// Snapshot of a session mid-interview, written after each accepted answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub header: Option<HeaderSelection>,
    pub user_specs: UserSpecs,
    pub meta: DraftMeta,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContractCompiler {
    resolver: FieldResolver,
}

impl ContractCompiler {
    /// Builds the contract without touching the session. Same state, same contract.
    pub fn preview(&self, session: &SessionState) -> Result<Contract, EngineError> {
        if session.status().is_closed() {
            return Err(EngineError::SessionClosed { status: session.status() });
        }

        let missing_fields: Vec<String> = self
            .resolver
            .unmet_mandatory(session)
            .into_iter()
            .map(|field| field.name.clone())
            .collect();
        if !missing_fields.is_empty() {
            return Err(EngineError::IncompleteResolution { missing_fields });
        }

        let header = match (session.status(), session.header()) {
            (SessionStatus::Ready, Some(header)) => *header,
            (status, _) => return Err(EngineError::InvalidState { operation: "compile", status }),
        };

        Ok(Contract { header, user_specs: UserSpecs::from_session(session) })
    }

    pub fn compile(&self, session: &mut SessionState) -> Result<Contract, EngineError> {
        let contract = self.preview(session)?;
        session.record_turn(
            TurnKind::Compiled,
            None,
            format!("compiled {} user specs", contract.user_specs.len()),
        );
        session.status = SessionStatus::Finalized;
        Ok(contract)
    }

    pub fn draft(&self, session: &SessionState) -> Draft {
        Draft {
            header: session.header().copied(),
            user_specs: UserSpecs::from_session(session),
            meta: DraftMeta {
                last_updated: Utc::now(),
                completion_status: CompletionStatus {
                    mandatory_complete: session.header().is_some()
                        && self.resolver.progress(session).all_mandatory_complete,
                },
            },
        }
    }
}
