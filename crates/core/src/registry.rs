//! Requirement schema registry.
//!
//! Schemas are keyed by `{PURPOSE}_{MODEL_TYPE}_Requirements` and hold the
//! ordered list of fields a contract must (or may) carry. Everything is
//! validated when the registry is built; lookups never re-check structure.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ModelType, Purpose, RequirementField, ADDITIONAL_NOTES};
use crate::errors::EngineError;
use crate::ordered::OrderedEntries;

const KEY_SUFFIX: &str = "_Requirements";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaKey(pub String);

impl SchemaKey {
    pub fn derive(model_type: ModelType, purpose: Purpose) -> Self {
        Self(format!("{}_{}{KEY_SUFFIX}", purpose.key_segment(), model_type.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("could not read requirement schema file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse requirement schema source: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema key `{0}` must end with `_Requirements`")]
    InvalidKey(String),
    #[error("schema `{0}` declares no fields")]
    EmptySchema(String),
    #[error("schema `{key}` contains a field with an empty name")]
    EmptyFieldName { key: String },
    #[error("schema `{key}` declares field `{field}` more than once")]
    DuplicateField { key: String, field: String },
    #[error("schema `{0}` is registered more than once")]
    DuplicateSchema(String),
    #[error("schema `{key}` uses reserved field name `{field}`")]
    ReservedFieldName { key: String, field: String },
    #[error("schema `{key}` field `{field}` has non-boolean mandatory flag `{value}`")]
    InvalidMandatory { key: String, field: String, value: String },
}

/// Ordered, validated field list for one schema key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSchema {
    key: SchemaKey,
    fields: Vec<RequirementField>,
}

impl RequirementSchema {
    pub fn new(key: SchemaKey, fields: Vec<RequirementField>) -> Result<Self, SchemaLoadError> {
        if !key.as_str().ends_with(KEY_SUFFIX) {
            return Err(SchemaLoadError::InvalidKey(key.0));
        }
        if fields.is_empty() {
            return Err(SchemaLoadError::EmptySchema(key.0));
        }

        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(SchemaLoadError::EmptyFieldName { key: key.0.clone() });
            }
            if field.name == ADDITIONAL_NOTES {
                return Err(SchemaLoadError::ReservedFieldName {
                    key: key.0.clone(),
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaLoadError::DuplicateField {
                    key: key.0.clone(),
                    field: field.name.clone(),
                });
            }
        }

        Ok(Self { key, fields })
    }

    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    pub fn fields(&self) -> &[RequirementField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&RequirementField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn mandatory_fields(&self) -> impl Iterator<Item = &RequirementField> {
        self.fields.iter().filter(|field| field.mandatory)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigurationEntry {
    pub key: SchemaKey,
    pub purpose: String,
    pub model_type: String,
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaKey, RequirementSchema>,
}

impl SchemaRegistry {
    pub fn from_schemas(
        schemas: impl IntoIterator<Item = RequirementSchema>,
    ) -> Result<Self, SchemaLoadError> {
        let mut indexed = BTreeMap::new();
        for schema in schemas {
            if indexed.contains_key(schema.key()) {
                return Err(SchemaLoadError::DuplicateSchema(schema.key().0.clone()));
            }
            indexed.insert(schema.key().clone(), schema);
        }
        Ok(Self { schemas: indexed })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SchemaLoadError> {
        let document: OrderedEntries<OrderedEntries<RawField>> = serde_json::from_str(raw)?;

        let mut schemas = Vec::with_capacity(document.0.len());
        for (key, raw_fields) in document.0 {
            let mut fields = Vec::with_capacity(raw_fields.0.len());
            for (name, raw) in raw_fields.0 {
                let mandatory = raw.mandatory.resolve().ok_or_else(|| {
                    SchemaLoadError::InvalidMandatory {
                        key: key.clone(),
                        field: name.clone(),
                        value: raw.mandatory.to_string(),
                    }
                })?;
                fields.push(RequirementField {
                    name,
                    mandatory,
                    description: raw.description,
                    example: raw.example,
                });
            }
            schemas.push(RequirementSchema::new(SchemaKey(key), fields)?);
        }

        let registry = Self::from_schemas(schemas)?;
        tracing::debug!(
            event_name = "registry.loaded",
            schema_count = registry.len(),
            "requirement schemas loaded"
        );
        Ok(registry)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaLoadError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| SchemaLoadError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    pub fn lookup(
        &self,
        model_type: ModelType,
        purpose: Purpose,
    ) -> Result<&RequirementSchema, EngineError> {
        self.lookup_key(&SchemaKey::derive(model_type, purpose))
    }

    pub fn lookup_key(&self, key: &SchemaKey) -> Result<&RequirementSchema, EngineError> {
        self.schemas.get(key).ok_or_else(|| EngineError::SchemaNotFound {
            key: key.0.clone(),
            available: self.keys().map(|key| key.0.clone()).collect(),
        })
    }

    pub fn contains(&self, model_type: ModelType, purpose: Purpose) -> bool {
        self.schemas.contains_key(&SchemaKey::derive(model_type, purpose))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SchemaKey> {
        self.schemas.keys()
    }

    pub fn available_configurations(&self) -> Vec<ConfigurationEntry> {
        self.keys()
            .filter_map(|key| {
                let stem = key.as_str().strip_suffix(KEY_SUFFIX)?;
                let (purpose, model_type) = stem.split_once('_')?;
                Some(ConfigurationEntry {
                    key: key.clone(),
                    purpose: purpose.to_string(),
                    model_type: model_type.trim_end_matches('_').to_string(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    mandatory: RawMandatory,
    #[serde(default)]
    description: String,
    #[serde(default)]
    example: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMandatory {
    Flag(bool),
    Text(String),
}

impl RawMandatory {
    fn resolve(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for RawMandatory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}
