use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::HeaderDimension;
use crate::flows::SessionStatus;
use crate::registry::SchemaLoadError;

/// How a failure should be handled by whoever drives the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Operator problem with the requirement registry; re-asking the user cannot fix it.
    Configuration,
    /// Bad header selection; re-prompt.
    InputValidation,
    /// The driver used the state machine incorrectly.
    Protocol,
    /// Invariant violation found at compile time.
    Compilation,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InputValidation => "input_validation",
            Self::Protocol => "protocol",
            Self::Compilation => "compilation",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InputValidation)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no requirement schema registered for `{key}` (available: {available:?})")]
    SchemaNotFound { key: String, available: Vec<String> },
    #[error("invalid {dimension} selection `{value}` (expected one of {:?})", .dimension.allowed_values())]
    InvalidSelection { dimension: HeaderDimension, value: String },
    #[error("answer for `{received}` is out of order (pending field: {expected:?})")]
    OutOfOrderAnswer { expected: Option<String>, received: String },
    #[error("field `{field}` is mandatory and cannot be skipped")]
    CannotSkipMandatory { field: String },
    #[error("session is closed ({status:?})")]
    SessionClosed { status: SessionStatus },
    #[error("field `{field}` is not part of schema `{schema_key}`")]
    UnknownField { field: String, schema_key: String },
    #[error("operation `{operation}` is not permitted while session is {status:?}")]
    InvalidState { operation: &'static str, status: SessionStatus },
    #[error("cannot compile contract; mandatory fields unmet: {missing_fields:?}")]
    IncompleteResolution { missing_fields: Vec<String> },
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SchemaNotFound { .. } => ErrorClass::Configuration,
            Self::InvalidSelection { .. } => ErrorClass::InputValidation,
            Self::OutOfOrderAnswer { .. }
            | Self::CannotSkipMandatory { .. }
            | Self::SessionClosed { .. }
            | Self::UnknownField { .. }
            | Self::InvalidState { .. } => ErrorClass::Protocol,
            Self::IncompleteResolution { .. } => ErrorClass::Compilation,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Schema(#[from] SchemaLoadError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label used in machine-readable command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Engine(error) => error.class().as_str(),
            Self::Schema(_) | Self::Configuration(_) => ErrorClass::Configuration.as_str(),
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Engine(error) if error.class() == ErrorClass::Configuration => 2,
            Self::Engine(_) => 3,
            Self::Schema(_) | Self::Configuration(_) => 2,
            Self::Persistence(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::HeaderDimension;
    use crate::errors::{ApplicationError, EngineError, ErrorClass};
    use crate::flows::SessionStatus;

    #[test]
    fn engine_errors_map_to_taxonomy() {
        let missing = EngineError::SchemaNotFound {
            key: "ADJUDICATION_EAD_Requirements".to_owned(),
            available: Vec::new(),
        };
        assert_eq!(missing.class(), ErrorClass::Configuration);
        assert!(!missing.class().is_recoverable());

        let selection = EngineError::InvalidSelection {
            dimension: HeaderDimension::Portfolio,
            value: "Sovereign".to_owned(),
        };
        assert_eq!(selection.class(), ErrorClass::InputValidation);
        assert!(selection.class().is_recoverable());
        assert!(selection.to_string().contains("Wholesale"));

        let closed = EngineError::SessionClosed { status: SessionStatus::Finalized };
        assert_eq!(closed.class(), ErrorClass::Protocol);

        let incomplete =
            EngineError::IncompleteResolution { missing_fields: vec!["default_definition".into()] };
        assert_eq!(incomplete.class(), ErrorClass::Compilation);
    }

    #[test]
    fn application_errors_expose_class_and_exit_code() {
        let protocol = ApplicationError::from(EngineError::CannotSkipMandatory {
            field: "observation_period".to_owned(),
        });
        assert_eq!(protocol.error_class(), "protocol");
        assert_eq!(protocol.exit_code(), 3);

        let persistence = ApplicationError::Persistence("disk full".to_owned());
        assert_eq!(persistence.error_class(), "persistence");
        assert_eq!(persistence.exit_code(), 4);

        let configuration = ApplicationError::Configuration("bad path".to_owned());
        assert_eq!(configuration.error_class(), "configuration");
        assert_eq!(configuration.exit_code(), 2);
    }
}
