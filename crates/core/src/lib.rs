pub mod audit;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
mod ordered;
pub mod registry;
pub mod resolver;
pub mod session;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use compiler::{Contract, ContractCompiler, Draft, UserSpecs};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{
    FieldValue, HeaderDimension, HeaderDraft, HeaderSelection, ModelType, Portfolio, Purpose,
    RequirementField, ValueSource,
};
pub use errors::{ApplicationError, EngineError, ErrorClass};
pub use flows::{
    AnswerOutcome, NoteOutcome, Progress, ResolutionEngine, ResolutionStep, SelectionOutcome,
    SessionStatus, Turn, TurnKind,
};
pub use registry::{
    ConfigurationEntry, RequirementSchema, SchemaKey, SchemaLoadError, SchemaRegistry,
};
pub use resolver::FieldResolver;
pub use session::{SessionId, SessionState};
