use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use specwright_core::compiler::{Contract, Draft};
use specwright_core::session::{SessionId, SessionState};

pub mod file;
pub mod memory;

pub use file::{FileContractRepository, FileDraftRepository, FileSessionRepository, DRAFT_FILE_NAME};
pub use memory::{InMemoryContractRepository, InMemorySessionRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("contract for session `{session_id}` was already written")]
    AlreadyWritten { session_id: String },
    #[error("session `{0}` not found")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Session snapshots between turns.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError>;
    async fn save(&self, session: &SessionState) -> Result<(), StoreError>;
}

/// Final contract artifacts. Each session gets at most one.
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn write_once(
        &self,
        session_id: &SessionId,
        contract: &Contract,
        compiled_at: DateTime<Utc>,
    ) -> Result<PathBuf, StoreError>;
}

#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn save_draft(&self, draft: &Draft) -> Result<PathBuf, StoreError>;
}
