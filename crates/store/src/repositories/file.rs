use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use specwright_core::compiler::{Contract, Draft};
use specwright_core::session::{SessionId, SessionState};

use super::{ContractRepository, DraftRepository, SessionRepository, StoreError};

pub const DRAFT_FILE_NAME: &str = "diagnostic_draft.json";

/// One pretty-printed JSON document per session, named `{session_id}.json`.
#[derive(Clone, Debug)]
pub struct FileSessionRepository {
    dir: PathBuf,
}

impl FileSessionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.0))
    }
}

#[async_trait::async_trait]
impl SessionRepository for FileSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError> {
        let path = self.path_for(id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(StoreError::io(path, error)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, session: &SessionState) -> Result<(), StoreError> {
        let path = self.path_for(session.id());
        let payload = serde_json::to_string_pretty(session)?;
        write_replacing(&self.dir, &path, payload.as_bytes()).await?;
        tracing::debug!(
            event_name = "store.session_saved",
            session_id = %session.id(),
            status = ?session.status(),
            path = %path.display(),
            "session snapshot persisted"
        );
        Ok(())
    }
}

/// Writes `final_contract_*.json` artifacts. A file is never overwritten, and
/// each session is written at most once per repository.
#[derive(Debug)]
pub struct FileContractRepository {
    dir: PathBuf,
    written: Mutex<HashSet<String>>,
}

impl FileContractRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), written: Mutex::new(HashSet::new()) }
    }
}

#[async_trait::async_trait]
impl ContractRepository for FileContractRepository {
    async fn write_once(
        &self,
        session_id: &SessionId,
        contract: &Contract,
        compiled_at: DateTime<Utc>,
    ) -> Result<PathBuf, StoreError> {
        let mut written = self.written.lock().await;
        if written.contains(&session_id.0) {
            return Err(StoreError::AlreadyWritten { session_id: session_id.0.clone() });
        }

        let payload = contract.to_json_pretty()?;
        fs::create_dir_all(&self.dir).await.map_err(|error| StoreError::io(&self.dir, error))?;

        let base = contract.file_name(compiled_at);
        let mut attempt = 1_u32;
        let (path, mut file) = loop {
            let path = self.dir.join(collision_name(&base, attempt));
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (path, file),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(error) => return Err(StoreError::io(path, error)),
            }
        };
        file.write_all(payload.as_bytes()).await.map_err(|error| StoreError::io(&path, error))?;
        file.flush().await.map_err(|error| StoreError::io(&path, error))?;

        written.insert(session_id.0.clone());
        tracing::info!(
            event_name = "store.contract_written",
            session_id = %session_id,
            path = %path.display(),
            "final contract written"
        );
        Ok(path)
    }
}

#[derive(Clone, Debug)]
pub struct FileDraftRepository {
    dir: PathBuf,
}

impl FileDraftRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl DraftRepository for FileDraftRepository {
    async fn save_draft(&self, draft: &Draft) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(DRAFT_FILE_NAME);
        let payload = serde_json::to_string_pretty(draft)?;
        write_replacing(&self.dir, &path, payload.as_bytes()).await?;
        Ok(path)
    }
}

/// Another session may have produced the same header and second; later
/// writers get `_2`, `_3`, ... so no artifact is ever replaced.
fn collision_name(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    let stem = base.strip_suffix(".json").unwrap_or(base);
    format!("{stem}_{attempt}.json")
}

/// Write to a sibling temp file, then rename over the target.
async fn write_replacing(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    fs::create_dir_all(dir).await.map_err(|error| StoreError::io(dir, error))?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, bytes).await.map_err(|error| StoreError::io(&staging, error))?;
    fs::rename(&staging, path).await.map_err(|error| StoreError::io(path, error))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use specwright_core::registry::SchemaRegistry;
    use specwright_core::ResolutionEngine;

    use super::{FileDraftRepository, FileSessionRepository, DRAFT_FILE_NAME};
    use crate::repositories::{DraftRepository, SessionRepository};

    #[tokio::test]
    async fn session_snapshots_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let repo = FileSessionRepository::new(dir.path().join("sessions"));
        let engine = ResolutionEngine::new(Arc::new(SchemaRegistry::default()));
        let session = engine.start_session();

        assert!(repo.find_by_id(session.id()).await.expect("find before save").is_none());
        repo.save(&session).await.expect("save");
        repo.save(&session).await.expect("save again");

        let restored = repo.find_by_id(session.id()).await.expect("find").expect("present");
        assert_eq!(restored, session);
    }

    #[tokio::test]
    async fn draft_is_overwritten_in_place() {
        let dir = TempDir::new().expect("tempdir");
        let repo = FileDraftRepository::new(dir.path());
        let engine = ResolutionEngine::new(Arc::new(SchemaRegistry::default()));
        let session = engine.start_session();

        let mut draft = engine.draft(&session);
        draft.meta.last_updated =
            Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("timestamp");
        let first = repo.save_draft(&draft).await.expect("first draft");
        let second = repo.save_draft(&engine.draft(&session)).await.expect("second draft");

        assert_eq!(first, second);
        assert_eq!(first.file_name().and_then(|name| name.to_str()), Some(DRAFT_FILE_NAME));
        let raw = std::fs::read_to_string(&first).expect("read draft");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("parse draft");
        assert_eq!(json["header"], serde_json::Value::Null);
        assert_eq!(json["meta"]["completion_status"]["mandatory_complete"], false);
    }
}
