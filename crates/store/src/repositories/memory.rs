use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use specwright_core::compiler::Contract;
use specwright_core::session::{SessionId, SessionState};

use super::{ContractRepository, SessionRepository, StoreError};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, SessionState>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: &SessionState) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().0.clone(), session.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<BTreeMap<String, (PathBuf, Contract)>>,
}

impl InMemoryContractRepository {
    pub async fn find(&self, session_id: &SessionId) -> Option<Contract> {
        let contracts = self.contracts.read().await;
        contracts.get(&session_id.0).map(|(_, contract)| contract.clone())
    }
}

#[async_trait::async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn write_once(
        &self,
        session_id: &SessionId,
        contract: &Contract,
        compiled_at: DateTime<Utc>,
    ) -> Result<PathBuf, StoreError> {
        let mut contracts = self.contracts.write().await;
        if contracts.contains_key(&session_id.0) {
            return Err(StoreError::AlreadyWritten { session_id: session_id.0.clone() });
        }
        let path = PathBuf::from(contract.file_name(compiled_at));
        contracts.insert(session_id.0.clone(), (path.clone(), contract.clone()));
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use specwright_core::compiler::{Contract, UserSpecs};
    use specwright_core::domain::{HeaderSelection, ModelType, Portfolio, Purpose};
    use specwright_core::session::SessionId;

    use super::{InMemoryContractRepository, InMemorySessionRepository};
    use crate::repositories::{ContractRepository, SessionRepository, StoreError};

    fn contract() -> Contract {
        Contract {
            header: HeaderSelection::new(ModelType::Lgd, Portfolio::Commercial, Purpose::Ifrs9),
            user_specs: vec![("workout_period".to_string(), "3 years".to_string())]
                .into_iter()
                .collect::<UserSpecs>(),
        }
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let repo = InMemorySessionRepository::default();
        let found = repo.find_by_id(&SessionId("missing".to_string())).await.expect("lookup");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn second_contract_write_for_session_is_rejected() {
        let repo = InMemoryContractRepository::default();
        let session_id = SessionId("s-1".to_string());

        let path =
            repo.write_once(&session_id, &contract(), Utc::now()).await.expect("first write");
        assert!(path.to_string_lossy().starts_with("final_contract_LGD_Commercial_IFRS9_"));

        let error = repo
            .write_once(&session_id, &contract(), Utc::now())
            .await
            .expect_err("second write");
        assert!(matches!(error, StoreError::AlreadyWritten { .. }));
        assert_eq!(repo.find(&session_id).await, Some(contract()));
    }
}
