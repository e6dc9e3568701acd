pub mod repositories;

pub use repositories::{
    ContractRepository, DraftRepository, FileContractRepository, FileDraftRepository,
    FileSessionRepository, InMemoryContractRepository, InMemorySessionRepository,
    SessionRepository, StoreError, DRAFT_FILE_NAME,
};
