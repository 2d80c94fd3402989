use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid merge pair: {0}")]
    InvalidPair(#[from] unify_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] unify_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] unify_ledger::LedgerError),

    #[error("resolve error: {0}")]
    Resolve(#[from] unify_engine::ResolveError),

    #[error("engine error: {0}")]
    Engine(#[from] unify_engine::EngineError),

    #[error("state error: {0}")]
    State(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
