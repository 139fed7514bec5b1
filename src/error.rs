use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Bad document: {0}")]
    Document(#[from] serde_json::Error),

    /// Transient or backend-specific store failures from other
    /// `LedgerStore` implementations.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
