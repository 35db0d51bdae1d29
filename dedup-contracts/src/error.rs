use thiserror::Error;

/// Errors surfaced across the trait boundaries in this crate. Concrete
/// engine errors (e.g. `dedup-core`'s `DedupError`) convert into this via
/// `From`, so a trait object here never has to know about any one
/// implementation's error taxonomy.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("{0}")]
    Backend(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ContractError>;
