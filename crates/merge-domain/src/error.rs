use merge_core::MigrationError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown pair '{0}'")]
    UnknownPair(String),
    #[error("invalid pair '{pair}': {reason}")]
    InvalidPair { pair: String, reason: String },
    #[error("{0}")]
    Dependency(String),
}

impl DomainError {
    pub(crate) fn invalid(pair: &str, err: MigrationError) -> Self {
        DomainError::InvalidPair { pair: pair.to_string(),
                                   reason: err.to_string() }
    }
}
