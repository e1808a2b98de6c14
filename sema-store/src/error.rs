//! Erros de store

use sema_core::SymbolId;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Erros de store
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Registro não encontrado
    #[error("Record not found: {0}")]
    NotFound(SymbolId),

    /// Falha transiente do backend de persistência
    #[error("Store backend failure: {0}")]
    Backend(String),

    /// Lock poison
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(err.to_string())
    }
}
