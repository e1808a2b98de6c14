//! Erros do pipeline

use thiserror::Error;

use sema_capacity::CapacityError;
use sema_core::CoreError;
use sema_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Erros do pipeline
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    /// Erro das primitivas de símbolo
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Erro de store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Erro de capacidade
    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    /// Configuração inválida
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Lock poison
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for PipelineError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PipelineError::LockPoisoned(err.to_string())
    }
}
