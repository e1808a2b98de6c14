//! Erros de capacidade

use sema_core::Channel;
use thiserror::Error;

pub type CapacityResult<T> = Result<T, CapacityError>;

/// Erros de capacidade
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapacityError {
    /// Admissão excederia a capacidade total
    #[error("Capacity exceeded: usage {usage} at capacity {capacity}")]
    Exceeded { usage: u64, capacity: f64 },

    /// Admissão excederia a capacidade do canal
    #[error("Channel {channel} capacity exceeded: usage {usage} at capacity {capacity}")]
    ChannelExceeded {
        channel: Channel,
        usage: u64,
        capacity: f64,
    },

    /// Lock poison
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for CapacityError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        CapacityError::LockPoisoned(err.to_string())
    }
}

impl CapacityError {
    /// Verifica se o erro é uma rejeição de admissão
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CapacityError::Exceeded { .. } | CapacityError::ChannelExceeded { .. }
        )
    }
}
