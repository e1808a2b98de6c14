//! Erros das primitivas de símbolo

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Erros das primitivas de símbolo
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Parâmetro fora do range declarado
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Símbolo sem mapeamento de canal/grego
    #[error("Unknown symbol: {0:?}")]
    UnknownSymbol(char),
}
