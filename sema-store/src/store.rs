//! Contrato do store ordenado
//!
//! Cada buffer entre estágios é uma instância de [`SymbolStore`]: um
//! mapeamento ordenado de id para registro, falível, consumido de um
//! colaborador de persistência externo. Trait no core do crate,
//! implementação em módulo próprio.

use sema_core::{Symbol, SymbolId};

use crate::error::StoreResult;

/// Store ordenado de símbolos
///
/// A ordem de listagem é a ordem de inserção. Todo registro pertence a
/// exatamente um store por vez; um "move" entre estágios é a remoção
/// atômica na origem seguida da inserção no destino.
pub trait SymbolStore: Send + Sync {
    /// Insere um registro; retorna o id atribuído
    fn append(&self, symbol: Symbol) -> StoreResult<SymbolId>;

    /// Busca um registro por id
    fn get(&self, id: SymbolId) -> StoreResult<Symbol>;

    /// Lista todos os registros em ordem de inserção
    fn list(&self) -> StoreResult<Vec<Symbol>>;

    /// Lista os registros que satisfazem o predicado, em ordem
    fn list_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<Vec<Symbol>>;

    /// Remove e retorna um registro (tomada atômica)
    fn take(&self, id: SymbolId) -> StoreResult<Symbol>;

    /// Remove um registro por id
    fn remove(&self, id: SymbolId) -> StoreResult<()>;

    /// Remove os registros que satisfazem o predicado; retorna quantos
    fn remove_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<usize>;

    /// Remove todos os registros
    fn clear(&self) -> StoreResult<()>;

    /// Conta os registros
    fn count(&self) -> StoreResult<usize>;
}
