//! Store em memória
//!
//! Implementação padrão de [`SymbolStore`]: `BTreeMap` com ids monotônicos
//! (ordem de iteração = ordem de inserção) atrás de `RwLock`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use sema_core::{Symbol, SymbolId};

use crate::error::{StoreError, StoreResult};
use crate::store::SymbolStore;

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<SymbolId, Symbol>,
    next_id: SymbolId,
}

/// Store ordenado em memória
#[derive(Debug)]
pub struct MemoryStore {
    /// Nome do buffer (para eventos e logs)
    name: &'static str,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Cria store vazio
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(Inner {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Nome do buffer
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl SymbolStore for MemoryStore {
    fn append(&self, mut symbol: Symbol) -> StoreResult<SymbolId> {
        let mut inner = self.inner.write()?;
        let id = inner.next_id;
        inner.next_id += 1;
        symbol.id = id;
        inner.records.insert(id, symbol);
        Ok(id)
    }

    fn get(&self, id: SymbolId) -> StoreResult<Symbol> {
        let inner = self.inner.read()?;
        inner.records.get(&id).copied().ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> StoreResult<Vec<Symbol>> {
        let inner = self.inner.read()?;
        Ok(inner.records.values().copied().collect())
    }

    fn list_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<Vec<Symbol>> {
        let inner = self.inner.read()?;
        Ok(inner
            .records
            .values()
            .filter(|record| predicate(record))
            .copied()
            .collect())
    }

    fn take(&self, id: SymbolId) -> StoreResult<Symbol> {
        let mut inner = self.inner.write()?;
        inner.records.remove(&id).ok_or(StoreError::NotFound(id))
    }

    fn remove(&self, id: SymbolId) -> StoreResult<()> {
        self.take(id).map(|_| ())
    }

    fn remove_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<usize> {
        let mut inner = self.inner.write()?;
        let doomed: Vec<SymbolId> = inner
            .records
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.id)
            .collect();

        for id in &doomed {
            inner.records.remove(id);
        }
        Ok(doomed.len())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.write()?;
        inner.records.clear();
        Ok(())
    }

    fn count(&self) -> StoreResult<usize> {
        let inner = self.inner.read()?;
        Ok(inner.records.len())
    }
}
