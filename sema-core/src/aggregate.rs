//! Agregador de símbolos idênticos
//!
//! Acumula DataTokens retidos por valor; ao cruzar o threshold, colapsa o
//! grupo em uma unidade agregada ("palavra") e reduz a contagem pendente
//! pelo threshold. A emissão carrega o canal do valor para o consumidor do
//! oráculo de capacidade aplicar o delta líquido (-threshold Data,
//! +1 agregado).

use std::collections::HashMap;

use crate::alphabet::{self, Channel};
use crate::error::{CoreError, CoreResult};

/// Threshold padrão de agregação
pub const DEFAULT_THRESHOLD: u32 = 9;

/// Emissão de uma unidade agregada
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateEmission {
    /// Valor colapsado
    pub value: char,
    /// Canal do valor (para o delta de capacidade)
    pub channel: Option<Channel>,
    /// Threshold vigente na emissão
    pub threshold: u32,
}

/// Agregador por valor com threshold configurável
///
/// Invariante em repouso: `0 ≤ pending(value) < threshold` para todo valor.
/// Threshold 0 desabilita a agregação por completo.
#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: u32,
    pending: HashMap<char, u32>,
}

impl Aggregator {
    /// Cria agregador com o threshold dado
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            pending: HashMap::new(),
        }
    }

    /// Threshold corrente
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Atualiza o threshold
    ///
    /// Grupos pendentes são mantidos; valem contra o novo threshold a
    /// partir da próxima oferta.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }

    /// Contagem pendente de um valor
    pub fn pending(&self, value: char) -> u32 {
        self.pending.get(&value).copied().unwrap_or(0)
    }

    /// Total pendente em todos os grupos
    pub fn pending_total(&self) -> u64 {
        self.pending.values().map(|&c| c as u64).sum()
    }

    /// Oferece um valor; retorna a emissão quando o grupo cruza o threshold
    pub fn offer(&mut self, value: char) -> CoreResult<Option<AggregateEmission>> {
        if !alphabet::is_alphabet(value) {
            return Err(CoreError::UnknownSymbol(value));
        }

        // Threshold 0: agregação desabilitada, nenhuma emissão jamais ocorre
        if self.threshold == 0 {
            return Ok(None);
        }

        let count = self.pending.entry(value).or_insert(0);
        *count += 1;

        if *count >= self.threshold {
            *count -= self.threshold;
            Ok(Some(AggregateEmission {
                value,
                channel: alphabet::channel_of(value),
                threshold: self.threshold,
            }))
        } else {
            Ok(None)
        }
    }

    /// Limpa todos os grupos pendentes
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
