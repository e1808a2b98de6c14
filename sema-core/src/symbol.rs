//! Registro de símbolo e seu ciclo de vida
//!
//! Um [`Symbol`] nasce no Generator como `Data`, pode virar `Entropy` ao
//! atravessar um classificador de perda e volta à forma crua quando o
//! Recycler o devolve ao ambiente. O canal é atribuído uma única vez, na
//! criação, e nunca muda.

use serde::{Deserialize, Serialize};

use crate::alphabet::{self, Channel};
use crate::error::{CoreError, CoreResult};

/// Identificador atribuído pelo store (0 = ainda não persistido)
pub type SymbolId = u64;

/// Timestamp em microsegundos desde epoch
pub type Timestamp = u64;

/// Classificação corrente do símbolo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Dado retido/estruturado ("bit")
    Data,
    /// Ruído/perda não estruturada
    Entropy,
}

/// Registro de símbolo
///
/// `origin` é o caractere do alfabeto atribuído na criação e nunca muda;
/// `value` é o glifo corrente (reescrito para a forma grega em conversões
/// Data→Entropy). Como o mapa grego não é injetivo, toda consulta de canal
/// ou glifo usa `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// ID atribuído pelo store
    pub id: SymbolId,
    /// Caractere de origem (imutável)
    pub origin: char,
    /// Glifo corrente
    pub value: char,
    /// Classificação corrente
    pub kind: SymbolKind,
    /// Canal atribuído na criação; `None` para operadores
    pub channel: Option<Channel>,
    /// Unidade agregada ("palavra") produzida pelo Converter
    pub aggregated: bool,
    /// Timestamp de criação (µs)
    pub created_at: Timestamp,
}

impl Symbol {
    /// Cria um DataToken cru a partir de um caractere do alfabeto
    pub fn data(origin: char) -> CoreResult<Self> {
        if !alphabet::is_alphabet(origin) {
            return Err(CoreError::UnknownSymbol(origin));
        }

        Ok(Self {
            id: 0,
            origin,
            value: origin,
            kind: SymbolKind::Data,
            channel: alphabet::channel_of(origin),
            aggregated: false,
            created_at: Self::now(),
        })
    }

    /// Cria uma unidade agregada para o valor dado
    pub fn aggregate(origin: char) -> CoreResult<Self> {
        let mut symbol = Self::data(origin)?;
        symbol.aggregated = true;
        Ok(symbol)
    }

    /// Timestamp atual em microsegundos
    fn now() -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    /// Converte para EntropyToken, reescrevendo o glifo via mapa grego
    ///
    /// Não muta o símbolo em caso de erro.
    pub fn flip_to_entropy(&mut self) -> CoreResult<()> {
        let glyph = alphabet::greek_of(self.origin).ok_or(CoreError::UnknownSymbol(self.origin))?;
        self.kind = SymbolKind::Entropy;
        self.value = glyph;
        Ok(())
    }

    /// Restaura a forma crua DataToken (caminho do Recycler)
    pub fn restore_raw(&mut self) {
        self.kind = SymbolKind::Data;
        self.value = self.origin;
        self.aggregated = false;
    }

    /// Verifica se o símbolo é roteável por canal
    pub fn is_routable(&self) -> bool {
        self.channel.is_some()
    }

    /// Verifica se é um DataToken
    pub fn is_data(&self) -> bool {
        self.kind == SymbolKind::Data
    }

    /// Verifica se é um EntropyToken
    pub fn is_entropy(&self) -> bool {
        self.kind == SymbolKind::Entropy
    }
}
