//! # 🔤 sema-core — Primitivas da Economia de Símbolos
//!
//! Tabelas estáticas e unidades de transformação do pipeline SEMA:
//! o alfabeto de 30 símbolos com seu contraparte grego, a partição dos 27
//! símbolos elegíveis em 3 canais de 9, o registro [`Symbol`], o
//! classificador de perda e o agregador por threshold.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      sema-core                       │
//! │  ┌────────────────┐  ┌─────────────┐  ┌───────────┐  │
//! │  │    alphabet    │  │  classify   │  │ aggregate │  │
//! │  │ 30 símbolos    │  │ sorteio     │  │ threshold │  │
//! │  │ NC1/NC2/NC3    │  │ [0,1) < p   │  │ 9 → 1     │  │
//! │  │ mapa grego     │  │ Data↔Entropy│  │ "palavra" │  │
//! │  └────────────────┘  └─────────────┘  └───────────┘  │
//! │            ▲                 ▲               ▲       │
//! │            └───────── Symbol ────────────────┘       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! > *"Trait no core, implementação no módulo."* — os estágios, stores e o
//! > ledger de capacidade vivem nos crates `sema-pipeline`, `sema-store` e
//! > `sema-capacity`.

pub mod aggregate;
pub mod alphabet;
pub mod classify;
pub mod error;
pub mod symbol;

pub use aggregate::{AggregateEmission, Aggregator, DEFAULT_THRESHOLD};
pub use alphabet::{
    ALPHABET, ALPHABET_LEN, CHANNEL_LEN, Channel, ELIGIBLE_LEN, GREEK, OPERATORS, channel_of,
    greek_of, is_alphabet, is_eligible, is_operator,
};
pub use classify::{Classification, Classifier};
pub use error::{CoreError, CoreResult};
pub use symbol::{Symbol, SymbolId, SymbolKind, Timestamp};

/// Prelude com os tipos mais usados
pub mod prelude {
    pub use crate::aggregate::{AggregateEmission, Aggregator};
    pub use crate::alphabet::{Channel, channel_of, greek_of};
    pub use crate::classify::{Classification, Classifier};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::symbol::{Symbol, SymbolId, SymbolKind, Timestamp};
}
