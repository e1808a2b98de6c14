//! # 📐 sema-capacity — Oráculo e Ledger de Capacidade
//!
//! Tetos de admissão do pipeline SEMA: o [`CapacityOracle`] fornece a
//! capacidade total `C` e por-canal `C/3` (derivadas da geometria externa,
//! consumidas somente-leitura e relidas a cada decisão); o
//! [`CapacityManager`] rastreia o uso por tipo e canal, rejeita admissões
//! que violariam os tetos e levanta avisos de marca d'água.
//!
//! A [`TriangleGeometry`] é o colaborador externo mutável: o estágio
//! ChannelUpdate empurra deltas de comprimento (±1.0) que mudam as
//! próximas leituras do oráculo — a aresta de feedback do ciclo.

pub mod error;
pub mod ledger;
pub mod oracle;

pub use error::{CapacityError, CapacityResult};
pub use ledger::{
    CapacityAlert, CapacityLedger, CapacityManager, CapacityViolation, DEFAULT_WARN_RATIO,
    TokenClass, UsageEntry,
};
pub use oracle::{CapacityOracle, ChannelMutator, FixedOracle, NullMutator, TriangleGeometry};
