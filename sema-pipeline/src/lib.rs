//! # 🔁 sema-pipeline — Pipeline da Economia de Símbolos
//!
//! A cadeia de transformação em malha fechada: símbolos são gerados,
//! reclassificados probabilisticamente, roteados para três canais com
//! capacidade limitada, agregados e parcialmente reciclados de volta à
//! origem.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SymbolPipeline                         │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  Generator → Uptake → Pool → Converter → ChannelIntake │  │
//! │  │      ▲                                       │         │  │
//! │  │      └───── Recycler ◄── ChannelUpdate ◄─────┘         │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │  ┌──────────────────┐  ┌──────────────┐  ┌───────────────┐   │
//! │  │  StageScheduler  │  │ PipelineState│  │   EventBus    │   │
//! │  │  timers + tokens │  │  contadores  │  │  + lock-free  │   │
//! │  └──────────────────┘  └──────────────┘  └───────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//!          │ admissões                        ▲ deltas ±1.0
//!          ▼                                  │
//!   CapacityManager ◄──── CapacityOracle ◄── TriangleGeometry
//! ```
//!
//! Um único scheduler cooperativo é dono de todos os timers de estágio:
//! nenhum tick re-entra, atraso vira orçamento, e `stop()` só impede
//! ticks futuros. O ChannelUpdate alimenta a geometria com deltas de
//! comprimento, fechando o ciclo que muda as próximas leituras do
//! oráculo de capacidade.
//!
//! ## Exemplo
//!
//! ```ignore
//! use sema_pipeline::{PipelineConfig, SymbolPipeline};
//!
//! let mut pipeline = SymbolPipeline::new(PipelineConfig::default())?;
//! pipeline.run_for(std::time::Duration::from_secs(5));
//! println!("{:#?}", pipeline.snapshot()?);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod lockfree;
pub mod pipeline;
pub mod scheduler;
pub mod stages;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use events::{EventBus, EventFilter, EventHandler, EventSink, PipelineEvent};
pub use lockfree::{LockFreeEventBus, Subscription};
pub use pipeline::{PipelineStores, SymbolPipeline};
pub use scheduler::{DueTick, StageHandle, StageScheduleStats, StageScheduler};
pub use stages::{
    ChannelIntake, ChannelUpdate, Converter, Generator, Pool, Recycler, Stage, StageId,
    TickReport, Uptake,
};
pub use state::{PipelineSnapshot, PipelineState, StageCounters, StageCountersEntry};

// Re-exporta os tipos dos crates vizinhos
pub use sema_capacity::{
    CapacityLedger, CapacityManager, CapacityOracle, ChannelMutator, FixedOracle, NullMutator,
    TokenClass, TriangleGeometry,
};
pub use sema_core::prelude::*;
pub use sema_store::{MemoryStore, StoreError, SymbolStore};
