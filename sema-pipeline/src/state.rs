//! Estado observável do pipeline
//!
//! O [`PipelineState`] é o objeto de contadores injetado em cada estágio —
//! substitui dashboards globais mutáveis. Observadores externos leem
//! snapshots ou assinam o bus de eventos; nenhum estágio escreve em UI.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::stages::{StageId, TickReport};

/// Contadores acumulados de um estágio
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    /// Ticks executados
    pub ticks: u64,
    /// Registros examinados
    pub processed: u64,
    /// Registros movidos
    pub moved: u64,
    /// Conversões Data→Entropy
    pub converted: u64,
    /// Rejeições por capacidade
    pub rejected: u64,
    /// Símbolos desconhecidos pulados
    pub skipped: u64,
    /// Emissões de agregado
    pub aggregated: u64,
    /// Ticks abandonados por falha de store
    pub store_faults: u64,
}

impl StageCounters {
    /// Absorve o resultado de um tick
    pub fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.processed += report.processed;
        self.moved += report.moved;
        self.converted += report.converted;
        self.rejected += report.rejected;
        self.skipped += report.skipped;
        self.aggregated += report.aggregated;
        if report.faulted() {
            self.store_faults += 1;
        }
    }

    /// Soma com outros contadores
    fn add(&mut self, other: &StageCounters) {
        self.ticks += other.ticks;
        self.processed += other.processed;
        self.moved += other.moved;
        self.converted += other.converted;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.aggregated += other.aggregated;
        self.store_faults += other.store_faults;
    }
}

/// Contadores de um estágio no snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageCountersEntry {
    pub stage: StageId,
    pub counters: StageCounters,
}

/// Snapshot serializável do estado do pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Contadores por estágio, em ordem de fluxo
    pub stages: Vec<StageCountersEntry>,
    /// Soma de todos os estágios
    pub totals: StageCounters,
}

/// Estado injetável do pipeline
#[derive(Debug, Default)]
pub struct PipelineState {
    counters: RwLock<[StageCounters; 7]>,
}

impl PipelineState {
    /// Cria estado zerado
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registra o resultado de um tick
    pub fn record_tick(&self, stage: StageId, report: &TickReport) -> PipelineResult<()> {
        let mut counters = self.counters.write()?;
        counters[stage.index()].absorb(report);
        Ok(())
    }

    /// Contadores correntes de um estágio
    pub fn counters(&self, stage: StageId) -> PipelineResult<StageCounters> {
        let counters = self.counters.read()?;
        Ok(counters[stage.index()])
    }

    /// Snapshot de todos os estágios
    pub fn snapshot(&self) -> PipelineResult<PipelineSnapshot> {
        let counters = self.counters.read()?;

        let mut totals = StageCounters::default();
        let stages = StageId::all()
            .iter()
            .map(|&stage| {
                let entry = counters[stage.index()];
                totals.add(&entry);
                StageCountersEntry {
                    stage,
                    counters: entry,
                }
            })
            .collect();

        Ok(PipelineSnapshot { stages, totals })
    }

    /// Zera todos os contadores
    pub fn reset(&self) -> PipelineResult<()> {
        let mut counters = self.counters.write()?;
        *counters = Default::default();
        Ok(())
    }
}
