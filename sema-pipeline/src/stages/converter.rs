//! Estágio Converter
//!
//! Move registros do pool para o store de convertidos. EntropyTokens
//! passam direto; DataTokens são oferecidos ao agregador e, quando um
//! grupo cruza o threshold, o estágio colapsa atomicamente `threshold`
//! DataTokens crus do mesmo valor em uma unidade agregada ("palavra") e
//! aplica o delta líquido no ledger.

use std::sync::Arc;
use std::time::Duration;

use sema_capacity::CapacityManager;
use sema_core::{AggregateEmission, Aggregator, CoreError, Symbol};
use sema_store::SymbolStore;

use crate::error::PipelineResult;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{
    Stage, StageId, TickReport, Transfer, capacity_full_event, transfer_record, warning_event,
};

/// Conversor com agregação por threshold
pub struct Converter {
    source: Arc<dyn SymbolStore>,
    dest: Arc<dyn SymbolStore>,
    capacity: Arc<CapacityManager>,
    sink: EventSink,
    aggregator: Aggregator,
}

impl Converter {
    /// Cria o estágio entre pool e convertidos
    pub fn new(
        source: Arc<dyn SymbolStore>,
        dest: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
        sink: EventSink,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            source,
            dest,
            capacity,
            sink,
            aggregator,
        }
    }

    /// Agregador corrente
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Atualiza o threshold de agregação (0 desabilita)
    pub fn set_threshold(&mut self, threshold: u32) {
        self.aggregator.set_threshold(threshold);
    }

    /// Colapsa um grupo que cruzou o threshold
    ///
    /// Remove `threshold` DataTokens crus do valor no store de convertidos,
    /// insere uma palavra e aplica o delta líquido no ledger.
    fn collapse(
        &mut self,
        emission: AggregateEmission,
        report: &mut TickReport,
    ) -> PipelineResult<()> {
        let value = emission.value;
        let raw: Vec<Symbol> = self
            .dest
            .list_where(&|s| s.origin == value && s.is_data() && !s.aggregated)?;

        for victim in raw.iter().take(emission.threshold as usize) {
            self.dest.remove(victim.id)?;
        }

        let word = Symbol::aggregate(emission.value)?;
        self.dest.append(word)?;
        self.capacity.record_aggregate(None, emission.threshold)?;

        report.aggregated += 1;
        self.sink.emit(PipelineEvent::AggregateEmitted {
            value: emission.value,
            channel: emission.channel,
            threshold: emission.threshold,
        });
        Ok(())
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        if budget == 0 {
            return Ok(());
        }

        let records = self.source.list()?;
        for symbol in records.into_iter().take(budget) {
            report.processed += 1;

            match transfer_record(
                &self.source,
                &self.dest,
                &self.capacity,
                &symbol,
                symbol,
                None,
                None,
            )? {
                Transfer::Moved(alert) => {
                    report.moved += 1;
                    if let Some(alert) = alert {
                        self.sink.emit(warning_event(alert));
                    }

                    // Só DataTokens crus que chegaram ao destino contam
                    if symbol.is_data() && !symbol.aggregated {
                        match self.aggregator.offer(symbol.origin) {
                            Ok(Some(emission)) => self.collapse(emission, report)?,
                            Ok(None) => {}
                            Err(CoreError::UnknownSymbol(value)) => {
                                report.skipped += 1;
                                self.sink.emit(PipelineEvent::SymbolSkipped {
                                    stage: StageId::Converter,
                                    value,
                                });
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
                Transfer::Rejected(err) => {
                    report.rejected += 1;
                    self.sink
                        .emit(capacity_full_event(StageId::Converter, &err));
                }
            }
        }
        Ok(())
    }
}

impl Stage for Converter {
    fn id(&self) -> StageId {
        StageId::Converter
    }

    fn tick(&mut self, budget: usize, _elapsed: Duration) -> TickReport {
        let mut report = TickReport::default();
        if let Err(err) = self.run(budget, &mut report) {
            tracing::warn!(stage = %self.id(), error = %err, "tick abandoned");
            self.sink.emit(PipelineEvent::StoreFault {
                stage: self.id(),
                message: err.to_string(),
            });
            report.fault = Some(err.to_string());
        }
        report
    }
}
