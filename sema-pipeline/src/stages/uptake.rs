//! Estágio Uptake
//!
//! Move registros do ambiente para o store de captação aplicando a perda
//! configurável: DataTokens podem virar EntropyTokens com o glifo
//! reescrito via mapa grego; EntropyTokens passam sem classificação.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use sema_capacity::CapacityManager;
use sema_core::{Classifier, CoreError};
use sema_store::SymbolStore;

use crate::error::PipelineResult;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{
    Stage, StageId, TickReport, Transfer, capacity_full_event, transfer_record, warning_event,
};

/// Captação com perda
pub struct Uptake {
    source: Arc<dyn SymbolStore>,
    dest: Arc<dyn SymbolStore>,
    capacity: Arc<CapacityManager>,
    sink: EventSink,
    classifier: Classifier,
    rng: StdRng,
}

impl Uptake {
    /// Cria o estágio entre ambiente e captação
    pub fn new(
        source: Arc<dyn SymbolStore>,
        dest: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
        sink: EventSink,
        classifier: Classifier,
        seed: u64,
    ) -> Self {
        Self {
            source,
            dest,
            capacity,
            sink,
            classifier,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Classificador corrente
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Atualiza a perda (%); valor anterior mantido em caso de erro
    pub fn set_loss_percent(&mut self, percent: f64) -> PipelineResult<()> {
        let updated = Classifier::from_percent(percent)?;
        self.classifier = updated;
        Ok(())
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        if budget == 0 {
            return Ok(());
        }

        let records = self.source.list()?;
        for symbol in records.into_iter().take(budget) {
            report.processed += 1;

            let mut outgoing = symbol;
            if outgoing.is_data() {
                match self.classifier.classify(&mut self.rng, &outgoing) {
                    Ok(result) if result.converted() => {
                        outgoing.flip_to_entropy()?;
                        report.converted += 1;
                    }
                    Ok(_) => {}
                    Err(CoreError::UnknownSymbol(value)) => {
                        // Registro intocado, nunca contado em silêncio
                        report.skipped += 1;
                        self.sink.emit(PipelineEvent::SymbolSkipped {
                            stage: StageId::Uptake,
                            value,
                        });
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            match transfer_record(
                &self.source,
                &self.dest,
                &self.capacity,
                &symbol,
                outgoing,
                None,
                None,
            )? {
                Transfer::Moved(alert) => {
                    report.moved += 1;
                    if let Some(alert) = alert {
                        self.sink.emit(warning_event(alert));
                    }
                }
                Transfer::Rejected(err) => {
                    report.rejected += 1;
                    self.sink.emit(capacity_full_event(StageId::Uptake, &err));
                }
            }
        }
        Ok(())
    }
}

impl Stage for Uptake {
    fn id(&self) -> StageId {
        StageId::Uptake
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
