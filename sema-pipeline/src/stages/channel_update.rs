//! Estágio ChannelUpdate
//!
//! Consome as entradas de cada canal com taxa e perda independentes.
//! Cada DataToken admitido emite um delta `-1.0` ao mutador de
//! comprimento de canal e deixa a economia (consumo terminal); cada
//! EntropyToken admitido emite `+1.0` e repousa no store de atualização
//! do canal — a fonte filtrada do Recycler. Os deltas mudam as próximas
//! leituras do oráculo: é a aresta que fecha o ciclo.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use sema_capacity::{CapacityManager, ChannelMutator};
use sema_core::{Channel, Classifier, CoreError};
use sema_store::SymbolStore;

use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{
    Stage, StageId, TickReport, Transfer, capacity_full_event, token_class, transfer_record,
    warning_event,
};

/// Atualizador por canal com taxas independentes
pub struct ChannelUpdate {
    intake: [Arc<dyn SymbolStore>; 3],
    update: [Arc<dyn SymbolStore>; 3],
    capacity: Arc<CapacityManager>,
    mutator: Arc<dyn ChannelMutator>,
    sink: EventSink,
    classifiers: [Classifier; 3],
    rates: [f64; 3],
    // Crédito fracionário acumulado por canal, para taxas abaixo da taxa
    // de agendamento do estágio
    credits: [f64; 3],
    rng: StdRng,
}

impl ChannelUpdate {
    /// Cria o estágio entre entradas e atualizações de canal
    pub fn new(
        intake: [Arc<dyn SymbolStore>; 3],
        update: [Arc<dyn SymbolStore>; 3],
        capacity: Arc<CapacityManager>,
        mutator: Arc<dyn ChannelMutator>,
        sink: EventSink,
        classifiers: [Classifier; 3],
        rates: [f64; 3],
        seed: u64,
    ) -> Self {
        Self {
            intake,
            update,
            capacity,
            mutator,
            sink,
            classifiers,
            rates,
            credits: [0.0; 3],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Taxa corrente do canal
    pub fn rate(&self, channel: Channel) -> f64 {
        self.rates[channel.index()]
    }

    /// Atualiza a taxa do canal; valor anterior mantido em caso de erro
    pub fn set_rate(&mut self, channel: Channel, rate: f64) -> PipelineResult<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "channel {channel} rate = {rate}"
            )));
        }
        self.rates[channel.index()] = rate;
        Ok(())
    }

    /// Perda corrente do canal
    pub fn loss(&self, channel: Channel) -> f64 {
        self.classifiers[channel.index()].probability()
    }

    /// Atualiza a perda do canal (%); valor anterior mantido em caso de erro
    pub fn set_loss_percent(&mut self, channel: Channel, percent: f64) -> PipelineResult<()> {
        let updated = Classifier::from_percent(percent)?;
        self.classifiers[channel.index()] = updated;
        Ok(())
    }

    fn run(
        &mut self,
        elapsed: Duration,
        report: &mut TickReport,
    ) -> PipelineResult<()> {
        for channel in Channel::all() {
            let idx = channel.index();

            self.credits[idx] += self.rates[idx] * elapsed.as_secs_f64();
            let quota = self.credits[idx].floor() as usize;
            if quota == 0 {
                continue;
            }
            self.credits[idx] -= quota as f64;

            let records = self.intake[idx].list()?;
            for symbol in records.into_iter().take(quota) {
                report.processed += 1;

                let mut outgoing = symbol;
                if outgoing.is_data() {
                    match self.classifiers[idx].classify(&mut self.rng, &outgoing) {
                        Ok(result) if result.converted() => {
                            outgoing.flip_to_entropy()?;
                            outgoing.aggregated = false;
                            report.converted += 1;
                        }
                        Ok(_) => {}
                        Err(CoreError::UnknownSymbol(value)) => {
                            report.skipped += 1;
                            self.sink.emit(PipelineEvent::SymbolSkipped {
                                stage: StageId::ChannelUpdate,
                                value,
                            });
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }

                if outgoing.is_data() {
                    // Consumo terminal: passa pelo gate de admissão do canal
                    // e deixa a economia com delta -1.0
                    self.intake[idx].take(symbol.id)?;
                    self.capacity
                        .release(token_class(&symbol), Some(channel))?;

                    match self.capacity.try_admit(token_class(&outgoing), Some(channel)) {
                        Ok(alert) => {
                            self.capacity
                                .release(token_class(&outgoing), Some(channel))?;
                            let side = self.mutator.apply_delta(channel, -1.0)?;
                            report.moved += 1;
                            self.sink.emit(PipelineEvent::ChannelDelta {
                                channel,
                                delta: -1.0,
                                side,
                            });
                            if let Some(alert) = alert {
                                self.sink.emit(warning_event(alert));
                            }
                        }
                        Err(err) if err.is_rejection() => {
                            // Destruído sem delta
                            report.rejected += 1;
                            self.sink
                                .emit(capacity_full_event(StageId::ChannelUpdate, &err));
                        }
                        Err(err) => return Err(err.into()),
                    }
                } else {
                    match transfer_record(
                        &self.intake[idx],
                        &self.update[idx],
                        &self.capacity,
                        &symbol,
                        outgoing,
                        Some(channel),
                        Some(channel),
                    )? {
                        Transfer::Moved(alert) => {
                            let side = self.mutator.apply_delta(channel, 1.0)?;
                            report.moved += 1;
                            self.sink.emit(PipelineEvent::ChannelDelta {
                                channel,
                                delta: 1.0,
                                side,
                            });
                            if let Some(alert) = alert {
                                self.sink.emit(warning_event(alert));
                            }
                        }
                        Transfer::Rejected(err) => {
                            report.rejected += 1;
                            self.sink
                                .emit(capacity_full_event(StageId::ChannelUpdate, &err));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Stage for ChannelUpdate {
    fn id(&self) -> StageId {
        StageId::ChannelUpdate
    }

    fn tick(&mut self, _budget: usize, elapsed: Duration) -> TickReport {
        let mut report = TickReport::default();
        if let Err(err) = self.run(elapsed, &mut report) {
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
