//! Estágio Recycler
//!
//! Devolve EntropyTokens dos stores de atualização ao ambiente na taxa
//! configurada, restaurando a forma crua DataToken. A re-admissão é
//! incondicional: o Recycler é a válvula de escape de capacidade e fecha
//! o ciclo de volta ao store do Generator.

use std::sync::Arc;
use std::time::Duration;

use sema_capacity::{CapacityManager, TokenClass};
use sema_core::Channel;
use sema_store::SymbolStore;

use crate::error::PipelineResult;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{Stage, StageId, TickReport};

/// Reciclador de ruído de volta ao ambiente
pub struct Recycler {
    update: [Arc<dyn SymbolStore>; 3],
    environment: Arc<dyn SymbolStore>,
    capacity: Arc<CapacityManager>,
    sink: EventSink,
}

impl Recycler {
    /// Cria o estágio entre atualizações de canal e ambiente
    pub fn new(
        update: [Arc<dyn SymbolStore>; 3],
        environment: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
        sink: EventSink,
    ) -> Self {
        Self {
            update,
            environment,
            capacity,
            sink,
        }
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        let mut remaining = budget;

        for channel in Channel::all() {
            if remaining == 0 {
                break;
            }

            let store = &self.update[channel.index()];
            let records = store.list_where(&|s| s.is_entropy())?;

            for symbol in records.into_iter().take(remaining) {
                report.processed += 1;

                let mut outgoing = symbol;
                outgoing.restore_raw();

                store.take(symbol.id)?;
                self.capacity
                    .release(TokenClass::Entropy, Some(channel))?;
                // Re-admissão incondicional: válvula de escape
                self.capacity.force_admit(TokenClass::Data, None)?;

                if let Err(err) = self.environment.append(outgoing) {
                    // Restaura a origem: registro intocado
                    self.capacity.release(TokenClass::Data, None)?;
                    self.capacity
                        .force_admit(TokenClass::Entropy, Some(channel))?;
                    store.append(symbol)?;
                    return Err(err.into());
                }

                report.moved += 1;
                remaining -= 1;
            }
        }
        Ok(())
    }
}

impl Stage for Recycler {
    fn id(&self) -> StageId {
        StageId::Recycler
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
