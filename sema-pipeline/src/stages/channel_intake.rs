//! Estágio ChannelIntake
//!
//! Roteia registros do store de convertidos para o store de entrada do
//! canal atribuído na tabela. O orçamento do tick é repartido entre
//! DataTokens (unidades agregadas) e EntropyTokens por um par de
//! percentuais que soma 100. Registros com canal `none` nunca são
//! roteados.

use std::sync::Arc;
use std::time::Duration;

use sema_capacity::CapacityManager;
use sema_core::Symbol;
use sema_store::SymbolStore;

use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{
    Stage, StageId, TickReport, Transfer, capacity_full_event, transfer_record, warning_event,
};

/// Roteador para os stores de entrada dos canais
pub struct ChannelIntake {
    source: Arc<dyn SymbolStore>,
    intake: [Arc<dyn SymbolStore>; 3],
    capacity: Arc<CapacityManager>,
    sink: EventSink,
    data_percent: f64,
    entropy_percent: f64,
}

impl ChannelIntake {
    /// Cria o estágio entre convertidos e entradas de canal
    pub fn new(
        source: Arc<dyn SymbolStore>,
        intake: [Arc<dyn SymbolStore>; 3],
        capacity: Arc<CapacityManager>,
        sink: EventSink,
        data_percent: f64,
        entropy_percent: f64,
    ) -> Self {
        Self {
            source,
            intake,
            capacity,
            sink,
            data_percent,
            entropy_percent,
        }
    }

    /// Par corrente de percentuais (data, entropy)
    pub fn split(&self) -> (f64, f64) {
        (self.data_percent, self.entropy_percent)
    }

    /// Atualiza o par de percentuais; deve somar 100
    pub fn set_split(&mut self, data_percent: f64, entropy_percent: f64) -> PipelineResult<()> {
        if !(0.0..=100.0).contains(&data_percent)
            || !(0.0..=100.0).contains(&entropy_percent)
            || (data_percent + entropy_percent - 100.0).abs() > f64::EPSILON
        {
            return Err(PipelineError::InvalidConfiguration(format!(
                "intake split = {data_percent}/{entropy_percent}, must sum to 100"
            )));
        }
        self.data_percent = data_percent;
        self.entropy_percent = entropy_percent;
        Ok(())
    }

    fn route(&mut self, symbol: Symbol, report: &mut TickReport) -> PipelineResult<()> {
        report.processed += 1;

        // Elegibilidade já garante canal presente
        let channel = match symbol.channel {
            Some(channel) => channel,
            None => return Ok(()),
        };

        match transfer_record(
            &self.source,
            &self.intake[channel.index()],
            &self.capacity,
            &symbol,
            symbol,
            None,
            Some(channel),
        )? {
            Transfer::Moved(alert) => {
                report.moved += 1;
                if let Some(alert) = alert {
                    self.sink.emit(warning_event(alert));
                }
            }
            Transfer::Rejected(err) => {
                report.rejected += 1;
                self.sink
                    .emit(capacity_full_event(StageId::ChannelIntake, &err));
            }
        }
        Ok(())
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        if budget == 0 {
            return Ok(());
        }

        let data_quota = (budget as f64 * self.data_percent / 100.0).floor() as usize;
        let entropy_quota = budget - data_quota;

        let records = self.source.list()?;

        let words: Vec<Symbol> = records
            .iter()
            .filter(|s| s.aggregated && s.is_data() && s.channel.is_some())
            .copied()
            .collect();
        let noise: Vec<Symbol> = records
            .iter()
            .filter(|s| s.is_entropy() && s.channel.is_some())
            .copied()
            .collect();

        for symbol in words.into_iter().take(data_quota) {
            self.route(symbol, report)?;
        }
        for symbol in noise.into_iter().take(entropy_quota) {
            self.route(symbol, report)?;
        }
        Ok(())
    }
}

impl Stage for ChannelIntake {
    fn id(&self) -> StageId {
        StageId::ChannelIntake
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
