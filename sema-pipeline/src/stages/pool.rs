//! Estágio Pool
//!
//! Move registros da captação para o pool com perda independente e uma
//! razão de preferência de tipo: um percentual configurável dos ticks
//! prefere admitir DataTokens; o restante prefere EntropyTokens. O tipo
//! não preferido entra apenas quando o preferido não preenche o
//! orçamento.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use sema_capacity::CapacityManager;
use sema_core::{Classifier, CoreError, Symbol};
use sema_store::SymbolStore;

use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{
    Stage, StageId, TickReport, Transfer, capacity_full_event, transfer_record, warning_event,
};

/// Pool com perda e preferência de tipo
pub struct Pool {
    source: Arc<dyn SymbolStore>,
    dest: Arc<dyn SymbolStore>,
    capacity: Arc<CapacityManager>,
    sink: EventSink,
    classifier: Classifier,
    data_preference_percent: f64,
    rng: StdRng,
}

impl Pool {
    /// Cria o estágio entre captação e pool
    pub fn new(
        source: Arc<dyn SymbolStore>,
        dest: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
        sink: EventSink,
        classifier: Classifier,
        data_preference_percent: f64,
        seed: u64,
    ) -> Self {
        Self {
            source,
            dest,
            capacity,
            sink,
            classifier,
            data_preference_percent,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Classificador corrente
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Preferência corrente por DataTokens (%)
    pub fn data_preference_percent(&self) -> f64 {
        self.data_preference_percent
    }

    /// Atualiza a perda (%); valor anterior mantido em caso de erro
    pub fn set_loss_percent(&mut self, percent: f64) -> PipelineResult<()> {
        let updated = Classifier::from_percent(percent)?;
        self.classifier = updated;
        Ok(())
    }

    /// Atualiza a preferência (%); valor anterior mantido em caso de erro
    pub fn set_data_preference_percent(&mut self, percent: f64) -> PipelineResult<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "data preference percent = {percent}"
            )));
        }
        self.data_preference_percent = percent;
        Ok(())
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        if budget == 0 {
            return Ok(());
        }

        // Preferência sorteada por tick, não por registro
        let prefer_data = self.rng.gen_range(0.0..100.0) < self.data_preference_percent;

        let records = self.source.list()?;
        let (preferred, fallback): (Vec<Symbol>, Vec<Symbol>) = records
            .into_iter()
            .partition(|symbol| symbol.is_data() == prefer_data);

        for symbol in preferred.into_iter().chain(fallback).take(budget) {
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
                        report.skipped += 1;
                        self.sink.emit(PipelineEvent::SymbolSkipped {
                            stage: StageId::Pool,
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
                    self.sink.emit(capacity_full_event(StageId::Pool, &err));
                }
            }
        }
        Ok(())
    }
}

impl Stage for Pool {
    fn id(&self) -> StageId {
        StageId::Pool
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::lockfree::LockFreeEventBus;
    use sema_capacity::{FixedOracle, TokenClass};
    use sema_store::MemoryStore;

    struct Fixture {
        stage: Pool,
        source: Arc<dyn SymbolStore>,
        dest: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
    }

    fn fixture(loss: f64, preference: f64) -> Fixture {
        let source: Arc<dyn SymbolStore> = Arc::new(MemoryStore::new("uptake"));
        let dest: Arc<dyn SymbolStore> = Arc::new(MemoryStore::new("pool"));
        let capacity = Arc::new(CapacityManager::new(Arc::new(FixedOracle::new(1000.0))));
        let sink = EventSink::new(Arc::new(EventBus::new()), Arc::new(LockFreeEventBus::new()));
        let stage = Pool::new(
            source.clone(),
            dest.clone(),
            capacity.clone(),
            sink,
            Classifier::new(loss).unwrap(),
            preference,
            13,
        );
        Fixture {
            stage,
            source,
            dest,
            capacity,
        }
    }

    fn seed_mixed(f: &Fixture) {
        // Dois DataTokens e dois EntropyTokens intercalados
        for (value, entropy) in [('A', false), ('B', true), ('C', false), ('D', true)] {
            let mut symbol = Symbol::data(value).unwrap();
            let class = if entropy {
                symbol.flip_to_entropy().unwrap();
                TokenClass::Entropy
            } else {
                TokenClass::Data
            };
            f.capacity.try_admit(class, None).unwrap();
            f.source.append(symbol).unwrap();
        }
    }

    #[test]
    fn test_full_data_preference_takes_data_first() {
        let f = fixture(0.0, 100.0);
        seed_mixed(&f);

        let mut stage = f.stage;
        let report = stage.tick(2, Duration::from_secs(1));

        assert_eq!(report.moved, 2);
        let moved: Vec<char> = f.dest.list().unwrap().iter().map(|s| s.origin).collect();
        assert_eq!(moved, vec!['A', 'C']);
    }

    #[test]
    fn test_zero_data_preference_takes_entropy_first() {
        let f = fixture(0.0, 0.0);
        seed_mixed(&f);

        let mut stage = f.stage;
        let report = stage.tick(2, Duration::from_secs(1));

        assert_eq!(report.moved, 2);
        let moved: Vec<char> = f.dest.list().unwrap().iter().map(|s| s.origin).collect();
        assert_eq!(moved, vec!['B', 'D']);
    }

    #[test]
    fn test_falls_back_to_available_kind() {
        let f = fixture(0.0, 100.0);
        // Apenas EntropyTokens disponíveis
        let mut noise = Symbol::data('E').unwrap();
        noise.flip_to_entropy().unwrap();
        f.capacity.try_admit(TokenClass::Entropy, None).unwrap();
        f.source.append(noise).unwrap();

        let mut stage = f.stage;
        let report = stage.tick(2, Duration::from_secs(1));

        assert_eq!(report.moved, 1);
        assert_eq!(f.dest.count().unwrap(), 1);
    }

    #[test]
    fn test_loss_applies_to_data_only() {
        let f = fixture(1.0, 100.0);
        seed_mixed(&f);

        let mut stage = f.stage;
        let report = stage.tick(4, Duration::from_secs(1));

        // Os dois DataTokens convertem; os dois EntropyTokens passam direto
        assert_eq!(report.converted, 2);
        assert_eq!(report.moved, 4);
        assert!(f.dest.list().unwrap().iter().all(|s| s.is_entropy()));
    }

    #[test]
    fn test_set_preference_keeps_prior_on_error() {
        let f = fixture(0.0, 40.0);
        let mut stage = f.stage;

        assert!(stage.set_data_preference_percent(-1.0).is_err());
        assert_eq!(stage.data_preference_percent(), 40.0);

        stage.set_data_preference_percent(60.0).unwrap();
        assert_eq!(stage.data_preference_percent(), 60.0);
    }

    #[test]
    fn test_conservation_with_mixed_records() {
        let f = fixture(0.5, 50.0);
        seed_mixed(&f);
        let before = f.source.count().unwrap() as u64;

        let mut stage = f.stage;
        let report = stage.tick(10, Duration::from_secs(1));

        let after = f.source.count().unwrap() as u64;
        assert_eq!(before, after + report.moved + report.rejected);
    }
}
