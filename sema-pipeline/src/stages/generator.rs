//! Estágio Generator
//!
//! Não tem store de origem: fabrica um símbolo aleatório do alfabeto por
//! unidade de orçamento e o insere no store de ambiente, sujeito à
//! capacidade total.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use sema_capacity::{CapacityManager, TokenClass};
use sema_core::{Symbol, alphabet};
use sema_store::SymbolStore;

use crate::error::PipelineResult;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{Stage, StageId, TickReport, capacity_full_event, warning_event};

/// Gerador de símbolos crus
pub struct Generator {
    environment: Arc<dyn SymbolStore>,
    capacity: Arc<CapacityManager>,
    sink: EventSink,
    rng: StdRng,
}

impl Generator {
    /// Cria o estágio sobre o store de ambiente
    pub fn new(
        environment: Arc<dyn SymbolStore>,
        capacity: Arc<CapacityManager>,
        sink: EventSink,
        seed: u64,
    ) -> Self {
        Self {
            environment,
            capacity,
            sink,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn run(&mut self, budget: usize, report: &mut TickReport) -> PipelineResult<()> {
        for _ in 0..budget {
            report.processed += 1;

            let value = alphabet::sample(&mut self.rng);
            let symbol = Symbol::data(value)?;

            match self.capacity.try_admit(TokenClass::Data, None) {
                Ok(alert) => {
                    if let Err(err) = self.environment.append(symbol) {
                        self.capacity.release(TokenClass::Data, None)?;
                        return Err(err.into());
                    }
                    report.moved += 1;
                    if let Some(alert) = alert {
                        self.sink.emit(warning_event(alert));
                    }
                }
                Err(err) if err.is_rejection() => {
                    // Símbolo destruído, nunca re-enfileirado
                    report.rejected += 1;
                    self.sink.emit(capacity_full_event(StageId::Generator, &err));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

impl Stage for Generator {
    fn id(&self) -> StageId {
        StageId::Generator
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
    use sema_capacity::FixedOracle;
    use sema_store::MemoryStore;

    fn sink() -> EventSink {
        EventSink::new(Arc::new(EventBus::new()), Arc::new(LockFreeEventBus::new()))
    }

    fn generator(total_capacity: f64) -> (Generator, Arc<dyn SymbolStore>, Arc<CapacityManager>) {
        let environment: Arc<dyn SymbolStore> = Arc::new(MemoryStore::new("environment"));
        let capacity = Arc::new(CapacityManager::new(Arc::new(FixedOracle::new(
            total_capacity,
        ))));
        let stage = Generator::new(environment.clone(), capacity.clone(), sink(), 7);
        (stage, environment, capacity)
    }

    #[test]
    fn test_generates_up_to_budget() {
        let (mut stage, environment, _) = generator(100.0);

        let report = stage.tick(5, Duration::from_secs(1));
        assert_eq!(report.processed, 5);
        assert_eq!(report.moved, 5);
        assert_eq!(environment.count().unwrap(), 5);
    }

    #[test]
    fn test_generated_symbols_are_raw_data() {
        let (mut stage, environment, _) = generator(100.0);
        stage.tick(10, Duration::from_secs(1));

        for symbol in environment.list().unwrap() {
            assert!(symbol.is_data());
            assert!(!symbol.aggregated);
            assert_eq!(symbol.value, symbol.origin);
        }
    }

    #[test]
    fn test_capacity_rejection_drops_symbol() {
        let (mut stage, environment, capacity) = generator(3.0);

        let report = stage.tick(5, Duration::from_secs(1));
        assert_eq!(report.moved, 3);
        assert_eq!(report.rejected, 2);
        assert_eq!(environment.count().unwrap(), 3);
        assert_eq!(capacity.total_usage().unwrap(), 3);
    }

    #[test]
    fn test_deterministic_under_seed() {
        let (mut a, env_a, _) = generator(100.0);
        let (mut b, env_b, _) = generator(100.0);

        a.tick(20, Duration::from_secs(1));
        b.tick(20, Duration::from_secs(1));

        let values_a: Vec<char> = env_a.list().unwrap().iter().map(|s| s.origin).collect();
        let values_b: Vec<char> = env_b.list().unwrap().iter().map(|s| s.origin).collect();
        assert_eq!(values_a, values_b);
    }

    #[test]
    fn test_zero_budget_is_noop() {
        let (mut stage, environment, _) = generator(100.0);
        let report = stage.tick(0, Duration::from_secs(1));
        assert_eq!(report.processed, 0);
        assert_eq!(environment.count().unwrap(), 0);
    }
}
