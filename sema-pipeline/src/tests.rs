//! Testes integrados do pipeline completo

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sema_capacity::{CapacityOracle, FixedOracle, NullMutator, TokenClass, TriangleGeometry};
use sema_core::{Symbol, SymbolId, channel_of};
use sema_store::{MemoryStore, StoreError, StoreResult, SymbolStore};

use crate::config::PipelineConfig;
use crate::events::{EventFilter, PipelineEvent};
use crate::pipeline::{PipelineStores, SymbolPipeline};
use crate::stages::StageId;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Store que injeta falhas de backend sob demanda
struct FlakyStore {
    inner: MemoryStore,
    fail_appends: AtomicBool,
}

impl FlakyStore {
    fn new(name: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(name),
            fail_appends: AtomicBool::new(false),
        }
    }

    fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

impl SymbolStore for FlakyStore {
    fn append(&self, symbol: Symbol) -> StoreResult<SymbolId> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected append failure".into()));
        }
        self.inner.append(symbol)
    }

    fn get(&self, id: SymbolId) -> StoreResult<Symbol> {
        self.inner.get(id)
    }

    fn list(&self) -> StoreResult<Vec<Symbol>> {
        self.inner.list()
    }

    fn list_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<Vec<Symbol>> {
        self.inner.list_where(predicate)
    }

    fn take(&self, id: SymbolId) -> StoreResult<Symbol> {
        self.inner.take(id)
    }

    fn remove(&self, id: SymbolId) -> StoreResult<()> {
        self.inner.remove(id)
    }

    fn remove_where(&self, predicate: &dyn Fn(&Symbol) -> bool) -> StoreResult<usize> {
        self.inner.remove_where(predicate)
    }

    fn clear(&self) -> StoreResult<()> {
        self.inner.clear()
    }

    fn count(&self) -> StoreResult<usize> {
        self.inner.count()
    }
}

fn noisy_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.uptake_loss_percent = 100.0;
    config.intake_data_percent = 0.0;
    config.intake_entropy_percent = 100.0;
    config.channel_rates = [3.0, 3.0, 3.0];
    config.recycler_rate = 3.0;
    config.seed = 99;
    config
}

/// Um passe completo por todos os estágios com o tempo decorrido dado
fn sweep(pipeline: &mut SymbolPipeline, elapsed: Duration) {
    for stage in StageId::all() {
        pipeline.tick_stage(stage, elapsed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTES DE INTEGRAÇÃO - fluxo completo
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_generation_flows_downstream() {
    let mut pipeline = SymbolPipeline::new(PipelineConfig::default()).unwrap();

    for _ in 0..4 {
        sweep(&mut pipeline, Duration::from_secs(2));
    }

    let generated = pipeline.counters(StageId::Generator).unwrap().moved;
    assert!(generated > 0);

    // Tudo que existe nos stores foi admitido pelo ledger
    let population = pipeline.stores().total_count().unwrap() as u64;
    assert_eq!(pipeline.capacity().total_usage().unwrap(), population);
}

#[test]
fn test_full_loop_recycles_noise_and_feeds_back() {
    let geometry = Arc::new(TriangleGeometry::equilateral(30.0));
    let mut pipeline =
        SymbolPipeline::with_collaborators(noisy_config(), geometry.clone(), geometry.clone())
            .unwrap();

    for _ in 0..8 {
        sweep(&mut pipeline, Duration::from_secs(2));
    }

    // Ruído atravessou os canais e voltou ao ambiente como forma crua
    let recycled = pipeline.counters(StageId::Recycler).unwrap().moved;
    assert!(recycled > 0, "recycler should have returned noise");

    let environment = pipeline.stores().environment.list().unwrap();
    assert!(
        environment.iter().any(|s| s.is_data() && s.value == s.origin),
        "environment should hold recycled raw symbols"
    );

    // A aresta de feedback mudou a geometria (só entropia flui: lados crescem)
    assert!(geometry.total_capacity().unwrap() > 90.0);
}

#[test]
fn test_channel_assignment_is_stable_everywhere() {
    let mut pipeline = SymbolPipeline::new(noisy_config()).unwrap();

    for _ in 0..6 {
        sweep(&mut pipeline, Duration::from_secs(2));
    }

    let stores = pipeline.stores();
    let mut all_records = Vec::new();
    all_records.extend(stores.environment.list().unwrap());
    all_records.extend(stores.uptake.list().unwrap());
    all_records.extend(stores.pool.list().unwrap());
    all_records.extend(stores.converted.list().unwrap());
    for store in stores.intake.iter().chain(stores.update.iter()) {
        all_records.extend(store.list().unwrap());
    }

    assert!(!all_records.is_empty());
    for symbol in all_records {
        assert_eq!(
            symbol.channel,
            channel_of(symbol.origin),
            "channel must stay the table assignment for {}",
            symbol.origin
        );
    }
}

#[test]
fn test_aggregation_scenario_nine_a() {
    let mut config = PipelineConfig::default();
    config.converter_rate = 3.0;
    let mut pipeline = SymbolPipeline::new(config).unwrap();

    // Nove 'A' crus direto no pool, com contabilidade
    for _ in 0..9 {
        pipeline
            .capacity()
            .try_admit(TokenClass::Data, None)
            .unwrap();
        pipeline
            .stores()
            .pool
            .append(Symbol::data('A').unwrap())
            .unwrap();
    }

    let report = pipeline.tick_stage(StageId::Converter, Duration::from_secs(3));
    assert_eq!(report.aggregated, 1);

    let words: Vec<Symbol> = pipeline
        .stores()
        .converted
        .list_where(&|s| s.aggregated)
        .unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].origin, 'A');

    // Delta líquido no ledger: -9 Data, +1 agregado
    assert_eq!(
        pipeline
            .capacity()
            .usage_of(TokenClass::Data, None)
            .unwrap(),
        0
    );
    assert_eq!(
        pipeline
            .capacity()
            .usage_of(TokenClass::Aggregate, None)
            .unwrap(),
        1
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTES DE INTEGRAÇÃO - capacidade
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_capacity_invariant_under_pressure() {
    let oracle = Arc::new(FixedOracle::new(5.0));
    let mut pipeline = SymbolPipeline::with_collaborators(
        PipelineConfig::default(),
        oracle,
        Arc::new(NullMutator),
    )
    .unwrap();

    let report = pipeline.tick_stage(StageId::Generator, Duration::from_secs(3));

    assert_eq!(report.moved, 5);
    assert!(report.rejected > 0);
    assert_eq!(pipeline.capacity().total_usage().unwrap(), 5);

    // Rejeições viraram eventos capacity_full
    let full_events = pipeline
        .events()
        .iter()
        .filter(|e| matches!(e, PipelineEvent::CapacityFull { .. }))
        .count();
    assert_eq!(full_events as u64, report.rejected);
}

#[test]
fn test_out_of_band_shrink_is_reported_not_truncated() {
    let oracle = Arc::new(FixedOracle::new(20.0));
    let mut pipeline = SymbolPipeline::with_collaborators(
        PipelineConfig::default(),
        oracle.clone(),
        Arc::new(NullMutator),
    )
    .unwrap();

    pipeline.tick_stage(StageId::Generator, Duration::from_secs(2));
    let usage = pipeline.capacity().total_usage().unwrap();
    assert!(usage > 4);

    // Capacidade encolhe por fora entre ticks
    oracle.set_total(4.0).unwrap();

    let violations = pipeline.revalidate_capacity().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(pipeline.capacity().total_usage().unwrap(), usage);

    assert!(
        pipeline
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::CapacityWarning { .. }))
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTES DE INTEGRAÇÃO - falhas e contenção
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_store_failure_abandons_tick_without_corruption() {
    let flaky = Arc::new(FlakyStore::new("uptake"));
    let mut stores = PipelineStores::in_memory();
    stores.uptake = flaky.clone();

    let mut pipeline = SymbolPipeline::with_parts(
        PipelineConfig::default(),
        stores,
        Arc::new(FixedOracle::new(100.0)),
        Arc::new(NullMutator),
    )
    .unwrap();

    pipeline.tick_stage(StageId::Generator, Duration::from_secs(1));
    let before = pipeline.stores().environment.count().unwrap();
    assert!(before > 0);

    flaky.fail_appends(true);
    let report = pipeline.tick_stage(StageId::Uptake, Duration::from_secs(1));

    // Tick abandonado; registro restaurado na origem
    assert!(report.faulted());
    assert_eq!(pipeline.stores().environment.count().unwrap(), before);
    assert_eq!(
        pipeline.counters(StageId::Uptake).unwrap().store_faults,
        1
    );
    assert!(
        pipeline
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::StoreFault { stage: StageId::Uptake, .. }))
    );

    // Próximo tick agendado tenta de novo e progride
    flaky.fail_appends(false);
    let report = pipeline.tick_stage(StageId::Uptake, Duration::from_secs(1));
    assert!(!report.faulted());
    assert!(report.moved > 0);
}

#[test]
fn test_stage_failure_never_halts_other_stages() {
    let flaky = Arc::new(FlakyStore::new("pool"));
    let mut stores = PipelineStores::in_memory();
    stores.pool = flaky.clone();

    let mut pipeline = SymbolPipeline::with_parts(
        PipelineConfig::default(),
        stores,
        Arc::new(FixedOracle::new(100.0)),
        Arc::new(NullMutator),
    )
    .unwrap();

    flaky.fail_appends(true);
    for _ in 0..3 {
        sweep(&mut pipeline, Duration::from_secs(1));
    }

    // O Pool falha, mas Generator e Uptake continuam progredindo
    assert!(pipeline.counters(StageId::Pool).unwrap().store_faults > 0);
    assert!(pipeline.counters(StageId::Generator).unwrap().moved > 0);
    assert!(pipeline.counters(StageId::Uptake).unwrap().moved > 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTES DE INTEGRAÇÃO - determinismo, eventos, runtime
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_same_seed_same_trajectory() {
    let mut config = noisy_config();
    config.uptake_loss_percent = 50.0;
    config.pool_loss_percent = 30.0;

    let mut a = SymbolPipeline::new(config.clone()).unwrap();
    let mut b = SymbolPipeline::new(config).unwrap();

    for _ in 0..5 {
        sweep(&mut a, Duration::from_secs(2));
        sweep(&mut b, Duration::from_secs(2));
    }

    assert_eq!(a.snapshot().unwrap(), b.snapshot().unwrap());
    assert_eq!(
        a.stores().total_count().unwrap(),
        b.stores().total_count().unwrap()
    );
}

#[test]
fn test_lockfree_subscription_sees_ticks() {
    let mut pipeline = SymbolPipeline::new(PipelineConfig::default()).unwrap();
    let subscription = pipeline.subscribe();

    pipeline.tick_stage(StageId::Generator, Duration::from_secs(1));

    let ticks = subscription
        .try_iter()
        .filter(|e| matches!(e, PipelineEvent::StageTick { .. }))
        .count();
    assert_eq!(ticks, 1);
}

#[test]
fn test_event_bus_handler_sees_capacity_events() {
    let oracle = Arc::new(FixedOracle::new(2.0));
    let mut pipeline = SymbolPipeline::with_collaborators(
        PipelineConfig::default(),
        oracle,
        Arc::new(NullMutator),
    )
    .unwrap();

    let seen = Arc::new(AtomicBool::new(false));
    let seen_clone = seen.clone();
    pipeline
        .bus()
        .subscribe(EventFilter::Capacity, move |_| {
            seen_clone.store(true, Ordering::SeqCst);
        })
        .unwrap();

    pipeline.tick_stage(StageId::Generator, Duration::from_secs(2));
    assert!(seen.load(Ordering::SeqCst));
}

#[test]
fn test_invalid_runtime_setter_keeps_prior_value() {
    let mut pipeline = SymbolPipeline::new(PipelineConfig::default()).unwrap();

    assert!(pipeline.set_rate(StageId::Pool, -5.0).is_err());
    assert_eq!(pipeline.config().pool_rate, 3.0);

    assert!(pipeline.set_loss_percent(StageId::Uptake, 400.0).is_err());
    assert_eq!(pipeline.config().uptake_loss_percent, 0.0);

    assert!(pipeline.set_intake_split(90.0, 20.0).is_err());
    assert_eq!(pipeline.config().intake_data_percent, 50.0);

    // Perda só existe em estágios com classificador
    assert!(pipeline.set_loss_percent(StageId::Recycler, 10.0).is_err());
}

#[test]
fn test_run_for_makes_progress_and_stops() {
    let mut config = PipelineConfig::default();
    config.generator_rate = 40.0;
    let mut pipeline = SymbolPipeline::new(config).unwrap();

    pipeline.run_for(Duration::from_millis(300));

    assert!(pipeline.counters(StageId::Generator).unwrap().ticks > 0);
    assert!(pipeline.counters(StageId::Generator).unwrap().moved > 0);
    for stage in StageId::all() {
        assert!(!pipeline.is_running(stage));
    }
}

#[test]
fn test_zero_rate_stage_never_starts() {
    let mut config = PipelineConfig::default();
    config.recycler_rate = 0.0;
    let mut pipeline = SymbolPipeline::new(config).unwrap();

    assert!(pipeline.start_stage(StageId::Recycler).is_none());
    assert!(!pipeline.is_running(StageId::Recycler));

    // Os demais sobem normalmente
    let handles = pipeline.start();
    assert_eq!(handles.len(), 6);
    pipeline.stop();
}

#[test]
fn test_cancellation_token_stops_single_stage() {
    let mut pipeline = SymbolPipeline::new(PipelineConfig::default()).unwrap();
    let handles = pipeline.start();

    let generator_handle = handles
        .iter()
        .find(|h| h.stage() == StageId::Generator)
        .unwrap();
    generator_handle.cancel();

    pipeline.poll(std::time::Instant::now() + Duration::from_secs(2));
    assert!(!pipeline.is_running(StageId::Generator));
    assert!(pipeline.is_running(StageId::Uptake));
    pipeline.stop();
}
