//! Fachada do pipeline
//!
//! O [`SymbolPipeline`] monta stores, ledger de capacidade, estágios e
//! scheduler a partir de uma configuração validada e dirige o loop
//! cooperativo. Todos os contadores saem pelo [`PipelineState`] e pelos
//! buses de eventos; nenhum estágio conhece o mundo externo.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sema_capacity::{
    CapacityLedger, CapacityManager, CapacityOracle, CapacityViolation, ChannelMutator,
    TriangleGeometry,
};
use sema_core::{Aggregator, Channel, Classifier};
use sema_store::{MemoryStore, SymbolStore};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventBus, EventSink, PipelineEvent};
use crate::lockfree::{LockFreeEventBus, Subscription};
use crate::scheduler::{StageHandle, StageScheduler};
use crate::stages::{
    ChannelIntake, ChannelUpdate, Converter, Generator, Pool, Recycler, Stage, StageId,
    TickReport, Uptake,
};
use crate::state::{PipelineSnapshot, PipelineState, StageCounters};

/// Buffers do pipeline, um store por aresta do grafo
#[derive(Clone)]
pub struct PipelineStores {
    /// Ambiente (origem do Generator, destino do Recycler)
    pub environment: Arc<dyn SymbolStore>,
    /// Captação
    pub uptake: Arc<dyn SymbolStore>,
    /// Pool
    pub pool: Arc<dyn SymbolStore>,
    /// Convertidos (palavras e ruído aguardando roteamento)
    pub converted: Arc<dyn SymbolStore>,
    /// Entradas por canal (NC1, NC2, NC3)
    pub intake: [Arc<dyn SymbolStore>; 3],
    /// Atualizações por canal — a fonte filtrada do Recycler
    pub update: [Arc<dyn SymbolStore>; 3],
}

impl PipelineStores {
    /// Cria o conjunto completo de stores em memória
    pub fn in_memory() -> Self {
        Self {
            environment: Arc::new(MemoryStore::new("environment")),
            uptake: Arc::new(MemoryStore::new("uptake")),
            pool: Arc::new(MemoryStore::new("pool")),
            converted: Arc::new(MemoryStore::new("converted")),
            intake: [
                Arc::new(MemoryStore::new("intake-nc1")),
                Arc::new(MemoryStore::new("intake-nc2")),
                Arc::new(MemoryStore::new("intake-nc3")),
            ],
            update: [
                Arc::new(MemoryStore::new("update-nc1")),
                Arc::new(MemoryStore::new("update-nc2")),
                Arc::new(MemoryStore::new("update-nc3")),
            ],
        }
    }

    /// Contagem total de registros em todos os stores
    pub fn total_count(&self) -> PipelineResult<usize> {
        let mut total = self.environment.count()?
            + self.uptake.count()?
            + self.pool.count()?
            + self.converted.count()?;
        for store in self.intake.iter().chain(self.update.iter()) {
            total += store.count()?;
        }
        Ok(total)
    }
}

impl std::fmt::Debug for PipelineStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStores").finish()
    }
}

/// Pipeline completo da economia de símbolos
pub struct SymbolPipeline {
    config: PipelineConfig,
    stores: PipelineStores,
    capacity: Arc<CapacityManager>,
    state: Arc<PipelineState>,
    sink: EventSink,
    scheduler: StageScheduler,
    generator: Generator,
    uptake: Uptake,
    pool: Pool,
    converter: Converter,
    channel_intake: ChannelIntake,
    channel_update: ChannelUpdate,
    recycler: Recycler,
}

impl SymbolPipeline {
    /// Cria pipeline com geometria triangular própria
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let geometry = Arc::new(TriangleGeometry::equilateral(config.initial_side));
        Self::with_collaborators(config, geometry.clone(), geometry)
    }

    /// Cria pipeline sobre colaboradores externos de capacidade
    pub fn with_collaborators(
        config: PipelineConfig,
        oracle: Arc<dyn CapacityOracle>,
        mutator: Arc<dyn ChannelMutator>,
    ) -> PipelineResult<Self> {
        Self::with_parts(config, PipelineStores::in_memory(), oracle, mutator)
    }

    /// Cria pipeline sobre stores e colaboradores externos
    pub fn with_parts(
        config: PipelineConfig,
        stores: PipelineStores,
        oracle: Arc<dyn CapacityOracle>,
        mutator: Arc<dyn ChannelMutator>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let capacity =
            Arc::new(CapacityManager::new(oracle).with_warn_ratio(config.warn_ratio));
        let state = PipelineState::new();
        let bus = Arc::new(EventBus::with_history(config.event_history));
        let lockfree = Arc::new(LockFreeEventBus::new());
        let sink = EventSink::new(bus, lockfree);

        let seed = config.seed;
        let generator = Generator::new(
            stores.environment.clone(),
            capacity.clone(),
            sink.clone(),
            seed,
        );
        let uptake = Uptake::new(
            stores.environment.clone(),
            stores.uptake.clone(),
            capacity.clone(),
            sink.clone(),
            Classifier::from_percent(config.uptake_loss_percent)?,
            seed.wrapping_add(1),
        );
        let pool = Pool::new(
            stores.uptake.clone(),
            stores.pool.clone(),
            capacity.clone(),
            sink.clone(),
            Classifier::from_percent(config.pool_loss_percent)?,
            config.pool_data_preference_percent,
            seed.wrapping_add(2),
        );
        let converter = Converter::new(
            stores.pool.clone(),
            stores.converted.clone(),
            capacity.clone(),
            sink.clone(),
            Aggregator::new(config.aggregation_threshold),
        );
        let channel_intake = ChannelIntake::new(
            stores.converted.clone(),
            stores.intake.clone(),
            capacity.clone(),
            sink.clone(),
            config.intake_data_percent,
            config.intake_entropy_percent,
        );
        let mut channel_classifiers = [Classifier::default(); 3];
        for channel in Channel::all() {
            channel_classifiers[channel.index()] =
                Classifier::from_percent(config.channel_loss_percents[channel.index()])?;
        }
        let channel_update = ChannelUpdate::new(
            stores.intake.clone(),
            stores.update.clone(),
            capacity.clone(),
            mutator,
            sink.clone(),
            channel_classifiers,
            config.channel_rates,
            seed.wrapping_add(5),
        );
        let recycler = Recycler::new(
            stores.update.clone(),
            stores.environment.clone(),
            capacity.clone(),
            sink.clone(),
        );

        let mut scheduler = StageScheduler::new();
        let now = Instant::now();
        for stage in StageId::all() {
            scheduler.set_rate(stage, config.rate_of(stage), now);
        }

        Ok(Self {
            config,
            stores,
            capacity,
            state,
            sink,
            scheduler,
            generator,
            uptake,
            pool,
            converter,
            channel_intake,
            channel_update,
            recycler,
        })
    }

    /// Configuração corrente
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stores do pipeline
    pub fn stores(&self) -> &PipelineStores {
        &self.stores
    }

    /// Gestor de capacidade
    pub fn capacity(&self) -> &Arc<CapacityManager> {
        &self.capacity
    }

    /// Estado de contadores
    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }

    /// Bus de eventos com handlers
    pub fn bus(&self) -> &Arc<EventBus> {
        self.sink.bus()
    }

    /// Assina o bus lock-free
    pub fn subscribe(&self) -> Subscription {
        self.sink.lockfree().subscribe()
    }

    /// Histórico de eventos
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.sink.bus().history().unwrap_or_default()
    }

    // ─── Controle de estágios ───────────────────────────────────────────

    /// Inicia todos os estágios; retorna os tokens de cancelamento
    pub fn start(&mut self) -> Vec<StageHandle> {
        let now = Instant::now();
        let mut handles = Vec::new();
        for stage in StageId::all() {
            if let Some(handle) = self.scheduler.start(stage, now) {
                self.sink.emit(PipelineEvent::StageStarted { stage });
                handles.push(handle);
            }
        }
        handles
    }

    /// Para todos os estágios
    pub fn stop(&mut self) {
        for stage in StageId::all() {
            if self.scheduler.is_running(stage) {
                self.scheduler.stop(stage);
                self.sink.emit(PipelineEvent::StageStopped { stage });
            }
        }
    }

    /// Inicia um estágio; no-op com taxa ≤ 0
    pub fn start_stage(&mut self, stage: StageId) -> Option<StageHandle> {
        let handle = self.scheduler.start(stage, Instant::now());
        if handle.is_some() {
            self.sink.emit(PipelineEvent::StageStarted { stage });
        }
        handle
    }

    /// Para um estágio; ticks futuros não são mais agendados
    pub fn stop_stage(&mut self, stage: StageId) {
        if self.scheduler.is_running(stage) {
            self.scheduler.stop(stage);
            self.sink.emit(PipelineEvent::StageStopped { stage });
        }
    }

    /// Verifica se um estágio está rodando
    pub fn is_running(&self, stage: StageId) -> bool {
        self.scheduler.is_running(stage)
    }

    // ─── Execução ───────────────────────────────────────────────────────

    fn dispatch(&mut self, stage: StageId, budget: usize, elapsed: Duration) -> TickReport {
        let report = match stage {
            StageId::Generator => self.generator.tick(budget, elapsed),
            StageId::Uptake => self.uptake.tick(budget, elapsed),
            StageId::Pool => self.pool.tick(budget, elapsed),
            StageId::Converter => self.converter.tick(budget, elapsed),
            StageId::ChannelIntake => self.channel_intake.tick(budget, elapsed),
            StageId::ChannelUpdate => self.channel_update.tick(budget, elapsed),
            StageId::Recycler => self.recycler.tick(budget, elapsed),
        };

        if self.config.debug {
            eprintln!(
                "[DEBUG] {} tick: processed={} moved={} rejected={}",
                stage, report.processed, report.moved, report.rejected
            );
        }

        if let Err(err) = self.state.record_tick(stage, &report) {
            tracing::warn!(stage = %stage, error = %err, "state record failed");
        }
        self.sink.emit(PipelineEvent::StageTick {
            stage,
            report: report.clone(),
        });
        report
    }

    /// Executa um tick manual de um estágio com o tempo decorrido dado
    ///
    /// Orçamento = `floor(taxa × segundos)`, limitado adiante pelo que o
    /// store de origem contém. Para stepping determinístico em testes.
    pub fn tick_stage(&mut self, stage: StageId, elapsed: Duration) -> TickReport {
        let budget = (self.config.rate_of(stage) * elapsed.as_secs_f64()).floor() as usize;
        self.dispatch(stage, budget, elapsed)
    }

    /// Executa os estágios devidos até `now`
    pub fn poll(&mut self, now: Instant) -> Vec<(StageId, TickReport)> {
        let due = self.scheduler.poll(now);
        let mut reports = Vec::with_capacity(due.len());

        for tick in due {
            let budget = self.scheduler.budget(tick.stage, tick.elapsed);
            let started = Instant::now();
            let report = self.dispatch(tick.stage, budget, tick.elapsed);
            self.scheduler.record_execution(tick.stage, started.elapsed());
            reports.push((tick.stage, report));
        }
        reports
    }

    /// Roda o loop cooperativo pela duração dada e para os estágios
    pub fn run_for(&mut self, duration: Duration) {
        self.start();
        let end = Instant::now() + duration;

        loop {
            let now = Instant::now();
            if now >= end {
                break;
            }

            self.poll(now);

            match self.scheduler.next_deadline() {
                Some(deadline) => {
                    let target = deadline.min(end);
                    let now = Instant::now();
                    if target > now {
                        std::thread::sleep(target - now);
                    }
                }
                None => break,
            }
        }

        self.stop();
    }

    // ─── Parâmetros em tempo de execução ────────────────────────────────

    /// Atualiza a taxa de um estágio; reinicia o agendamento sem perder
    /// registros enfileirados
    pub fn set_rate(&mut self, stage: StageId, rate: f64) -> PipelineResult<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "{stage} rate = {rate}"
            )));
        }
        match stage {
            StageId::Generator => self.config.generator_rate = rate,
            StageId::Uptake => self.config.uptake_rate = rate,
            StageId::Pool => self.config.pool_rate = rate,
            StageId::Converter => self.config.converter_rate = rate,
            StageId::ChannelIntake => self.config.intake_rate = rate,
            StageId::Recycler => self.config.recycler_rate = rate,
            StageId::ChannelUpdate => {
                return Err(PipelineError::InvalidConfiguration(
                    "channel-update rates are per channel".into(),
                ));
            }
        }
        self.scheduler.set_rate(stage, rate, Instant::now());
        Ok(())
    }

    /// Atualiza a taxa de um canal do ChannelUpdate
    pub fn set_channel_rate(&mut self, channel: Channel, rate: f64) -> PipelineResult<()> {
        self.channel_update.set_rate(channel, rate)?;
        self.config.channel_rates[channel.index()] = rate;
        self.scheduler.set_rate(
            StageId::ChannelUpdate,
            self.config.rate_of(StageId::ChannelUpdate),
            Instant::now(),
        );
        Ok(())
    }

    /// Atualiza a perda de um estágio (%)
    pub fn set_loss_percent(&mut self, stage: StageId, percent: f64) -> PipelineResult<()> {
        match stage {
            StageId::Uptake => {
                self.uptake.set_loss_percent(percent)?;
                self.config.uptake_loss_percent = percent;
            }
            StageId::Pool => {
                self.pool.set_loss_percent(percent)?;
                self.config.pool_loss_percent = percent;
            }
            other => {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "{other} has no loss probability"
                )));
            }
        }
        Ok(())
    }

    /// Atualiza a perda de um canal do ChannelUpdate (%)
    pub fn set_channel_loss_percent(
        &mut self,
        channel: Channel,
        percent: f64,
    ) -> PipelineResult<()> {
        self.channel_update.set_loss_percent(channel, percent)?;
        self.config.channel_loss_percents[channel.index()] = percent;
        Ok(())
    }

    /// Atualiza a preferência de tipo do Pool (%)
    pub fn set_pool_data_preference(&mut self, percent: f64) -> PipelineResult<()> {
        self.pool.set_data_preference_percent(percent)?;
        self.config.pool_data_preference_percent = percent;
        Ok(())
    }

    /// Atualiza o par de percentuais do ChannelIntake
    pub fn set_intake_split(
        &mut self,
        data_percent: f64,
        entropy_percent: f64,
    ) -> PipelineResult<()> {
        self.channel_intake.set_split(data_percent, entropy_percent)?;
        self.config.intake_data_percent = data_percent;
        self.config.intake_entropy_percent = entropy_percent;
        Ok(())
    }

    /// Atualiza o threshold de agregação (0 desabilita)
    pub fn set_aggregation_threshold(&mut self, threshold: u32) {
        self.converter.set_threshold(threshold);
        self.config.aggregation_threshold = threshold;
    }

    // ─── Observabilidade ────────────────────────────────────────────────

    /// Contadores acumulados de um estágio
    pub fn counters(&self, stage: StageId) -> PipelineResult<StageCounters> {
        self.state.counters(stage)
    }

    /// Snapshot de contadores de todos os estágios
    pub fn snapshot(&self) -> PipelineResult<PipelineSnapshot> {
        self.state.snapshot()
    }

    /// Snapshot do ledger de capacidade
    pub fn ledger(&self) -> PipelineResult<CapacityLedger> {
        Ok(self.capacity.snapshot()?)
    }

    /// Revalida o uso contra o oráculo e emite avisos por violação
    pub fn revalidate_capacity(&self) -> PipelineResult<Vec<CapacityViolation>> {
        let violations = self.capacity.revalidate()?;
        for violation in &violations {
            self.sink.emit(PipelineEvent::CapacityWarning {
                channel: violation.channel,
                usage: violation.usage,
                capacity: violation.capacity,
            });
        }
        Ok(violations)
    }

    /// Estatísticas de agendamento de um estágio
    pub fn schedule_stats(&self, stage: StageId) -> crate::scheduler::StageScheduleStats {
        self.scheduler.stats(stage)
    }
}

impl std::fmt::Debug for SymbolPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolPipeline")
            .field("config", &self.config)
            .finish()
    }
}
