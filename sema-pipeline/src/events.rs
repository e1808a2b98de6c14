//! Sistema de eventos do pipeline
//!
//! Os contadores e avisos dos estágios são expostos por inscrição, nunca
//! por escrita direta em dashboards: observadores assinam filtros no
//! [`EventBus`] (ou no bus lock-free) e recebem [`PipelineEvent`]s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use sema_core::Channel;

use crate::error::PipelineResult;
use crate::stages::{StageId, TickReport};

/// Evento do pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Estágio iniciado
    StageStarted { stage: StageId },
    /// Estágio parado
    StageStopped { stage: StageId },
    /// Tick concluído com seus contadores
    StageTick { stage: StageId, report: TickReport },
    /// Admissão rejeitada por capacidade; registro destruído
    CapacityFull {
        stage: StageId,
        channel: Option<Channel>,
        usage: u64,
        capacity: f64,
    },
    /// Marca d'água de capacidade cruzada
    CapacityWarning {
        channel: Option<Channel>,
        usage: u64,
        capacity: f64,
    },
    /// Unidade agregada emitida pelo Converter
    AggregateEmitted {
        value: char,
        channel: Option<Channel>,
        threshold: u32,
    },
    /// Delta aplicado ao comprimento de um canal (aresta de feedback)
    ChannelDelta {
        channel: Channel,
        delta: f64,
        side: f64,
    },
    /// Símbolo sem mapeamento pulado (registro intocado)
    SymbolSkipped { stage: StageId, value: char },
    /// Falha de store; tick abandonado
    StoreFault { stage: StageId, message: String },
}

/// Handler de eventos (callback)
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Filtro de eventos
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// Todos os eventos
    All,
    /// Eventos de um estágio específico
    Stage(StageId),
    /// Ticks concluídos
    Tick,
    /// Rejeições e avisos de capacidade
    Capacity,
    /// Emissões de agregado
    Aggregate,
    /// Deltas da aresta de feedback
    Delta,
    /// Falhas de store e símbolos pulados
    Fault,
}

impl EventFilter {
    /// Verifica se um evento passa pelo filtro
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match (self, event) {
            (EventFilter::All, _) => true,
            (EventFilter::Stage(stage), PipelineEvent::StageStarted { stage: s }) => stage == s,
            (EventFilter::Stage(stage), PipelineEvent::StageStopped { stage: s }) => stage == s,
            (EventFilter::Stage(stage), PipelineEvent::StageTick { stage: s, .. }) => stage == s,
            (EventFilter::Stage(stage), PipelineEvent::CapacityFull { stage: s, .. }) => stage == s,
            (EventFilter::Stage(stage), PipelineEvent::SymbolSkipped { stage: s, .. }) => {
                stage == s
            }
            (EventFilter::Stage(stage), PipelineEvent::StoreFault { stage: s, .. }) => stage == s,
            (EventFilter::Tick, PipelineEvent::StageTick { .. }) => true,
            (EventFilter::Capacity, PipelineEvent::CapacityFull { .. }) => true,
            (EventFilter::Capacity, PipelineEvent::CapacityWarning { .. }) => true,
            (EventFilter::Aggregate, PipelineEvent::AggregateEmitted { .. }) => true,
            (EventFilter::Delta, PipelineEvent::ChannelDelta { .. }) => true,
            (EventFilter::Fault, PipelineEvent::StoreFault { .. }) => true,
            (EventFilter::Fault, PipelineEvent::SymbolSkipped { .. }) => true,
            _ => false,
        }
    }
}

/// Bus de eventos
#[derive(Clone)]
pub struct EventBus {
    /// Handlers registrados por filtro
    handlers: Arc<Mutex<HashMap<EventFilter, Vec<EventHandler>>>>,
    /// Histórico de eventos (limitado)
    history: Arc<Mutex<Vec<PipelineEvent>>>,
    /// Tamanho máximo do histórico
    max_history: usize,
}

impl EventBus {
    /// Cria novo bus de eventos
    pub fn new() -> Self {
        Self::with_history(100)
    }

    /// Cria com tamanho de histórico customizado
    pub fn with_history(max_history: usize) -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            history: Arc::new(Mutex::new(Vec::new())),
            max_history,
        }
    }

    /// Registra handler para um filtro
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> PipelineResult<()>
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock()?;
        handlers.entry(filter).or_default().push(Arc::new(handler));
        Ok(())
    }

    /// Remove todos os handlers de um filtro
    pub fn unsubscribe(&self, filter: &EventFilter) -> PipelineResult<()> {
        let mut handlers = self.handlers.lock()?;
        handlers.remove(filter);
        Ok(())
    }

    /// Emite um evento
    pub fn emit(&self, event: PipelineEvent) -> PipelineResult<()> {
        {
            let mut history = self.history.lock()?;
            history.push(event.clone());

            if history.len() > self.max_history {
                history.remove(0);
            }
        }

        let handlers = self.handlers.lock()?;
        for (filter, handler_list) in handlers.iter() {
            if filter.matches(&event) {
                for handler in handler_list {
                    handler(&event);
                }
            }
        }

        Ok(())
    }

    /// Retorna histórico de eventos
    pub fn history(&self) -> PipelineResult<Vec<PipelineEvent>> {
        let history = self.history.lock()?;
        Ok(history.clone())
    }

    /// Limpa histórico
    pub fn clear_history(&self) -> PipelineResult<()> {
        let mut history = self.history.lock()?;
        history.clear();
        Ok(())
    }

    /// Conta handlers registrados
    pub fn handler_count(&self) -> PipelineResult<usize> {
        let handlers = self.handlers.lock()?;
        Ok(handlers.values().map(|v| v.len()).sum())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("max_history", &self.max_history)
            .field(
                "history_len",
                &self.history.lock().map(|h| h.len()).unwrap_or(0),
            )
            .finish()
    }
}

/// Saída de eventos dos estágios
///
/// Emissão é melhor-esforço: uma falha de lock no bus nunca abandona um
/// tick. Encaminha para o bus com handlers e para o bus lock-free.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
    lockfree: Arc<crate::lockfree::LockFreeEventBus>,
}

impl EventSink {
    /// Cria saída sobre os dois buses
    pub fn new(bus: Arc<EventBus>, lockfree: Arc<crate::lockfree::LockFreeEventBus>) -> Self {
        Self { bus, lockfree }
    }

    /// Emite um evento nos dois buses
    pub fn emit(&self, event: PipelineEvent) {
        self.lockfree.emit(event.clone());
        if let Err(err) = self.bus.emit(event) {
            tracing::warn!(error = %err, "event bus emit failed");
        }
    }

    /// Bus com handlers
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Bus lock-free
    pub fn lockfree(&self) -> &Arc<crate::lockfree::LockFreeEventBus> {
        &self.lockfree
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tick_event(stage: StageId) -> PipelineEvent {
        PipelineEvent::StageTick {
            stage,
            report: TickReport::default(),
        }
    }

    #[test]
    fn test_event_bus_new() {
        let bus = EventBus::new();
        assert_eq!(bus.handler_count().unwrap(), 0);
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        bus.subscribe(EventFilter::All, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        bus.emit(tick_event(StageId::Generator)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stage_filter() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        bus.subscribe(EventFilter::Stage(StageId::Pool), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        bus.emit(tick_event(StageId::Pool)).unwrap();
        bus.emit(tick_event(StageId::Uptake)).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capacity_filter() {
        let filter = EventFilter::Capacity;

        let full = PipelineEvent::CapacityFull {
            stage: StageId::Generator,
            channel: None,
            usage: 5,
            capacity: 5.0,
        };
        assert!(filter.matches(&full));

        let warning = PipelineEvent::CapacityWarning {
            channel: Some(Channel::Nc1),
            usage: 9,
            capacity: 10.0,
        };
        assert!(filter.matches(&warning));

        assert!(!filter.matches(&tick_event(StageId::Generator)));
    }

    #[test]
    fn test_fault_filter() {
        let filter = EventFilter::Fault;

        assert!(filter.matches(&PipelineEvent::StoreFault {
            stage: StageId::Pool,
            message: "down".into(),
        }));
        assert!(filter.matches(&PipelineEvent::SymbolSkipped {
            stage: StageId::Pool,
            value: '?',
        }));
        assert!(!filter.matches(&tick_event(StageId::Pool)));
    }

    #[test]
    fn test_history_limit() {
        let bus = EventBus::with_history(2);

        for _ in 0..5 {
            bus.emit(tick_event(StageId::Generator)).unwrap();
        }

        assert_eq!(bus.history().unwrap().len(), 2);
    }

    #[test]
    fn test_clear_history() {
        let bus = EventBus::new();
        bus.emit(tick_event(StageId::Generator)).unwrap();
        assert_eq!(bus.history().unwrap().len(), 1);

        bus.clear_history().unwrap();
        assert_eq!(bus.history().unwrap().len(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        bus.subscribe(EventFilter::All, |_| {}).unwrap();
        assert_eq!(bus.handler_count().unwrap(), 1);

        bus.unsubscribe(&EventFilter::All).unwrap();
        assert_eq!(bus.handler_count().unwrap(), 0);
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = PipelineEvent::AggregateEmitted {
            value: 'A',
            channel: Some(Channel::Nc1),
            threshold: 9,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
