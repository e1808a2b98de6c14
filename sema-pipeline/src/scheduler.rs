//! Scheduler cooperativo dos estágios
//!
//! Um único scheduler é dono de todos os timers: cada estágio tem seu
//! intervalo (`1s / taxa`), seu deadline e seu token de cancelamento.
//! Nenhum estágio re-entra o próprio tick — um estágio atrasado executa
//! uma vez com o tempo decorrido acumulado (o orçamento absorve o
//! backlog), nunca concorrentemente.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::stages::StageId;

/// Token de cancelamento de um estágio
///
/// Cancelar só impede ticks futuros de serem agendados; um tick em
/// andamento roda até o fim.
#[derive(Debug, Clone)]
pub struct StageHandle {
    stage: StageId,
    running: Arc<AtomicBool>,
}

impl StageHandle {
    /// Estágio controlado pelo token
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Cancela ticks futuros do estágio
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Verifica se o token foi cancelado
    pub fn is_cancelled(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }
}

/// Tick devido retornado por [`StageScheduler::poll`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueTick {
    /// Estágio devido
    pub stage: StageId,
    /// Tempo decorrido desde o último tick do estágio
    pub elapsed: Duration,
}

/// Estatísticas de agendamento de um estágio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageScheduleStats {
    /// Taxa configurada (símbolos/s)
    pub rate: f64,
    /// Estágio rodando?
    pub running: bool,
    /// Ticks executados
    pub ticks: u64,
    /// Ticks perdidos (atraso > 2 intervalos)
    pub missed: u64,
    /// Tempo médio de execução
    pub avg_execution: Duration,
    /// Tempo mínimo de execução
    pub min_execution: Duration,
    /// Tempo máximo de execução
    pub max_execution: Duration,
}

#[derive(Debug)]
struct Slot {
    rate: f64,
    running: Arc<AtomicBool>,
    next_due: Option<Instant>,
    last_tick: Option<Instant>,
    ticks: u64,
    missed: u64,
    total_execution: Duration,
    min_execution: Option<Duration>,
    max_execution: Option<Duration>,
}

impl Slot {
    fn new() -> Self {
        Self {
            rate: 0.0,
            running: Arc::new(AtomicBool::new(false)),
            next_due: None,
            last_tick: None,
            ticks: 0,
            missed: 0,
            total_execution: Duration::ZERO,
            min_execution: None,
            max_execution: None,
        }
    }

    fn interval(&self) -> Option<Duration> {
        if self.rate > 0.0 {
            Some(Duration::from_secs_f64(1.0 / self.rate))
        } else {
            None
        }
    }

    fn halt(&mut self) {
        self.running.store(false, Ordering::Release);
        self.next_due = None;
        self.last_tick = None;
    }
}

/// Scheduler cooperativo dono de todos os timers de estágio
#[derive(Debug)]
pub struct StageScheduler {
    slots: [Slot; 7],
}

impl StageScheduler {
    /// Cria scheduler com todos os estágios parados
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::new()),
        }
    }

    fn slot(&self, stage: StageId) -> &Slot {
        &self.slots[stage.index()]
    }

    fn slot_mut(&mut self, stage: StageId) -> &mut Slot {
        &mut self.slots[stage.index()]
    }

    /// Taxa configurada do estágio
    pub fn rate(&self, stage: StageId) -> f64 {
        self.slot(stage).rate
    }

    /// Define a taxa do estágio
    ///
    /// Com o estágio rodando, reinicia o agendamento no novo intervalo sem
    /// perder registros enfileirados (eles vivem nos stores). Taxa 0 para
    /// o estágio.
    pub fn set_rate(&mut self, stage: StageId, rate: f64, now: Instant) {
        let slot = self.slot_mut(stage);
        slot.rate = rate.max(0.0);

        if slot.running.load(Ordering::Acquire) {
            match slot.interval() {
                Some(interval) => slot.next_due = Some(now + interval),
                None => slot.halt(),
            }
        }
    }

    /// Inicia o estágio; idempotente enquanto rodando
    ///
    /// Taxa ≤ 0 torna o start um no-op e nenhum token é emitido.
    pub fn start(&mut self, stage: StageId, now: Instant) -> Option<StageHandle> {
        let slot = self.slot_mut(stage);
        let interval = slot.interval()?;

        if !slot.running.load(Ordering::Acquire) {
            slot.running.store(true, Ordering::Release);
            slot.last_tick = Some(now);
            slot.next_due = Some(now + interval);
        }

        Some(StageHandle {
            stage,
            running: Arc::clone(&slot.running),
        })
    }

    /// Para o estágio; só impede ticks futuros
    pub fn stop(&mut self, stage: StageId) {
        self.slot_mut(stage).halt();
    }

    /// Verifica se o estágio está rodando
    pub fn is_running(&self, stage: StageId) -> bool {
        let slot = self.slot(stage);
        slot.running.load(Ordering::Acquire) && slot.next_due.is_some()
    }

    /// Orçamento de registros para um tick
    pub fn budget(&self, stage: StageId, elapsed: Duration) -> usize {
        (self.slot(stage).rate * elapsed.as_secs_f64()).floor() as usize
    }

    /// Coleta os estágios devidos até `now`, em ordem de fluxo
    ///
    /// Avança cada deadline em um intervalo a partir de `now`; atraso
    /// acumulado vira tempo decorrido maior (e orçamento maior) no próximo
    /// tick, nunca ticks sobrepostos.
    pub fn poll(&mut self, now: Instant) -> Vec<DueTick> {
        let mut due = Vec::new();

        for stage in StageId::all() {
            let slot = self.slot_mut(stage);

            // Token cancelado por fora: transiciona para parado
            if slot.next_due.is_some() && !slot.running.load(Ordering::Acquire) {
                slot.halt();
                continue;
            }

            let Some(deadline) = slot.next_due else {
                continue;
            };
            if deadline > now {
                continue;
            }
            let Some(interval) = slot.interval() else {
                slot.halt();
                continue;
            };

            let elapsed = slot
                .last_tick
                .map(|last| now.duration_since(last))
                .unwrap_or(interval);

            if elapsed > interval * 2 {
                let behind =
                    (elapsed.as_secs_f64() / interval.as_secs_f64()) as u64 - 1;
                slot.missed += behind;
            }

            slot.ticks += 1;
            slot.last_tick = Some(now);
            slot.next_due = Some(now + interval);

            due.push(DueTick { stage, elapsed });
        }

        due
    }

    /// Deadline mais próximo entre os estágios rodando
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter(|slot| slot.running.load(Ordering::Acquire))
            .filter_map(|slot| slot.next_due)
            .min()
    }

    /// Registra o tempo de execução de um tick
    pub fn record_execution(&mut self, stage: StageId, duration: Duration) {
        let slot = self.slot_mut(stage);
        slot.total_execution += duration;

        if slot.min_execution.is_none_or(|min| duration < min) {
            slot.min_execution = Some(duration);
        }
        if slot.max_execution.is_none_or(|max| duration > max) {
            slot.max_execution = Some(duration);
        }
    }

    /// Estatísticas de agendamento do estágio
    pub fn stats(&self, stage: StageId) -> StageScheduleStats {
        let slot = self.slot(stage);
        let avg_execution = if slot.ticks > 0 {
            slot.total_execution / slot.ticks as u32
        } else {
            Duration::ZERO
        };

        StageScheduleStats {
            rate: slot.rate,
            running: self.is_running(stage),
            ticks: slot.ticks,
            missed: slot.missed,
            avg_execution,
            min_execution: slot.min_execution.unwrap_or(Duration::ZERO),
            max_execution: slot.max_execution.unwrap_or(Duration::ZERO),
        }
    }
}

impl Default for StageScheduler {
    fn default() -> Self {
        Self::new()
    }
}
