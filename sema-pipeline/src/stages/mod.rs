//! Estágios do pipeline
//!
//! Sete máquinas de estado instanciadas sobre o mesmo contrato: mover um
//! número limitado de registros por tick de um store para o próximo,
//! aplicando classificador e/ou agregador e consultando o gestor de
//! capacidade antes de admitir. O grafo é cíclico: o Recycler devolve
//! ruído ao store do Generator.
//!
//! ```text
//! Generator → Uptake → Pool → Converter → ChannelIntake → ChannelUpdate
//!     ▲                                                        │
//!     └──────────────────── Recycler ◄────────────────────────-┘
//! ```

pub mod channel_intake;
pub mod channel_update;
pub mod converter;
pub mod generator;
pub mod pool;
pub mod recycler;
pub mod uptake;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sema_capacity::{CapacityAlert, CapacityError, CapacityManager, TokenClass};
use sema_core::{Channel, Symbol};
use sema_store::SymbolStore;

use crate::error::PipelineResult;

pub use channel_intake::ChannelIntake;
pub use channel_update::ChannelUpdate;
pub use converter::Converter;
pub use generator::Generator;
pub use pool::Pool;
pub use recycler::Recycler;
pub use uptake::Uptake;

/// Identificador de estágio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    Generator = 0,
    Uptake = 1,
    Pool = 2,
    Converter = 3,
    ChannelIntake = 4,
    ChannelUpdate = 5,
    Recycler = 6,
}

impl StageId {
    /// Lista todos os estágios em ordem de fluxo
    pub fn all() -> [StageId; 7] {
        [
            StageId::Generator,
            StageId::Uptake,
            StageId::Pool,
            StageId::Converter,
            StageId::ChannelIntake,
            StageId::ChannelUpdate,
            StageId::Recycler,
        ]
    }

    /// Índice do estágio (0-6)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Estágio a jusante no fluxo linear
    ///
    /// O Recycler fecha o ciclo de volta ao store do Generator; o grafo
    /// não é acíclico e nenhum scheduler deve assumir ordem topológica.
    pub fn downstream(&self) -> Option<StageId> {
        match self {
            StageId::Generator => Some(StageId::Uptake),
            StageId::Uptake => Some(StageId::Pool),
            StageId::Pool => Some(StageId::Converter),
            StageId::Converter => Some(StageId::ChannelIntake),
            StageId::ChannelIntake => Some(StageId::ChannelUpdate),
            StageId::ChannelUpdate => Some(StageId::Recycler),
            StageId::Recycler => None,
        }
    }

    /// Nome do estágio
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Generator => "generator",
            StageId::Uptake => "uptake",
            StageId::Pool => "pool",
            StageId::Converter => "converter",
            StageId::ChannelIntake => "channel-intake",
            StageId::ChannelUpdate => "channel-update",
            StageId::Recycler => "recycler",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resultado de um tick de estágio
///
/// Conservação por estágio: `processados = movidos + rejeitados + pulados`
/// sobre os registros examinados; um fault abandona o tick e carrega os
/// contadores parciais.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Registros examinados
    pub processed: u64,
    /// Registros movidos (ou consumidos no estágio terminal)
    pub moved: u64,
    /// Conversões Data→Entropy neste tick
    pub converted: u64,
    /// Rejeições por capacidade (registro destruído)
    pub rejected: u64,
    /// Símbolos desconhecidos pulados (registro intocado)
    pub skipped: u64,
    /// Emissões de agregado
    pub aggregated: u64,
    /// Falha de store que abandonou o tick
    pub fault: Option<String>,
}

impl TickReport {
    /// Verifica se o tick foi abandonado por falha de store
    pub fn faulted(&self) -> bool {
        self.fault.is_some()
    }
}

/// Máquina de estados de um estágio
///
/// `tick` nunca falha para fora: toda falha é contida na borda do estágio
/// e reportada em [`TickReport::fault`] — um estágio jamais derruba o
/// scheduler nem outro estágio.
pub trait Stage: Send {
    /// Identificador do estágio
    fn id(&self) -> StageId;

    /// Executa um tick com o orçamento de registros dado
    fn tick(&mut self, budget: usize, elapsed: Duration) -> TickReport;
}

/// Classe de ocupação de um símbolo no ledger
pub(crate) fn token_class(symbol: &Symbol) -> TokenClass {
    if symbol.aggregated {
        TokenClass::Aggregate
    } else if symbol.is_data() {
        TokenClass::Data
    } else {
        TokenClass::Entropy
    }
}

/// Desfecho de uma transferência entre stores
pub(crate) enum Transfer {
    /// Movido; carrega o aviso de marca d'água, se houver
    Moved(Option<CapacityAlert>),
    /// Rejeitado por capacidade; registro destruído
    Rejected(CapacityError),
}

/// Move um registro entre stores com contabilidade de capacidade
///
/// Remoção atômica na origem, reclassificação no ledger, admissão no
/// destino. Rejeição destrói o registro (nunca re-enfileira). Falha de
/// store no destino restaura a origem: o registro fica intocado do ponto
/// de vista externo.
pub(crate) fn transfer_record(
    source: &Arc<dyn SymbolStore>,
    dest: &Arc<dyn SymbolStore>,
    capacity: &CapacityManager,
    original: &Symbol,
    outgoing: Symbol,
    source_channel: Option<Channel>,
    dest_channel: Option<Channel>,
) -> PipelineResult<Transfer> {
    let source_class = token_class(original);
    let dest_class = token_class(&outgoing);

    let taken = source.take(original.id)?;
    capacity.release(source_class, source_channel)?;

    match capacity.try_admit(dest_class, dest_channel) {
        Ok(alert) => {
            if let Err(err) = dest.append(outgoing) {
                // Restaura a origem: registro intocado
                capacity.release(dest_class, dest_channel)?;
                capacity.force_admit(source_class, source_channel)?;
                source.append(taken)?;
                return Err(err.into());
            }
            Ok(Transfer::Moved(alert))
        }
        Err(err) if err.is_rejection() => Ok(Transfer::Rejected(err)),
        Err(err) => Err(err.into()),
    }
}

/// Evento `capacity_full` a partir de uma rejeição
pub(crate) fn capacity_full_event(stage: StageId, err: &CapacityError) -> crate::events::PipelineEvent {
    match *err {
        CapacityError::Exceeded { usage, capacity } => crate::events::PipelineEvent::CapacityFull {
            stage,
            channel: None,
            usage,
            capacity,
        },
        CapacityError::ChannelExceeded {
            channel,
            usage,
            capacity,
        } => crate::events::PipelineEvent::CapacityFull {
            stage,
            channel: Some(channel),
            usage,
            capacity,
        },
        ref other => crate::events::PipelineEvent::StoreFault {
            stage,
            message: other.to_string(),
        },
    }
}

/// Evento de marca d'água a partir de um aviso de admissão
pub(crate) fn warning_event(alert: CapacityAlert) -> crate::events::PipelineEvent {
    crate::events::PipelineEvent::CapacityWarning {
        channel: alert.channel,
        usage: alert.usage,
        capacity: alert.capacity,
    }
}
