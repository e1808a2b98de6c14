//! Ledger de capacidade
//!
//! O [`CapacityManager`] rastreia o uso por tipo e canal em todos os
//! stores, rejeita admissões que violariam os tetos do oráculo e levanta
//! avisos de marca d'água. O oráculo é lido fresco a cada decisão.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use sema_core::Channel;

use crate::error::{CapacityError, CapacityResult};
use crate::oracle::CapacityOracle;

/// Razão de preenchimento padrão para avisos
pub const DEFAULT_WARN_RATIO: f64 = 0.9;

/// Classe de ocupação no ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenClass {
    /// DataToken cru ("bit")
    Data,
    /// EntropyToken
    Entropy,
    /// Unidade agregada ("palavra")
    Aggregate,
}

/// Aviso de marca d'água emitido em uma admissão
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityAlert {
    /// Canal do aviso; `None` = capacidade total
    pub channel: Option<Channel>,
    /// Uso após a admissão
    pub usage: u64,
    /// Capacidade no momento da leitura
    pub capacity: f64,
}

/// Violação detectada por `revalidate` após mudança out-of-band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityViolation {
    /// Canal violado; `None` = capacidade total
    pub channel: Option<Channel>,
    /// Uso corrente
    pub usage: u64,
    /// Capacidade corrente (menor que o uso)
    pub capacity: f64,
}

/// Entrada de uso no snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub class: TokenClass,
    pub channel: Option<Channel>,
    pub count: u64,
}

/// Snapshot serializável do ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLedger {
    /// Capacidade total no momento do snapshot
    pub total_capacity: f64,
    /// Capacidade por canal (NC1, NC2, NC3)
    pub channel_capacity: [f64; 3],
    /// Uso total
    pub total_usage: u64,
    /// Uso por canal (NC1, NC2, NC3)
    pub channel_usage: [u64; 3],
    /// Uso detalhado por (classe, canal)
    pub usage: Vec<UsageEntry>,
}

/// Gestor de capacidade
///
/// Invariantes: `total_usage ≤ total_capacity` e
/// `channel_usage[c] ≤ channel_capacity[c]` após toda admissão aceita.
/// Uma admissão que violaria os tetos é rejeitada sem mutar nada.
pub struct CapacityManager {
    oracle: Arc<dyn CapacityOracle>,
    usage: RwLock<HashMap<(TokenClass, Option<Channel>), u64>>,
    warn_ratio: f64,
}

impl CapacityManager {
    /// Cria gestor sobre o oráculo dado
    pub fn new(oracle: Arc<dyn CapacityOracle>) -> Self {
        Self {
            oracle,
            usage: RwLock::new(HashMap::new()),
            warn_ratio: DEFAULT_WARN_RATIO,
        }
    }

    /// Define a razão de preenchimento que dispara avisos
    pub fn with_warn_ratio(mut self, warn_ratio: f64) -> Self {
        self.warn_ratio = warn_ratio.clamp(0.0, 1.0);
        self
    }

    /// Oráculo consumido pelo gestor
    pub fn oracle(&self) -> &Arc<dyn CapacityOracle> {
        &self.oracle
    }

    /// Uso total corrente
    pub fn total_usage(&self) -> CapacityResult<u64> {
        let usage = self.usage.read()?;
        Ok(usage.values().sum())
    }

    /// Uso corrente de um canal
    pub fn channel_usage(&self, channel: Channel) -> CapacityResult<u64> {
        let usage = self.usage.read()?;
        Ok(usage
            .iter()
            .filter(|((_, c), _)| *c == Some(channel))
            .map(|(_, count)| count)
            .sum())
    }

    /// Uso corrente de uma classe em um canal
    pub fn usage_of(&self, class: TokenClass, channel: Option<Channel>) -> CapacityResult<u64> {
        let usage = self.usage.read()?;
        Ok(usage.get(&(class, channel)).copied().unwrap_or(0))
    }

    /// Tenta admitir um registro
    ///
    /// Lê o oráculo fresco; admite sse `uso + 1 ≤ capacidade` no total e,
    /// para registros com canal, também no canal. Rejeição não muta o
    /// ledger. `Ok(Some(_))` sinaliza admissão com aviso de marca d'água.
    pub fn try_admit(
        &self,
        class: TokenClass,
        channel: Option<Channel>,
    ) -> CapacityResult<Option<CapacityAlert>> {
        let total_capacity = self.oracle.total_capacity()?;

        let mut usage = self.usage.write()?;
        let total_usage: u64 = usage.values().sum();

        if (total_usage + 1) as f64 > total_capacity {
            return Err(CapacityError::Exceeded {
                usage: total_usage,
                capacity: total_capacity,
            });
        }

        let mut channel_alert = None;
        if let Some(channel) = channel {
            let channel_capacity = self.oracle.channel_capacity(channel)?;
            let channel_usage: u64 = usage
                .iter()
                .filter(|((_, c), _)| *c == Some(channel))
                .map(|(_, count)| count)
                .sum();

            if (channel_usage + 1) as f64 > channel_capacity {
                return Err(CapacityError::ChannelExceeded {
                    channel,
                    usage: channel_usage,
                    capacity: channel_capacity,
                });
            }

            if (channel_usage + 1) as f64 >= channel_capacity * self.warn_ratio {
                channel_alert = Some(CapacityAlert {
                    channel: Some(channel),
                    usage: channel_usage + 1,
                    capacity: channel_capacity,
                });
            }
        }

        *usage.entry((class, channel)).or_insert(0) += 1;

        if channel_alert.is_some() {
            return Ok(channel_alert);
        }

        if (total_usage + 1) as f64 >= total_capacity * self.warn_ratio {
            return Ok(Some(CapacityAlert {
                channel: None,
                usage: total_usage + 1,
                capacity: total_capacity,
            }));
        }

        Ok(None)
    }

    /// Admite sem consultar o oráculo (válvula de escape do Recycler)
    pub fn force_admit(&self, class: TokenClass, channel: Option<Channel>) -> CapacityResult<()> {
        let mut usage = self.usage.write()?;
        *usage.entry((class, channel)).or_insert(0) += 1;
        Ok(())
    }

    /// Libera um registro (saída do pipeline ou destruição)
    pub fn release(&self, class: TokenClass, channel: Option<Channel>) -> CapacityResult<()> {
        let mut usage = self.usage.write()?;
        if let Some(count) = usage.get_mut(&(class, channel)) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                usage.remove(&(class, channel));
            }
        }
        Ok(())
    }

    /// Aplica o delta líquido de uma emissão de agregado
    ///
    /// Atômico: -threshold DataTokens, +1 agregado no mesmo canal.
    pub fn record_aggregate(
        &self,
        channel: Option<Channel>,
        threshold: u32,
    ) -> CapacityResult<()> {
        let mut usage = self.usage.write()?;

        if let Some(count) = usage.get_mut(&(TokenClass::Data, channel)) {
            *count = count.saturating_sub(threshold as u64);
            if *count == 0 {
                usage.remove(&(TokenClass::Data, channel));
            }
        }
        *usage.entry((TokenClass::Aggregate, channel)).or_insert(0) += 1;
        Ok(())
    }

    /// Snapshot serializável do ledger
    pub fn snapshot(&self) -> CapacityResult<CapacityLedger> {
        let usage = self.usage.read()?;

        let mut entries: Vec<UsageEntry> = usage
            .iter()
            .map(|(&(class, channel), &count)| UsageEntry {
                class,
                channel,
                count,
            })
            .collect();
        entries.sort_by_key(|e| (e.channel.map(|c| c.index()), e.class as u8));

        let mut channel_usage = [0u64; 3];
        for (&(_, channel), &count) in usage.iter() {
            if let Some(channel) = channel {
                channel_usage[channel.index()] += count;
            }
        }

        let mut channel_capacity = [0.0f64; 3];
        for channel in Channel::all() {
            channel_capacity[channel.index()] = self.oracle.channel_capacity(channel)?;
        }

        Ok(CapacityLedger {
            total_capacity: self.oracle.total_capacity()?,
            channel_capacity,
            total_usage: usage.values().sum(),
            channel_usage,
            usage: entries,
        })
    }

    /// Revalida o uso contra leituras frescas do oráculo
    ///
    /// Capacidades mudam out-of-band; o uso nunca é truncado à força,
    /// violações são reportadas para virarem avisos.
    pub fn revalidate(&self) -> CapacityResult<Vec<CapacityViolation>> {
        let snapshot = self.snapshot()?;
        let mut violations = Vec::new();

        if snapshot.total_usage as f64 > snapshot.total_capacity {
            violations.push(CapacityViolation {
                channel: None,
                usage: snapshot.total_usage,
                capacity: snapshot.total_capacity,
            });
        }

        for channel in Channel::all() {
            let usage = snapshot.channel_usage[channel.index()];
            let capacity = snapshot.channel_capacity[channel.index()];
            if usage as f64 > capacity {
                violations.push(CapacityViolation {
                    channel: Some(channel),
                    usage,
                    capacity,
                });
            }
        }

        Ok(violations)
    }

    /// Zera o ledger
    pub fn reset(&self) -> CapacityResult<()> {
        let mut usage = self.usage.write()?;
        usage.clear();
        Ok(())
    }
}

impl std::fmt::Debug for CapacityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityManager")
            .field("warn_ratio", &self.warn_ratio)
            .field("total_usage", &self.total_usage().unwrap_or(0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FixedOracle;

    fn manager(total: f64) -> CapacityManager {
        CapacityManager::new(Arc::new(FixedOracle::new(total)))
    }

    #[test]
    fn test_admission_within_capacity() {
        let manager = manager(9.0);

        for _ in 0..3 {
            manager.try_admit(TokenClass::Data, None).unwrap();
        }
        assert_eq!(manager.total_usage().unwrap(), 3);
    }

    #[test]
    fn test_sixth_admission_rejected_at_capacity_five() {
        let manager = manager(5.0);

        for _ in 0..5 {
            manager.try_admit(TokenClass::Data, None).unwrap();
        }

        let result = manager.try_admit(TokenClass::Data, None);
        assert_eq!(
            result,
            Err(CapacityError::Exceeded {
                usage: 5,
                capacity: 5.0
            })
        );
        assert_eq!(manager.total_usage().unwrap(), 5);
    }

    #[test]
    fn test_channel_capacity_rejection() {
        // Total 9 => 3 por canal
        let manager = manager(9.0);

        for _ in 0..3 {
            manager
                .try_admit(TokenClass::Data, Some(Channel::Nc1))
                .unwrap();
        }

        let result = manager.try_admit(TokenClass::Data, Some(Channel::Nc1));
        assert!(matches!(
            result,
            Err(CapacityError::ChannelExceeded {
                channel: Channel::Nc1,
                ..
            })
        ));

        // Outro canal ainda admite
        assert!(manager.try_admit(TokenClass::Data, Some(Channel::Nc2)).is_ok());
    }

    #[test]
    fn test_rejection_never_partially_applied() {
        let manager = manager(2.0);
        manager.try_admit(TokenClass::Data, None).unwrap();
        manager.try_admit(TokenClass::Entropy, None).unwrap();

        let before = manager.total_usage().unwrap();
        assert!(manager.try_admit(TokenClass::Data, None).is_err());
        assert_eq!(manager.total_usage().unwrap(), before);
    }

    #[test]
    fn test_release() {
        let manager = manager(9.0);
        manager.try_admit(TokenClass::Data, None).unwrap();
        manager.release(TokenClass::Data, None).unwrap();
        assert_eq!(manager.total_usage().unwrap(), 0);

        // Release de classe vazia é inofensivo
        manager.release(TokenClass::Entropy, None).unwrap();
        assert_eq!(manager.total_usage().unwrap(), 0);
    }

    #[test]
    fn test_record_aggregate_net_delta() {
        let manager = manager(90.0);
        for _ in 0..9 {
            manager
                .try_admit(TokenClass::Data, Some(Channel::Nc1))
                .unwrap();
        }

        manager.record_aggregate(Some(Channel::Nc1), 9).unwrap();

        assert_eq!(manager.usage_of(TokenClass::Data, Some(Channel::Nc1)).unwrap(), 0);
        assert_eq!(
            manager
                .usage_of(TokenClass::Aggregate, Some(Channel::Nc1))
                .unwrap(),
            1
        );
        assert_eq!(manager.channel_usage(Channel::Nc1).unwrap(), 1);
    }

    #[test]
    fn test_warn_ratio_alert() {
        let manager = manager(10.0).with_warn_ratio(0.8);

        for _ in 0..7 {
            assert_eq!(manager.try_admit(TokenClass::Data, None).unwrap(), None);
        }

        // 8/10 cruza a marca de 0.8
        let alert = manager.try_admit(TokenClass::Data, None).unwrap();
        assert!(alert.is_some());
        assert_eq!(alert.unwrap().usage, 8);
    }

    #[test]
    fn test_revalidate_after_out_of_band_shrink() {
        let oracle = Arc::new(FixedOracle::new(9.0));
        let manager = CapacityManager::new(oracle.clone());

        for _ in 0..6 {
            manager.try_admit(TokenClass::Data, None).unwrap();
        }
        assert!(manager.revalidate().unwrap().is_empty());

        // Capacidade encolhe por fora; uso não é truncado
        oracle.set_total(4.0).unwrap();
        let violations = manager.revalidate().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].usage, 6);
        assert_eq!(manager.total_usage().unwrap(), 6);
    }

    #[test]
    fn test_snapshot_serialization() {
        let manager = manager(9.0);
        manager
            .try_admit(TokenClass::Data, Some(Channel::Nc3))
            .unwrap();

        let snapshot = manager.snapshot().unwrap();
        assert_eq!(snapshot.total_usage, 1);
        assert_eq!(snapshot.channel_usage[2], 1);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CapacityLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }

    #[test]
    fn test_fresh_oracle_read_per_admission() {
        let oracle = Arc::new(FixedOracle::new(1.0));
        let manager = CapacityManager::new(oracle.clone());

        manager.try_admit(TokenClass::Data, None).unwrap();
        assert!(manager.try_admit(TokenClass::Data, None).is_err());

        // Capacidade cresce out-of-band; próxima admissão já enxerga
        oracle.set_total(2.0).unwrap();
        assert!(manager.try_admit(TokenClass::Data, None).is_ok());
    }
}
