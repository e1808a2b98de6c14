//! Oráculo de capacidade
//!
//! O oráculo fornece os tetos de admissão — capacidade total `C` e
//! por-canal `C/3` — derivados externamente e consumidos somente-leitura.
//! Os valores podem mudar entre chamadas: toda decisão de admissão lê o
//! oráculo na hora, nunca usa valor em cache.

use std::sync::RwLock;

use sema_core::Channel;

use crate::error::CapacityResult;

/// Oráculo de capacidade (consumido somente-leitura)
pub trait CapacityOracle: Send + Sync {
    /// Capacidade total corrente
    fn total_capacity(&self) -> CapacityResult<f64>;

    /// Capacidade corrente do canal
    fn channel_capacity(&self, channel: Channel) -> CapacityResult<f64>;
}

/// Mutador de comprimento de canal (lado de escrita do colaborador)
///
/// Alimentado pelo estágio ChannelUpdate com ±1.0 por registro admitido.
pub trait ChannelMutator: Send + Sync {
    /// Aplica um delta ao comprimento do canal; retorna o valor resultante
    fn apply_delta(&self, channel: Channel, delta: f64) -> CapacityResult<f64>;
}

/// Mutador nulo para cenários sem geometria (oráculo fixo)
#[derive(Debug, Default)]
pub struct NullMutator;

impl ChannelMutator for NullMutator {
    fn apply_delta(&self, _channel: Channel, _delta: f64) -> CapacityResult<f64> {
        Ok(0.0)
    }
}

/// Colaborador geométrico: triângulo com um lado por canal
///
/// Capacidade total = perímetro; por canal = perímetro/3. O estágio
/// ChannelUpdate alimenta [`TriangleGeometry::apply_delta`] com ±1.0 por
/// registro admitido — a aresta de feedback que fecha o ciclo e muda as
/// próximas leituras do oráculo.
#[derive(Debug)]
pub struct TriangleGeometry {
    sides: RwLock<[f64; 3]>,
}

impl TriangleGeometry {
    /// Cria triângulo equilátero com o lado dado
    pub fn equilateral(side: f64) -> Self {
        Self::with_sides([side, side, side])
    }

    /// Cria triângulo com os lados dados (NC1, NC2, NC3)
    pub fn with_sides(sides: [f64; 3]) -> Self {
        Self {
            sides: RwLock::new(sides.map(|s| s.max(0.0))),
        }
    }

    /// Lado corrente do canal
    pub fn side(&self, channel: Channel) -> CapacityResult<f64> {
        let sides = self.sides.read()?;
        Ok(sides[channel.index()])
    }

    /// Todos os lados (NC1, NC2, NC3)
    pub fn sides(&self) -> CapacityResult<[f64; 3]> {
        let sides = self.sides.read()?;
        Ok(*sides)
    }

    /// Lado corrente por canal, nunca negativo
    fn shift_side(&self, channel: Channel, delta: f64) -> CapacityResult<f64> {
        let mut sides = self.sides.write()?;
        let side = &mut sides[channel.index()];
        *side = (*side + delta).max(0.0);
        Ok(*side)
    }

    /// Aresta de feedback: delega para [`ChannelMutator::apply_delta`]
    pub fn apply_delta(&self, channel: Channel, delta: f64) -> CapacityResult<f64> {
        self.shift_side(channel, delta)
    }
}

impl ChannelMutator for TriangleGeometry {
    fn apply_delta(&self, channel: Channel, delta: f64) -> CapacityResult<f64> {
        self.shift_side(channel, delta)
    }
}

impl CapacityOracle for TriangleGeometry {
    fn total_capacity(&self) -> CapacityResult<f64> {
        let sides = self.sides.read()?;
        Ok(sides.iter().sum())
    }

    fn channel_capacity(&self, _channel: Channel) -> CapacityResult<f64> {
        // Capacidade por canal é sempre C/3, independente do lado
        Ok(self.total_capacity()? / 3.0)
    }
}

/// Oráculo fixo para testes e cenários sem geometria
#[derive(Debug)]
pub struct FixedOracle {
    total: RwLock<f64>,
}

impl FixedOracle {
    /// Cria oráculo com capacidade total fixa
    pub fn new(total: f64) -> Self {
        Self {
            total: RwLock::new(total.max(0.0)),
        }
    }

    /// Redefine a capacidade total (mudança out-of-band)
    pub fn set_total(&self, total: f64) -> CapacityResult<()> {
        let mut guard = self.total.write()?;
        *guard = total.max(0.0);
        Ok(())
    }
}

impl CapacityOracle for FixedOracle {
    fn total_capacity(&self) -> CapacityResult<f64> {
        let total = self.total.read()?;
        Ok(*total)
    }

    fn channel_capacity(&self, _channel: Channel) -> CapacityResult<f64> {
        Ok(self.total_capacity()? / 3.0)
    }
}
