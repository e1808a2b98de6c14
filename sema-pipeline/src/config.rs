//! Configuração do pipeline
//!
//! Todos os parâmetros ajustáveis, validados contra seus ranges
//! declarados. Um setter que rejeita mantém o valor anterior; a validação
//! em bloco cobre configs carregadas de arquivo.

use serde::{Deserialize, Serialize};

use sema_core::{Channel, DEFAULT_THRESHOLD};

use crate::error::{PipelineError, PipelineResult};
use crate::stages::StageId;

/// Configuração completa do pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Taxa do Generator (símbolos/s)
    pub generator_rate: f64,
    /// Taxa do Uptake (símbolos/s)
    pub uptake_rate: f64,
    /// Perda do Uptake (%)
    pub uptake_loss_percent: f64,
    /// Taxa do Pool (símbolos/s)
    pub pool_rate: f64,
    /// Perda do Pool (%)
    pub pool_loss_percent: f64,
    /// Percentual de ticks do Pool que preferem DataTokens
    pub pool_data_preference_percent: f64,
    /// Taxa do Converter (símbolos/s)
    pub converter_rate: f64,
    /// Threshold de agregação (0 desabilita)
    pub aggregation_threshold: u32,
    /// Taxa do ChannelIntake (símbolos/s)
    pub intake_rate: f64,
    /// Fatia do orçamento do ChannelIntake para DataTokens (%)
    pub intake_data_percent: f64,
    /// Fatia do orçamento do ChannelIntake para EntropyTokens (%)
    pub intake_entropy_percent: f64,
    /// Taxas independentes do ChannelUpdate (NC1, NC2, NC3)
    pub channel_rates: [f64; 3],
    /// Perdas independentes do ChannelUpdate (%) (NC1, NC2, NC3)
    pub channel_loss_percents: [f64; 3],
    /// Taxa do Recycler (símbolos/s)
    pub recycler_rate: f64,
    /// Lado inicial do triângulo de capacidade
    pub initial_side: f64,
    /// Razão de preenchimento que dispara avisos de capacidade
    pub warn_ratio: f64,
    /// Tamanho do histórico de eventos
    pub event_history: usize,
    /// Semente do RNG (determinismo)
    pub seed: u64,
    /// Modo debug
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generator_rate: 4.0,
            uptake_rate: 3.0,
            uptake_loss_percent: 0.0,
            pool_rate: 3.0,
            pool_loss_percent: 0.0,
            pool_data_preference_percent: 50.0,
            converter_rate: 3.0,
            aggregation_threshold: DEFAULT_THRESHOLD,
            intake_rate: 3.0,
            intake_data_percent: 50.0,
            intake_entropy_percent: 50.0,
            channel_rates: [2.0, 2.0, 2.0],
            channel_loss_percents: [0.0, 0.0, 0.0],
            recycler_rate: 1.0,
            initial_side: 30.0,
            warn_ratio: 0.9,
            event_history: 1000,
            seed: 7,
            debug: false,
        }
    }
}

fn check_rate(name: &str, rate: f64) -> PipelineResult<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(PipelineError::InvalidConfiguration(format!(
            "{name} = {rate}, must be a finite rate >= 0"
        )));
    }
    Ok(())
}

fn check_percent(name: &str, percent: f64) -> PipelineResult<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(PipelineError::InvalidConfiguration(format!(
            "{name} = {percent}, must be within 0..=100"
        )));
    }
    Ok(())
}

impl PipelineConfig {
    /// Valida todos os parâmetros contra seus ranges
    pub fn validate(&self) -> PipelineResult<()> {
        check_rate("generator_rate", self.generator_rate)?;
        check_rate("uptake_rate", self.uptake_rate)?;
        check_rate("pool_rate", self.pool_rate)?;
        check_rate("converter_rate", self.converter_rate)?;
        check_rate("intake_rate", self.intake_rate)?;
        check_rate("recycler_rate", self.recycler_rate)?;
        for channel in Channel::all() {
            check_rate("channel_rate", self.channel_rates[channel.index()])?;
            check_percent(
                "channel_loss_percent",
                self.channel_loss_percents[channel.index()],
            )?;
        }

        check_percent("uptake_loss_percent", self.uptake_loss_percent)?;
        check_percent("pool_loss_percent", self.pool_loss_percent)?;
        check_percent(
            "pool_data_preference_percent",
            self.pool_data_preference_percent,
        )?;
        check_percent("intake_data_percent", self.intake_data_percent)?;
        check_percent("intake_entropy_percent", self.intake_entropy_percent)?;

        let split = self.intake_data_percent + self.intake_entropy_percent;
        if (split - 100.0).abs() > f64::EPSILON {
            return Err(PipelineError::InvalidConfiguration(format!(
                "intake split sums to {split}, must sum to 100"
            )));
        }

        if !(0.0..=1.0).contains(&self.warn_ratio) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "warn_ratio = {}, must be within 0..=1",
                self.warn_ratio
            )));
        }

        if !self.initial_side.is_finite() || self.initial_side < 0.0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "initial_side = {}, must be a finite length >= 0",
                self.initial_side
            )));
        }

        Ok(())
    }

    /// Taxa agendada de um estágio
    ///
    /// O ChannelUpdate agenda no máximo das três taxas de canal; os
    /// orçamentos por canal são derivados das taxas individuais.
    pub fn rate_of(&self, stage: StageId) -> f64 {
        match stage {
            StageId::Generator => self.generator_rate,
            StageId::Uptake => self.uptake_rate,
            StageId::Pool => self.pool_rate,
            StageId::Converter => self.converter_rate,
            StageId::ChannelIntake => self.intake_rate,
            StageId::ChannelUpdate => self
                .channel_rates
                .iter()
                .copied()
                .fold(0.0, f64::max),
            StageId::Recycler => self.recycler_rate,
        }
    }
}
