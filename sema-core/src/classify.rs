//! Classificador de perda
//!
//! A unidade de transformação probabilística reutilizada por todos os
//! estágios: um sorteio uniforme em `[0,1)` decide se o símbolo permanece
//! DataToken ou vira EntropyToken com o glifo grego correspondente.

use rand::Rng;

use crate::alphabet;
use crate::error::{CoreError, CoreResult};
use crate::symbol::{Symbol, SymbolKind};

/// Resultado de uma classificação
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Classificação resultante
    pub kind: SymbolKind,
    /// Glifo emitido: original se retido, grego se convertido
    pub emitted_value: char,
}

impl Classification {
    /// Verifica se o símbolo foi convertido em entropia
    pub fn converted(&self) -> bool {
        self.kind == SymbolKind::Entropy
    }
}

/// Classificador de perda com probabilidade validada
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    probability: f64,
}

impl Classifier {
    /// Cria classificador; probabilidade em `[0,1]`
    pub fn new(probability: f64) -> CoreResult<Self> {
        Self::check(probability)?;
        Ok(Self { probability })
    }

    /// Cria classificador a partir de percentual `[0,100]`
    pub fn from_percent(percent: f64) -> CoreResult<Self> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(CoreError::InvalidParameter(format!(
                "loss percent = {percent}"
            )));
        }
        Self::new(percent / 100.0)
    }

    fn check(probability: f64) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(CoreError::InvalidParameter(format!(
                "probability = {probability}"
            )));
        }
        Ok(())
    }

    /// Probabilidade corrente
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Atualiza a probabilidade; valor anterior é mantido em caso de erro
    pub fn set_probability(&mut self, probability: f64) -> CoreResult<()> {
        Self::check(probability)?;
        self.probability = probability;
        Ok(())
    }

    /// Classifica um símbolo com um sorteio uniforme
    ///
    /// Determinístico sob um RNG semeado. Nunca muta o símbolo; o chamador
    /// aplica o resultado. Erros não consomem sorteio.
    pub fn classify<R: Rng>(&self, rng: &mut R, symbol: &Symbol) -> CoreResult<Classification> {
        let glyph =
            alphabet::greek_of(symbol.origin).ok_or(CoreError::UnknownSymbol(symbol.origin))?;

        let draw: f64 = rng.gen_range(0.0..1.0);
        if draw < self.probability {
            Ok(Classification {
                kind: SymbolKind::Entropy,
                emitted_value: glyph,
            })
        } else {
            Ok(Classification {
                kind: SymbolKind::Data,
                emitted_value: symbol.origin,
            })
        }
    }
}

impl Default for Classifier {
    /// Perda desabilitada (probabilidade 0.0)
    fn default() -> Self {
        Self { probability: 0.0 }
    }
}
