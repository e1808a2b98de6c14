//! # Alfabeto — Tabelas Estáticas do Registro de Símbolos
//!
//! O alfabeto de 30 símbolos (26 letras latinas maiúsculas + `/ + & ∅`),
//! seu contraparte grego e a partição dos 27 símbolos elegíveis em
//! 3 canais disjuntos de 9 símbolos (NC1/NC2/NC3).
//!
//! As tabelas são imutáveis; toda consulta é uma função pura sobre elas.

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Número de símbolos do alfabeto
pub const ALPHABET_LEN: usize = 30;

/// Número de símbolos elegíveis a canal
pub const ELIGIBLE_LEN: usize = 27;

/// Símbolos por canal
pub const CHANNEL_LEN: usize = 9;

/// Alfabeto completo: 26 letras latinas maiúsculas + operadores + `∅`
pub const ALPHABET: [char; ALPHABET_LEN] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N',
    'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '/', '+',
    '&', '∅',
];

/// Contraparte grega/especial, posição a posição com [`ALPHABET`]
///
/// A tabela é uma função total, não injetiva: C/X → χ e Q/Y → ψ.
pub const GREEK: [char; ALPHABET_LEN] = [
    'α', 'β', 'χ', 'δ', 'ε', 'φ', 'γ', 'η', 'ι', 'ξ', 'κ', 'λ', 'μ', 'ν',
    'ο', 'π', 'ψ', 'ρ', 'σ', 'τ', 'υ', 'ϑ', 'ω', 'χ', 'ψ', 'ζ', 'ς', 'Σ',
    'Ω', 'θ',
];

/// Operadores: nunca roteados por canal
pub const OPERATORS: [char; 3] = ['/', '+', '&'];

/// Símbolos do canal NC1
pub const NC1_SYMBOLS: [char; CHANNEL_LEN] = ['A', 'D', 'G', 'J', 'M', 'P', 'S', 'V', 'Y'];

/// Símbolos do canal NC2
pub const NC2_SYMBOLS: [char; CHANNEL_LEN] = ['B', 'E', 'H', 'K', 'N', 'Q', 'T', 'W', 'Z'];

/// Símbolos do canal NC3
pub const NC3_SYMBOLS: [char; CHANNEL_LEN] = ['C', 'F', 'I', 'L', 'O', 'R', 'U', 'X', '∅'];

/// Canal de roteamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    Nc1,
    Nc2,
    Nc3,
}

impl Channel {
    /// Lista todos os canais em ordem
    pub fn all() -> [Channel; 3] {
        [Channel::Nc1, Channel::Nc2, Channel::Nc3]
    }

    /// Índice do canal (0-2)
    pub fn index(&self) -> usize {
        match self {
            Channel::Nc1 => 0,
            Channel::Nc2 => 1,
            Channel::Nc3 => 2,
        }
    }

    /// Nome do canal
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Nc1 => "NC1",
            Channel::Nc2 => "NC2",
            Channel::Nc3 => "NC3",
        }
    }

    /// Símbolos atribuídos ao canal
    pub fn symbols(&self) -> &'static [char; CHANNEL_LEN] {
        match self {
            Channel::Nc1 => &NC1_SYMBOLS,
            Channel::Nc2 => &NC2_SYMBOLS,
            Channel::Nc3 => &NC3_SYMBOLS,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Índice símbolo → canal
static CHANNEL_TABLE: Lazy<HashMap<char, Channel>> = Lazy::new(|| {
    let mut table = HashMap::with_capacity(ELIGIBLE_LEN);
    for channel in Channel::all() {
        for &symbol in channel.symbols() {
            table.insert(symbol, channel);
        }
    }
    table
});

/// Índice símbolo → glifo grego
static GREEK_TABLE: Lazy<HashMap<char, char>> = Lazy::new(|| {
    ALPHABET.iter().copied().zip(GREEK.iter().copied()).collect()
});

/// Verifica se o caractere pertence ao alfabeto
pub fn is_alphabet(symbol: char) -> bool {
    GREEK_TABLE.contains_key(&symbol)
}

/// Verifica se o caractere é um operador (canal `none`)
pub fn is_operator(symbol: char) -> bool {
    OPERATORS.contains(&symbol)
}

/// Verifica se o caractere é elegível a canal
pub fn is_eligible(symbol: char) -> bool {
    CHANNEL_TABLE.contains_key(&symbol)
}

/// Canal do símbolo; `None` para operadores e caracteres desconhecidos
pub fn channel_of(symbol: char) -> Option<Channel> {
    CHANNEL_TABLE.get(&symbol).copied()
}

/// Glifo grego do símbolo; `None` fora do alfabeto
pub fn greek_of(symbol: char) -> Option<char> {
    GREEK_TABLE.get(&symbol).copied()
}

/// Sorteia um símbolo uniforme do alfabeto
pub fn sample<R: Rng>(rng: &mut R) -> char {
    ALPHABET[rng.gen_range(0..ALPHABET_LEN)]
}
