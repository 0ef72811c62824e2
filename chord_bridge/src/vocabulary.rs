// Chord vocabulary: dense integer indices for chord symbols.
//
// Built once from the training corpus in first-seen order, so the same corpus
// always yields the same indices (and therefore the same matrices and the
// same seeded output). Immutable after construction.

use rustc_hash::FxHashMap;

use crate::error::{BridgeError, Result};

/// Bidirectional symbol <-> index map.
#[derive(Debug, Clone, Default)]
pub struct ChordVocabulary {
    symbols: Vec<String>,
    indices: FxHashMap<String, usize>,
}

impl ChordVocabulary {
    /// Build from any stream of symbols. The first occurrence of each
    /// symbol fixes its index.
    pub fn from_symbols<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocab = ChordVocabulary::default();
        for symbol in symbols {
            if !vocab.indices.contains_key(symbol) {
                vocab.indices.insert(symbol.to_string(), vocab.symbols.len());
                vocab.symbols.push(symbol.to_string());
            }
        }
        vocab
    }

    /// Build from tokenized phrases, walking phrases in order.
    pub fn from_phrases(phrases: &[Vec<String>]) -> Self {
        Self::from_symbols(phrases.iter().flatten().map(String::as_str))
    }

    pub fn index_of(&self, symbol: &str) -> Result<usize> {
        self.indices
            .get(symbol)
            .copied()
            .ok_or_else(|| BridgeError::UnknownChord {
                symbol: symbol.to_string(),
            })
    }

    pub fn symbol_of(&self, index: usize) -> Result<&str> {
        self.symbols
            .get(index)
            .map(String::as_str)
            .ok_or(BridgeError::IndexOutOfRange {
                index,
                size: self.symbols.len(),
            })
    }

    /// Number of distinct chords (V).
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All symbols in index order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn encode<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<usize>> {
        symbols.iter().map(|s| self.index_of(s.as_ref())).collect()
    }

    pub fn decode(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices
            .iter()
            .map(|&i| self.symbol_of(i).map(str::to_string))
            .collect()
    }
}
