// Error taxonomy for training and generation.
//
// Every failure is returned synchronously at the point of detection and
// propagates up through the orchestrator unchanged. There is no retry and no
// silent fallback (in particular, no uniform distribution substituted for an
// unreachable bridge). Callers that want to re-sample on a reachability
// failure check `is_reachability_failure()` and apply their own policy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// A start, end or training symbol is absent from the vocabulary.
    #[error("unknown chord: {symbol}")]
    UnknownChord { symbol: String },

    /// Training saw no sequence with at least one transition.
    #[error("corpus contains no sequence of two or more chords")]
    EmptyCorpus,

    /// The bridge weights at some interior position summed to zero.
    #[error("no probability mass connects chord {start} to chord {end} over {span} steps")]
    UnreachableEndpoint {
        start: usize,
        end: usize,
        span: usize,
    },

    /// A single step was requested from an all-zero column.
    #[error("chord {chord} was never observed as a predecessor")]
    NoSuccessor { chord: usize },

    /// A matrix handed in as a transition model breaks the column invariant.
    #[error("column {column} is neither stochastic nor zero")]
    NotStochastic { column: usize },

    /// A phrase (or bridge, counted in chords) shorter than two chords.
    #[error("invalid length {length}: a phrase needs at least two chords")]
    InvalidLength { length: usize },

    #[error("phrase count must be at least one")]
    InvalidPhraseCount,

    /// Internal index invariant violated. Indicates a bug in the caller.
    #[error("index {index} out of range for size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl BridgeError {
    /// True for failures caused by missing probability mass rather than bad
    /// input: the class a caller may choose to retry with a different draw.
    pub fn is_reachability_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::UnreachableEndpoint { .. } | BridgeError::NoSuccessor { .. }
        )
    }
}
