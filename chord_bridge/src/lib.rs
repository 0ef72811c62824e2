// Chord Bridge: Markov-chain chord progressions with fixed phrase endpoints.
//
// Trains two first-order chains from example progressions (one over phrase
// boundaries, one over the chords inside phrases) and generates new
// progressions whose phrases start and end on chords drawn from the boundary
// chain, with the interior filled by sampling a discrete Markov bridge
// between the two endpoints.
//
// Architecture:
// - vocabulary.rs: chord symbol <-> dense index, first-seen order
// - matrix.rs: nalgebra-backed dense matrices, column renormalization
// - transition.rs: transition counting and column-stochastic normalization
// - power.rs: binary exponentiation with a per-run memo table
// - bridge.rs: bridge distributions (rayon across positions), interior modes
// - progression.rs: boundary chain + bridged interiors -> whole progression
// - config.rs: JSON-loadable training and generation settings
// - corpus.rs: text corpus tokenizing and output formatting
// - error.rs: `BridgeError` taxonomy
//
// Generation is deterministic given a seed: all randomness flows through an
// explicit `chord_bridge_prng::RandomSource`.

pub mod bridge;
pub mod config;
pub mod corpus;
pub mod error;
pub mod matrix;
pub mod power;
pub mod progression;
pub mod transition;
pub mod vocabulary;

pub use bridge::{BridgeSampler, GenerationRequest, InteriorMode};
pub use config::{BridgeConfig, GenerationConfig, TrainingConfig};
pub use error::{BridgeError, Result};
pub use progression::{GenerationStats, ProgressionModel, ProgressionRequest, generate};
pub use transition::{TransitionMatrix, train};
pub use vocabulary::ChordVocabulary;
