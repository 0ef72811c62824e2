// Data-driven configuration for training and generation.
//
// `BridgeConfig` is loaded from JSON (every field optional, falling back to
// `Default`), then individual values may be overridden by command-line flags
// in the `generate` binary. The library itself only ever sees the typed
// structs; reading files is the binary's job.
//
// Example:
//
//     {
//       "training": { "wrap_phrases": true, "wrap_pieces": true },
//       "generation": {
//         "phrase_count": 4,
//         "phrase_length": 8,
//         "mode": "sequential",
//         "start": "D",
//         "seed": 42
//       }
//     }

use serde::{Deserialize, Serialize};

use crate::bridge::InteriorMode;
use crate::error::Result;
use crate::progression::ProgressionRequest;

/// How the corpus is turned into transition counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Count the step from each phrase's last chord back to its first.
    pub wrap_phrases: bool,
    /// Count the step from each piece's final phrase end back to its first
    /// phrase start in the boundary chain.
    pub wrap_pieces: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            wrap_phrases: true,
            wrap_pieces: true,
        }
    }
}

/// Shape of the generated progression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub phrase_count: usize,
    /// Chords per phrase, endpoints included.
    pub phrase_length: usize,
    pub mode: InteriorMode,
    /// First chord; drawn from the boundary model when absent.
    pub start: Option<String>,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            phrase_count: 4,
            phrase_length: 8,
            mode: InteriorMode::Marginal,
            start: None,
            seed: None,
        }
    }
}

impl GenerationConfig {
    pub fn request(&self) -> ProgressionRequest {
        ProgressionRequest {
            start: self.start.clone(),
            phrase_count: self.phrase_count,
            phrase_length: self.phrase_length,
            mode: self.mode,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub training: TrainingConfig,
    pub generation: GenerationConfig,
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
