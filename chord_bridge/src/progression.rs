// Sequence orchestrator: whole progressions from phrase boundaries and
// bridged interiors.
//
// A `ProgressionModel` holds the vocabulary and the two trained chains:
// - `boundary`: trained on each piece's chain of phrase endpoints
//   (`start_1, end_1, start_2, end_2, ...`), so one step from a start gives
//   that phrase's end and one step from an end gives the next phrase's start;
// - `intra`: trained on the chords inside phrases.
//
// Generation first lays out every phrase's (start, end) pair along the
// boundary chain, then bridges each pair through the intra chain. A phrase of
// L slots has its endpoints at slot 0 and slot L-1, so the bridge spans L-1
// steps and L-2 chords are sampled in between; with L = 2 no interior is
// sampled at all.
//
// Failures from lower layers propagate unchanged. There is no retry here: if
// a boundary pair turns out to be unreachable through the intra chain, the
// caller decides whether to try another seed.

use chord_bridge_prng::{BridgeRng, RandomSource};
use tracing::debug;

use crate::bridge::{BridgeSampler, GenerationRequest, InteriorMode, step};
use crate::config::TrainingConfig;
use crate::corpus::Piece;
use crate::error::{BridgeError, Result};
use crate::transition::{TransitionCounts, TransitionMatrix};
use crate::vocabulary::ChordVocabulary;

/// Parameters for one progression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressionRequest {
    /// First chord of the first phrase; drawn from the boundary model's
    /// stationary distribution when `None`.
    pub start: Option<String>,
    pub phrase_count: usize,
    /// Chords per phrase, endpoints included.
    pub phrase_length: usize,
    pub mode: InteriorMode,
}

/// Work done by one generation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Interiors sampled through the intra chain.
    pub bridges: usize,
    /// Distinct matrix powers held by the run's cache.
    pub powers: usize,
    pub multiplications: usize,
}

/// Vocabulary plus the boundary and intra-phrase chains, read-only after
/// training.
#[derive(Debug, Clone)]
pub struct ProgressionModel {
    vocabulary: ChordVocabulary,
    boundary: TransitionMatrix,
    intra: TransitionMatrix,
}

impl ProgressionModel {
    /// Build the vocabulary and train both chains from tokenized pieces.
    pub fn train(pieces: &[Piece], config: &TrainingConfig) -> Result<Self> {
        let vocabulary = ChordVocabulary::from_symbols(
            pieces
                .iter()
                .flatten()
                .flatten()
                .map(String::as_str),
        );
        let size = vocabulary.len();
        let mut intra = TransitionCounts::new(size);
        let mut boundary = TransitionCounts::new(size);
        for piece in pieces {
            let mut endpoints = Vec::with_capacity(piece.len() * 2);
            for phrase in piece.iter().filter(|p| !p.is_empty()) {
                let encoded = vocabulary.encode(phrase)?;
                if config.wrap_phrases {
                    intra.record_cyclic(&encoded)?;
                } else {
                    intra.record(&encoded)?;
                }
                if let (Some(&first), Some(&last)) = (encoded.first(), encoded.last()) {
                    endpoints.push(first);
                    endpoints.push(last);
                }
            }
            if config.wrap_pieces {
                boundary.record_cyclic(&endpoints)?;
            } else {
                boundary.record(&endpoints)?;
            }
        }
        debug!(
            pieces = pieces.len(),
            chords = size,
            intra_transitions = intra.transitions(),
            boundary_transitions = boundary.transitions(),
            "training progression model"
        );
        Ok(ProgressionModel {
            vocabulary,
            boundary: boundary.normalize()?,
            intra: intra.normalize()?,
        })
    }

    /// Assemble a model from separately trained parts. Both chains must be
    /// sized to the vocabulary.
    pub fn from_parts(
        vocabulary: ChordVocabulary,
        boundary: TransitionMatrix,
        intra: TransitionMatrix,
    ) -> Result<Self> {
        let size = vocabulary.len();
        for chain in [&boundary, &intra] {
            if chain.size() != size {
                return Err(BridgeError::IndexOutOfRange {
                    index: chain.size(),
                    size,
                });
            }
        }
        Ok(ProgressionModel {
            vocabulary,
            boundary,
            intra,
        })
    }

    pub fn vocabulary(&self) -> &ChordVocabulary {
        &self.vocabulary
    }

    pub fn boundary(&self) -> &TransitionMatrix {
        &self.boundary
    }

    pub fn intra(&self) -> &TransitionMatrix {
        &self.intra
    }

    /// Lay out `(start, end)` for every phrase along the boundary chain.
    pub fn phrase_boundaries(
        &self,
        first_start: usize,
        phrase_count: usize,
        rng: &mut impl RandomSource,
    ) -> Result<Vec<(usize, usize)>> {
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        pairs
            .try_reserve_exact(phrase_count)
            .map_err(|_| BridgeError::InvalidPhraseCount)?;
        for _ in 0..phrase_count {
            let start = match pairs.last() {
                Some(&(_, previous_end)) => step(&self.boundary, previous_end, rng)?,
                None => first_start,
            };
            let end = step(&self.boundary, start, rng)?;
            pairs.push((start, end));
        }
        Ok(pairs)
    }

    /// Generate a progression as chord indices.
    pub fn generate_indices(
        &self,
        request: &ProgressionRequest,
        rng: &mut impl RandomSource,
    ) -> Result<Vec<usize>> {
        self.generate_indices_with_stats(request, rng)
            .map(|(chords, _)| chords)
    }

    /// `generate_indices`, also reporting how much bridge work the run did.
    pub fn generate_indices_with_stats(
        &self,
        request: &ProgressionRequest,
        rng: &mut impl RandomSource,
    ) -> Result<(Vec<usize>, GenerationStats)> {
        if request.phrase_length < 2 {
            return Err(BridgeError::InvalidLength {
                length: request.phrase_length,
            });
        }
        if request.phrase_count == 0 {
            return Err(BridgeError::InvalidPhraseCount);
        }
        let total = request
            .phrase_count
            .checked_mul(request.phrase_length)
            .ok_or(BridgeError::InvalidPhraseCount)?;
        let mut out = Vec::new();
        out.try_reserve_exact(total)
            .map_err(|_| BridgeError::InvalidPhraseCount)?;

        let first_start = match &request.start {
            Some(symbol) => self.vocabulary.index_of(symbol)?,
            None => rng
                .weighted_index(self.boundary.stationary())
                .ok_or(BridgeError::EmptyCorpus)?,
        };
        let pairs = self.phrase_boundaries(first_start, request.phrase_count, rng)?;

        let span = request.phrase_length - 1;
        let mut sampler = BridgeSampler::new(&self.intra);
        let mut bridges = 0;
        for &(start, end) in &pairs {
            out.push(start);
            if span >= 2 {
                let interior = sampler.sample_interior(
                    &GenerationRequest::new(start, end, span),
                    request.mode,
                    rng,
                )?;
                out.extend(interior);
                bridges += 1;
            }
            out.push(end);
        }
        let stats = GenerationStats {
            bridges,
            powers: sampler.cache().len(),
            multiplications: sampler.cache().multiplications(),
        };
        debug!(
            phrases = pairs.len(),
            chords = out.len(),
            mode = %request.mode,
            bridges = stats.bridges,
            powers = stats.powers,
            multiplications = stats.multiplications,
            "generated progression"
        );
        Ok((out, stats))
    }

    /// Generate a progression as chord symbols, drawing from `rng`.
    pub fn generate_with(
        &self,
        request: &ProgressionRequest,
        rng: &mut impl RandomSource,
    ) -> Result<Vec<String>> {
        let indices = self.generate_indices(request, rng)?;
        self.vocabulary.decode(&indices)
    }

    /// Generate a progression as chord symbols from a seed.
    pub fn generate(&self, request: &ProgressionRequest, seed: u64) -> Result<Vec<String>> {
        self.generate_with(request, &mut BridgeRng::new(seed))
    }
}

/// Generate `phrase_count` phrases of `phrase_length` chords with marginal
/// interior sampling. Identical arguments give identical output.
pub fn generate(
    model: &ProgressionModel,
    start: Option<&str>,
    phrase_count: usize,
    phrase_length: usize,
    seed: u64,
) -> Result<Vec<String>> {
    let request = ProgressionRequest {
        start: start.map(str::to_string),
        phrase_count,
        phrase_length,
        mode: InteriorMode::Marginal,
    };
    model.generate(&request, seed)
}
