// Conditional sampler: interior chords of a phrase whose two endpoints are
// fixed (a discrete Markov bridge).
//
// For a chain P, start i, end j and span n (the end sits n steps after the
// start), the chord at interior position g has
//
//     Pr(x_g = k | x_0 = i, x_n = j)  ∝  (P^(n-g))[j][k] * (P^g)[k][i]
//
// The weights are normalized by their own sum S, which equals (P^n)[j][i] in
// exact arithmetic. S ≤ EPSILON means the endpoints cannot be connected in n steps and is
// reported as `UnreachableEndpoint`, never papered over with a uniform draw.
//
// Three ways to fill the interior (`InteriorMode`):
// - `Marginal`: every position is drawn from its own bridge distribution,
//   depending only on (i, j, g). Adjacent interior chords are not forced to be
//   a valid transition of P.
// - `Sequential`: left to right; each drawn chord becomes the new start for
//   bridging the next position against j over the remaining span.
// - `Bisection`: draw the midpoint, then recurse into both halves with the
//   drawn chord as the new endpoint.
// The last two are joint samples of the whole interior and respect P at every
// adjacent pair.
//
// All powers go through a `PowerCache` owned by the sampler, so one sampler
// reused across the phrases of a run computes each exponent once.

use std::fmt;
use std::str::FromStr;

use chord_bridge_prng::RandomSource;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{BridgeError, Result};
use crate::matrix::{EPSILON, Matrix};
use crate::power::PowerCache;
use crate::transition::TransitionMatrix;

/// Strategy for filling the interior of a bridge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteriorMode {
    /// Independent per-position marginals.
    #[default]
    Marginal,
    /// Left-to-right joint sample.
    Sequential,
    /// Midpoint-first recursive joint sample.
    Bisection,
}

impl FromStr for InteriorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "marginal" => Ok(InteriorMode::Marginal),
            "sequential" => Ok(InteriorMode::Sequential),
            "bisection" => Ok(InteriorMode::Bisection),
            other => Err(format!(
                "unknown interior mode '{other}' (expected marginal, sequential or bisection)"
            )),
        }
    }
}

impl fmt::Display for InteriorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InteriorMode::Marginal => "marginal",
            InteriorMode::Sequential => "sequential",
            InteriorMode::Bisection => "bisection",
        })
    }
}

/// One bridge: the chord at step 0 is `start`, the chord at step `span` is
/// `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub start: usize,
    pub end: usize,
    pub span: usize,
}

impl GenerationRequest {
    pub fn new(start: usize, end: usize, span: usize) -> Self {
        GenerationRequest { start, end, span }
    }
}

/// Markov-bridge sampler over one transition matrix.
#[derive(Debug)]
pub struct BridgeSampler<'a> {
    transitions: &'a TransitionMatrix,
    cache: PowerCache<'a>,
}

impl<'a> BridgeSampler<'a> {
    pub fn new(transitions: &'a TransitionMatrix) -> Self {
        BridgeSampler {
            transitions,
            cache: PowerCache::new(transitions.matrix()),
        }
    }

    /// The power table built up so far.
    pub fn cache(&self) -> &PowerCache<'a> {
        &self.cache
    }

    fn validate(&self, request: &GenerationRequest) -> Result<()> {
        if request.span == 0 {
            return Err(BridgeError::InvalidLength { length: 1 });
        }
        let size = self.transitions.size();
        for index in [request.start, request.end] {
            if index >= size {
                return Err(BridgeError::IndexOutOfRange { index, size });
            }
        }
        Ok(())
    }

    /// Normalized bridge distribution for the chord at `position`
    /// (strictly between 0 and `span`).
    pub fn distribution(&mut self, request: &GenerationRequest, position: usize) -> Result<Vec<f64>> {
        self.validate(request)?;
        if position == 0 || position >= request.span {
            return Err(BridgeError::IndexOutOfRange {
                index: position,
                size: request.span,
            });
        }
        let (from_start, to_end) = self.cache.pair(position, request.span - position);
        bridge_weights(request, from_start, to_end)
    }

    fn draw(
        &mut self,
        request: &GenerationRequest,
        position: usize,
        rng: &mut impl RandomSource,
    ) -> Result<usize> {
        let dist = self.distribution(request, position)?;
        pick(request, position, &dist, rng)
    }

    /// Sample the `span - 1` interior chords of a bridge. A span of one has
    /// no interior and returns an empty sequence without touching the power
    /// table.
    pub fn sample_interior(
        &mut self,
        request: &GenerationRequest,
        mode: InteriorMode,
        rng: &mut impl RandomSource,
    ) -> Result<Vec<usize>> {
        self.validate(request)?;
        if request.span < 2 {
            return Ok(Vec::new());
        }
        match mode {
            InteriorMode::Marginal => {
                // Positions are independent: weigh them in parallel, draw in order.
                let powers = self.cache.powers(1..request.span);
                let dists: Vec<Result<Vec<f64>>> = (1..request.span)
                    .into_par_iter()
                    .map(|position| {
                        bridge_weights(
                            request,
                            powers[position - 1],
                            powers[request.span - position - 1],
                        )
                    })
                    .collect();
                dists
                    .into_iter()
                    .zip(1..)
                    .map(|(dist, position)| pick(request, position, &dist?, rng))
                    .collect()
            }
            InteriorMode::Sequential => {
                let mut interior = Vec::with_capacity(request.span - 1);
                let mut current = request.start;
                for offset in 0..request.span - 1 {
                    let remaining = GenerationRequest::new(current, request.end, request.span - offset);
                    current = self.draw(&remaining, 1, rng)?;
                    interior.push(current);
                }
                Ok(interior)
            }
            InteriorMode::Bisection => {
                let mut interior = vec![0; request.span - 1];
                self.fill_bisect(&mut interior, request.start, request.end, rng)?;
                Ok(interior)
            }
        }
    }

    /// Fill `slots`, which sit strictly between `left` and `right`.
    fn fill_bisect(
        &mut self,
        slots: &mut [usize],
        left: usize,
        right: usize,
        rng: &mut impl RandomSource,
    ) -> Result<()> {
        if slots.is_empty() {
            return Ok(());
        }
        let mid = slots.len() / 2;
        let request = GenerationRequest::new(left, right, slots.len() + 1);
        let chord = self.draw(&request, mid + 1, rng)?;
        slots[mid] = chord;
        let (before, rest) = slots.split_at_mut(mid);
        self.fill_bisect(before, left, chord, rng)?;
        self.fill_bisect(&mut rest[1..], chord, right, rng)
    }
}

/// Normalized weights `(P^(n-g))[j][k] * (P^g)[k][i]` for the chord at
/// position g, given `P^g` and `P^(n-g)`.
fn bridge_weights(request: &GenerationRequest, from_start: &Matrix, to_end: &Matrix) -> Result<Vec<f64>> {
    let mut weights: Vec<f64> = from_start
        .column(request.start)
        .iter()
        .enumerate()
        .map(|(k, &reach)| to_end.get(request.end, k) * reach)
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= EPSILON {
        return Err(BridgeError::UnreachableEndpoint {
            start: request.start,
            end: request.end,
            span: request.span,
        });
    }
    for w in &mut weights {
        *w /= total;
    }
    Ok(weights)
}

fn pick(
    request: &GenerationRequest,
    position: usize,
    dist: &[f64],
    rng: &mut impl RandomSource,
) -> Result<usize> {
    let chord = rng
        .weighted_index(dist)
        .ok_or(BridgeError::UnreachableEndpoint {
            start: request.start,
            end: request.end,
            span: request.span,
        })?;
    trace!(
        start = request.start,
        end = request.end,
        span = request.span,
        position,
        chord,
        "drew interior chord"
    );
    Ok(chord)
}

/// One unconditioned Markov step from `from`.
pub fn step(
    transitions: &TransitionMatrix,
    from: usize,
    rng: &mut impl RandomSource,
) -> Result<usize> {
    let successors = transitions.successors(from)?;
    rng.weighted_index(successors)
        .ok_or(BridgeError::NoSuccessor { chord: from })
}

/// Free-running walk of `steps` chords after `start` (not including it).
pub fn walk(
    transitions: &TransitionMatrix,
    start: usize,
    steps: usize,
    rng: &mut impl RandomSource,
) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(steps);
    let mut current = start;
    for _ in 0..steps {
        current = step(transitions, current, rng)?;
        out.push(current);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::train;
    use chord_bridge_prng::BridgeRng;

    /// 0 -> 1 -> 2 -> 3 -> 0, deterministic.
    fn cycle4() -> TransitionMatrix {
        let mut m = Matrix::zeros(4);
        for from in 0..4 {
            m.set((from + 1) % 4, from, 1.0);
        }
        TransitionMatrix::from_matrix(m).unwrap()
    }

    /// A small chain with branching and a forbidden 2 -> 0 step.
    fn branching() -> TransitionMatrix {
        train(
            &[
                vec![0usize, 1, 2, 3, 0, 2, 1, 3, 0],
                vec![1, 0, 3, 2, 3, 1, 1, 2],
            ],
            4,
        )
        .unwrap()
    }

    #[test]
    fn deterministic_cycle_has_a_single_bridge() {
        let tm = cycle4();
        let mut sampler = BridgeSampler::new(&tm);
        let request = GenerationRequest::new(0, 3, 3);
        assert_eq!(sampler.distribution(&request, 1).unwrap(), [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(sampler.distribution(&request, 2).unwrap(), [0.0, 0.0, 1.0, 0.0]);
        let mut rng = BridgeRng::new(3);
        for mode in [InteriorMode::Marginal, InteriorMode::Sequential, InteriorMode::Bisection] {
            assert_eq!(sampler.sample_interior(&request, mode, &mut rng).unwrap(), [1, 2]);
        }
    }

    #[test]
    fn parity_makes_endpoints_unreachable() {
        // On a 4-cycle, three steps from 0 always land on 3.
        let tm = cycle4();
        let mut sampler = BridgeSampler::new(&tm);
        let mut rng = BridgeRng::new(1);
        let err = sampler
            .sample_interior(&GenerationRequest::new(0, 2, 3), InteriorMode::Marginal, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnreachableEndpoint {
                start: 0,
                end: 2,
                span: 3
            }
        ));
    }

    #[test]
    fn dead_start_column_is_unreachable() {
        // Chord 2 is only ever a final chord.
        let tm = train(&[vec![0usize, 1, 0, 2]], 3).unwrap();
        let mut sampler = BridgeSampler::new(&tm);
        let err = sampler
            .distribution(&GenerationRequest::new(2, 0, 4), 2)
            .unwrap_err();
        assert!(err.is_reachability_failure());
    }

    #[test]
    fn distributions_sum_to_one() {
        let tm = branching();
        let mut sampler = BridgeSampler::new(&tm);
        for start in 0..4 {
            for end in 0..4 {
                let request = GenerationRequest::new(start, end, 7);
                for position in 1..7 {
                    let dist = sampler.distribution(&request, position).unwrap();
                    let sum: f64 = dist.iter().sum();
                    assert!((sum - 1.0).abs() < EPSILON, "sum {sum} at {start}->{end} g={position}");
                    assert!(dist.iter().all(|&p| p >= 0.0));
                }
            }
        }
    }

    #[test]
    fn bridge_matches_brute_force_enumeration() {
        let tm = branching();
        let p = tm.matrix();
        let (start, end) = (0, 3);
        // Enumerate every path 0 -> a -> b -> 3 and accumulate Pr(x_1 = a).
        let mut expected = [0.0; 4];
        for a in 0..4 {
            for b in 0..4 {
                expected[a] += p.get(a, start) * p.get(b, a) * p.get(end, b);
            }
        }
        let total: f64 = expected.iter().sum();
        let mut sampler = BridgeSampler::new(&tm);
        let dist = sampler
            .distribution(&GenerationRequest::new(start, end, 3), 1)
            .unwrap();
        for k in 0..4 {
            assert!((dist[k] - expected[k] / total).abs() < EPSILON);
        }
    }

    #[test]
    fn span_one_has_no_interior() {
        let tm = branching();
        let mut sampler = BridgeSampler::new(&tm);
        let mut rng = BridgeRng::new(9);
        let interior = sampler
            .sample_interior(&GenerationRequest::new(0, 2, 1), InteriorMode::Marginal, &mut rng)
            .unwrap();
        assert!(interior.is_empty());
        assert!(sampler.cache().is_empty());
    }

    #[test]
    fn invalid_requests() {
        let tm = branching();
        let mut sampler = BridgeSampler::new(&tm);
        let mut rng = BridgeRng::new(0);
        assert!(matches!(
            sampler.sample_interior(&GenerationRequest::new(0, 1, 0), InteriorMode::Marginal, &mut rng),
            Err(BridgeError::InvalidLength { .. })
        ));
        assert!(matches!(
            sampler.distribution(&GenerationRequest::new(0, 7, 3), 1),
            Err(BridgeError::IndexOutOfRange { index: 7, size: 4 })
        ));
        assert!(matches!(
            sampler.distribution(&GenerationRequest::new(0, 1, 3), 3),
            Err(BridgeError::IndexOutOfRange { index: 3, size: 3 })
        ));
        assert!(matches!(
            sampler.distribution(&GenerationRequest::new(0, 1, 3), 0),
            Err(BridgeError::IndexOutOfRange { index: 0, size: 3 })
        ));
    }

    #[test]
    fn joint_modes_respect_every_transition() {
        let tm = branching();
        let mut sampler = BridgeSampler::new(&tm);
        let mut rng = BridgeRng::new(2024);
        for mode in [InteriorMode::Sequential, InteriorMode::Bisection] {
            for _ in 0..200 {
                let request = GenerationRequest::new(0, 3, 9);
                let interior = sampler.sample_interior(&request, mode, &mut rng).unwrap();
                assert_eq!(interior.len(), 8);
                let mut chain = vec![request.start];
                chain.extend(&interior);
                chain.push(request.end);
                for pair in chain.windows(2) {
                    assert!(
                        tm.probability(pair[0], pair[1]) > 0.0,
                        "{mode} produced forbidden step {} -> {}",
                        pair[0],
                        pair[1]
                    );
                }
            }
        }
    }

    #[test]
    fn same_seed_same_interior() {
        let tm = branching();
        for mode in [InteriorMode::Marginal, InteriorMode::Sequential, InteriorMode::Bisection] {
            let request = GenerationRequest::new(1, 2, 10);
            let a = BridgeSampler::new(&tm)
                .sample_interior(&request, mode, &mut BridgeRng::new(77))
                .unwrap();
            let b = BridgeSampler::new(&tm)
                .sample_interior(&request, mode, &mut BridgeRng::new(77))
                .unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn reused_sampler_computes_each_power_once() {
        let tm = branching();
        let mut sampler = BridgeSampler::new(&tm);
        let mut rng = BridgeRng::new(5);
        let request = GenerationRequest::new(0, 3, 8);
        sampler
            .sample_interior(&request, InteriorMode::Marginal, &mut rng)
            .unwrap();
        let after_first = sampler.cache().multiplications();
        // Exponents 1..=7 are all needed; none may be recomputed.
        assert_eq!(sampler.cache().len(), 7);
        sampler
            .sample_interior(&request, InteriorMode::Marginal, &mut rng)
            .unwrap();
        assert_eq!(sampler.cache().multiplications(), after_first);
    }

    #[test]
    fn walk_follows_transitions() {
        let tm = cycle4();
        let mut rng = BridgeRng::new(11);
        assert_eq!(walk(&tm, 1, 6, &mut rng).unwrap(), [2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn walk_stops_at_dead_end() {
        let tm = train(&[vec![0usize, 1]], 2).unwrap();
        let mut rng = BridgeRng::new(11);
        let err = walk(&tm, 0, 3, &mut rng).unwrap_err();
        assert!(matches!(err, BridgeError::NoSuccessor { chord: 1 }));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Bisection".parse::<InteriorMode>().unwrap(), InteriorMode::Bisection);
        assert_eq!(InteriorMode::Sequential.to_string(), "sequential");
        assert!("joint".parse::<InteriorMode>().is_err());
    }
}
