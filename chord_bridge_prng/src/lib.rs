// Deterministic, portable random source for chord sampling.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding,
// plus the `RandomSource` trait that every sampling call in `chord_bridge`
// takes as an explicit argument. Nothing in the workspace reaches for an
// ambient or thread-local generator: a caller that wants reproducible output
// constructs a `BridgeRng` from a seed and passes it down.
//
// The trait is the seam for swapping sources. Tests can plug in a scripted
// source that returns fixed values, and concurrent callers each own their own
// generator so no state is shared between generation runs.
//
// **Critical constraint: determinism.** The integer core must produce
// identical output given the same prior state, on every platform. The only
// floating-point step is the final conversion to a unit-interval `f64`, which
// is exact (53 bits into a 53-bit mantissa).

use serde::{Deserialize, Serialize};

/// A source of uniformly distributed random bits.
///
/// Implementors supply `next_u64`; the unit-interval float and weighted
/// selection are derived from it so every source draws the same way.
pub trait RandomSource {
    /// Next raw 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Uniform `f64` in [0, 1), built from the upper 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Pick an index with probability proportional to its weight.
    ///
    /// Returns `None` if the slice is empty, any weight is negative or not
    /// finite, or the weights sum to zero. Consumes exactly one draw when it
    /// returns `Some`.
    fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total = weight_total(weights)?;
        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(i);
            if cumulative > target {
                return Some(i);
            }
        }
        // Rounding can leave `cumulative` a hair under `target`.
        last_positive
    }
}

fn weight_total(weights: &[f64]) -> Option<f64> {
    let mut total = 0.0;
    for &w in weights {
        if !w.is_finite() || w < 0.0 {
            return None;
        }
        total += w;
    }
    (total > 0.0).then_some(total)
}

/// Xoshiro256++ PRNG, the workspace's seedable random source.
///
/// Two instances created with the same seed produce identical streams, which
/// is what makes `(models, request, seed)` fully reproducible.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeRng {
    s: [u64; 4],
}

impl BridgeRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }
}

impl RandomSource for BridgeRng {
    fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed list of unit-interval values.
    struct Scripted {
        values: Vec<f64>,
        pos: usize,
    }

    impl RandomSource for Scripted {
        fn next_u64(&mut self) -> u64 {
            unreachable!("scripted source only yields floats")
        }

        fn next_f64(&mut self) -> f64 {
            let v = self.values[self.pos % self.values.len()];
            self.pos += 1;
            v
        }
    }

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = BridgeRng::new(42);
        let mut b = BridgeRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = BridgeRng::new(42);
        let mut b = BridgeRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = BridgeRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn weighted_index_follows_cumulative_weights() {
        let mut src = Scripted {
            values: vec![0.0, 0.24, 0.26, 0.99],
            pos: 0,
        };
        let weights = [0.25, 0.0, 0.75];
        assert_eq!(src.weighted_index(&weights), Some(0));
        assert_eq!(src.weighted_index(&weights), Some(0));
        assert_eq!(src.weighted_index(&weights), Some(2));
        assert_eq!(src.weighted_index(&weights), Some(2));
    }

    #[test]
    fn weighted_index_never_picks_zero_weight() {
        let mut rng = BridgeRng::new(7);
        let weights = [0.0, 1.0, 0.0, 3.0];
        for _ in 0..5_000 {
            let i = rng.weighted_index(&weights).unwrap();
            assert!(i == 1 || i == 3, "picked zero-weight index {i}");
        }
    }

    #[test]
    fn weighted_index_rejects_degenerate_weights() {
        let mut rng = BridgeRng::new(1);
        assert_eq!(rng.weighted_index(&[]), None);
        assert_eq!(rng.weighted_index(&[0.0, 0.0]), None);
        assert_eq!(rng.weighted_index(&[1.0, -0.5]), None);
        assert_eq!(rng.weighted_index(&[f64::NAN, 1.0]), None);
    }

    #[test]
    fn weighted_index_distribution() {
        let mut rng = BridgeRng::new(42);
        let weights = [1.0, 3.0];
        let n = 20_000;
        let ones = (0..n)
            .filter(|_| rng.weighted_index(&weights) == Some(1))
            .count();
        let pct = ones as f64 / n as f64;
        assert!(
            (0.72..0.78).contains(&pct),
            "expected ~75% for weight 3 of 4, got {:.1}%",
            pct * 100.0
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = BridgeRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: BridgeRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
