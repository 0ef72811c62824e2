// Matrix power engine: binary exponentiation with a per-run memo table.
//
// `P^k` is built from `P^(k/2)` squared (times `P` when `k` is odd), so any
// exponent costs at most floor(log2 k) + 1 multiplications, and every
// intermediate power lands in the cache. A phrase of span n needs `P^g` and
// `P^(n-g)` for every interior g; the two families overlap heavily and all
// phrases of one run share the same span, so the table turns O(n log n)
// multiplications into a handful.
//
// After every multiplication the product's columns are renormalized to keep
// repeated squaring from drifting off the stochastic simplex (see
// `Matrix::renormalize_columns` for which columns qualify).
//
// A `PowerCache` borrows its base matrix and is meant to live for one
// generation call. It is not shared between concurrent runs.

use std::ops::Range;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::matrix::Matrix;

/// Memoized powers of a single base matrix, keyed by exponent.
#[derive(Debug)]
pub struct PowerCache<'a> {
    base: &'a Matrix,
    powers: FxHashMap<usize, Matrix>,
    multiplications: usize,
}

impl<'a> PowerCache<'a> {
    pub fn new(base: &'a Matrix) -> Self {
        PowerCache {
            base,
            powers: FxHashMap::default(),
            multiplications: 0,
        }
    }

    pub fn base(&self) -> &'a Matrix {
        self.base
    }

    /// Make sure `base^k` is in the table.
    pub fn ensure(&mut self, k: usize) {
        if self.powers.contains_key(&k) {
            return;
        }
        let value = match k {
            0 => Matrix::identity(self.base.size()),
            1 => self.base.clone(),
            _ => {
                let half = k / 2;
                self.ensure(half);
                let half_power = &self.powers[&half];
                let mut product = half_power.multiply(half_power);
                product.renormalize_columns();
                let mut steps = 1;
                if k % 2 == 1 {
                    product = product.multiply(self.base);
                    product.renormalize_columns();
                    steps += 1;
                }
                self.multiplications += steps;
                trace!(exponent = k, steps, "computed matrix power");
                product
            }
        };
        self.powers.insert(k, value);
    }

    /// `base^a` and `base^b` together, computing either on first request.
    pub fn pair(&mut self, a: usize, b: usize) -> (&Matrix, &Matrix) {
        self.ensure(a);
        self.ensure(b);
        (&self.powers[&a], &self.powers[&b])
    }

    /// `base^k` for every `k` in `exponents`, in order.
    pub fn powers(&mut self, exponents: Range<usize>) -> Vec<&Matrix> {
        for k in exponents.clone() {
            self.ensure(k);
        }
        exponents.map(|k| &self.powers[&k]).collect()
    }

    /// `base^k`, computing it on first request.
    pub fn power(&mut self, k: usize) -> &Matrix {
        self.ensure(k);
        &self.powers[&k]
    }

    /// `base^k` if it has already been computed.
    pub fn get(&self, k: usize) -> Option<&Matrix> {
        self.powers.get(&k)
    }

    /// Total matrix multiplications performed by this cache.
    pub fn multiplications(&self) -> usize {
        self.multiplications
    }

    /// Number of distinct exponents held.
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }
}

/// `m^k` without keeping a cache around.
pub fn matrix_power(m: &Matrix, k: usize) -> Matrix {
    let mut cache = PowerCache::new(m);
    cache.power(k).clone()
}
