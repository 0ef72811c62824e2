// Transition trainer: counts chord-to-chord steps and normalizes them into a
// column-stochastic matrix.
//
// `count[to][from]` is the number of times `from` is immediately followed by
// `to`. Each column with a positive total is divided by that total; a chord
// never observed as a predecessor keeps an all-zero column and must never be
// used as a sampling source (the sampler reports that as a reachability
// failure rather than inventing a distribution).
//
// The same trainer serves both models the orchestrator needs:
// - intra-phrase: every phrase of the corpus, optionally wrapped cyclically;
// - boundary: per piece, the chain `start_1, end_1, start_2, end_2, ...`.
//
// Alongside the matrix, training keeps the empirical occupancy of each chord
// as a transition source. It serves as the stationary start distribution when
// a caller asks for a progression without naming the first chord.

use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::matrix::{EPSILON, Matrix};

/// Raw transition counts over a fixed vocabulary size.
#[derive(Debug, Clone)]
pub struct TransitionCounts {
    counts: Matrix,
    transitions: u64,
}

impl TransitionCounts {
    pub fn new(vocabulary_size: usize) -> Self {
        TransitionCounts {
            counts: Matrix::zeros(vocabulary_size),
            transitions: 0,
        }
    }

    fn check(&self, sequence: &[usize]) -> Result<()> {
        let size = self.counts.size();
        match sequence.iter().find(|&&i| i >= size) {
            Some(&index) => Err(BridgeError::IndexOutOfRange { index, size }),
            None => Ok(()),
        }
    }

    fn add(&mut self, from: usize, to: usize) {
        let current = self.counts.get(to, from);
        self.counts.set(to, from, current + 1.0);
        self.transitions += 1;
    }

    /// Record every adjacent pair of `sequence`.
    pub fn record(&mut self, sequence: &[usize]) -> Result<()> {
        self.check(sequence)?;
        for pair in sequence.windows(2) {
            self.add(pair[0], pair[1]);
        }
        Ok(())
    }

    /// Record adjacent pairs plus the wrap-around step from the last chord
    /// back to the first. Sequences shorter than two contribute nothing.
    pub fn record_cyclic(&mut self, sequence: &[usize]) -> Result<()> {
        self.record(sequence)?;
        if let [first, .., last] = sequence {
            self.add(*last, *first);
        }
        Ok(())
    }

    /// Number of transitions recorded so far.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Raw count of `from -> to`.
    pub fn count(&self, from: usize, to: usize) -> f64 {
        self.counts.get(to, from)
    }

    /// Normalize into a `TransitionMatrix`.
    pub fn normalize(self) -> Result<TransitionMatrix> {
        if self.transitions == 0 {
            return Err(BridgeError::EmptyCorpus);
        }
        let size = self.counts.size();
        let total = self.transitions as f64;
        let mut matrix = Matrix::zeros(size);
        let mut occupancy = vec![0.0; size];
        for (from, share) in occupancy.iter_mut().enumerate() {
            let sum = self.counts.column_sum(from);
            *share = sum / total;
            if sum <= 0.0 {
                continue;
            }
            for to in 0..size {
                matrix.set(to, from, self.counts.get(to, from) / sum);
            }
        }
        let dead_columns = occupancy.iter().filter(|&&o| o == 0.0).count();
        debug!(
            size,
            transitions = self.transitions,
            dead_columns,
            "trained transition matrix"
        );
        TransitionMatrix::new(matrix, occupancy)
    }
}

/// Train a transition matrix from linear sequences over a vocabulary of
/// `vocabulary_size` chords.
pub fn train<S: AsRef<[usize]>>(corpus: &[S], vocabulary_size: usize) -> Result<TransitionMatrix> {
    let mut counts = TransitionCounts::new(vocabulary_size);
    for sequence in corpus {
        counts.record(sequence.as_ref())?;
    }
    counts.normalize()
}

/// A validated column-stochastic transition matrix. Read-only once built.
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    matrix: Matrix,
    occupancy: Vec<f64>,
}

impl TransitionMatrix {
    /// Wrap a matrix, checking the column-stochastic invariant.
    pub fn new(matrix: Matrix, occupancy: Vec<f64>) -> Result<Self> {
        let size = matrix.size();
        if occupancy.len() != size {
            return Err(BridgeError::IndexOutOfRange {
                index: occupancy.len(),
                size,
            });
        }
        if let Some(column) = matrix.first_non_stochastic_column() {
            return Err(BridgeError::NotStochastic { column });
        }
        Ok(TransitionMatrix { matrix, occupancy })
    }

    /// Build from a hand-written stochastic matrix with uniform occupancy
    /// over its live columns.
    pub fn from_matrix(matrix: Matrix) -> Result<Self> {
        let size = matrix.size();
        let live = (0..size)
            .filter(|&from| matrix.column_sum(from) > EPSILON)
            .count();
        let occupancy = (0..size)
            .map(|from| {
                if matrix.column_sum(from) > EPSILON {
                    1.0 / live as f64
                } else {
                    0.0
                }
            })
            .collect();
        Self::new(matrix, occupancy)
    }

    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Probability of `from -> to`.
    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.matrix.get(to, from)
    }

    /// Outgoing distribution of `from`; all zeros if `from` was never a
    /// predecessor.
    pub fn successors(&self, from: usize) -> Result<&[f64]> {
        if from >= self.size() {
            return Err(BridgeError::IndexOutOfRange {
                index: from,
                size: self.size(),
            });
        }
        Ok(self.matrix.column(from))
    }

    /// True if `from` has at least one observed successor.
    pub fn has_successors(&self, from: usize) -> bool {
        from < self.size() && self.matrix.column_sum(from) > EPSILON
    }

    /// Share of all recorded transitions that started at each chord.
    pub fn stationary(&self) -> &[f64] {
        &self.occupancy
    }
}
