//! Contract with the external value evaluator.
//!
//! The solver only ever sees the evaluator through this trait: a pure batched
//! function from packed queries to per-hand values, plus an append-only sink
//! for training examples. Implementations must be safe to share across
//! worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::SolverError;

/// External value evaluator consumed at truncated leaves.
pub trait ValueNet: Send + Sync {
    /// Evaluate a batch of `queries.len() / query_size` packed queries.
    ///
    /// Returns a row-major `[num_queries, num_hands]` buffer of values
    /// normalized to the query's belief distributions.
    ///
    /// # Errors
    ///
    /// Evaluator failures are propagated verbatim to the calling worker.
    fn compute_values(&self, queries: &[f32], query_size: usize) -> Result<Vec<f32>, SolverError>;

    /// Append one `(query, values)` training example to the replay sink.
    ///
    /// # Errors
    ///
    /// Evaluator failures are propagated verbatim to the calling worker.
    fn add_training_example(&self, query: &[f32], values: &[f32]) -> Result<(), SolverError>;
}

/// Evaluator that predicts zero for every hand and counts appended examples.
///
/// Used to exercise solvers and drivers without a trained network.
pub struct ZeroNet {
    num_hands: usize,
    examples_added: AtomicUsize,
}

impl ZeroNet {
    #[must_use]
    pub fn new(num_hands: usize) -> Self {
        Self {
            num_hands,
            examples_added: AtomicUsize::new(0),
        }
    }

    /// Number of training examples offered so far.
    #[must_use]
    pub fn num_examples_added(&self) -> usize {
        self.examples_added.load(Ordering::Relaxed)
    }
}

impl ValueNet for ZeroNet {
    fn compute_values(&self, queries: &[f32], query_size: usize) -> Result<Vec<f32>, SolverError> {
        assert_eq!(queries.len() % query_size, 0, "ragged query batch");
        let num_queries = queries.len() / query_size;
        Ok(vec![0.0; num_queries * self.num_hands])
    }

    fn add_training_example(&self, query: &[f32], values: &[f32]) -> Result<(), SolverError> {
        assert!(!query.is_empty());
        assert_eq!(values.len(), self.num_hands);
        self.examples_added.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
