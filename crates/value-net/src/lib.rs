//! Counterfactual value network and replay infrastructure.
//!
//! This crate supplies the external collaborators the solver core only
//! states contracts for: a candle-based value network over packed queries,
//! a replica pool serializing device access, a prioritized replay buffer,
//! and [`BufferedValueNet`], the [`ValueNet`] implementation that wires the
//! three together for the data-generation workers.

pub mod locker;
pub mod network;
pub mod replay;

use std::sync::Arc;

use thiserror::Error;

use toss_solver_core::SolverError;
use toss_solver_core::net::ValueNet;

pub use locker::ModelLocker;
pub use network::CounterfactualValueNet;
pub use replay::{PrioritizedReplay, TrainingExample};

/// Errors from network construction, loading and inference.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shape mismatch: {0}")]
    Shape(String),
}

/// [`ValueNet`] backed by locked network replicas and a replay sink.
///
/// `compute_values` acquires a free replica for the duration of one batched
/// forward pass; `add_training_example` appends to the replay buffer at
/// maximal priority so fresh examples are sampled early.
pub struct BufferedValueNet {
    locker: Arc<ModelLocker>,
    replay: Arc<PrioritizedReplay<TrainingExample>>,
}

impl BufferedValueNet {
    #[must_use]
    pub fn new(
        locker: Arc<ModelLocker>,
        replay: Arc<PrioritizedReplay<TrainingExample>>,
    ) -> Self {
        Self { locker, replay }
    }
}

impl ValueNet for BufferedValueNet {
    fn compute_values(&self, queries: &[f32], query_size: usize) -> Result<Vec<f32>, SolverError> {
        let replica = self.locker.acquire();
        replica
            .compute_batch(queries, query_size)
            .map_err(|err| SolverError::Evaluator(err.to_string()))
    }

    fn add_training_example(&self, query: &[f32], values: &[f32]) -> Result<(), SolverError> {
        self.replay.push(TrainingExample {
            query: query.to_vec(),
            values: values.to_vec(),
        });
        Ok(())
    }
}
