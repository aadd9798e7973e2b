//! MLP counterfactual value network over packed queries.
//!
//! The network maps one flat query (state encoding plus both belief
//! vectors) to one value per hand, normalized to the query's beliefs. The
//! trunk is three hidden layers with skip connections on the square ones,
//! wide enough to be loaded from an externally trained safetensors
//! artifact.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder, linear};

use crate::NetError;

/// Batched query-to-values network.
pub struct CounterfactualValueNet {
    input: Linear,
    hidden1: Linear,
    hidden2: Linear,
    output: Linear,
    query_size: usize,
    num_hands: usize,
    device: Device,
}

impl CounterfactualValueNet {
    /// Build the network from a variable store.
    ///
    /// # Errors
    ///
    /// Fails when the store's tensors do not match the layer shapes.
    pub fn new(
        query_size: usize,
        num_hands: usize,
        hidden_dim: usize,
        vs: &VarBuilder,
    ) -> Result<Self, NetError> {
        let input = linear(query_size, hidden_dim, vs.pp("input"))?;
        let hidden1 = linear(hidden_dim, hidden_dim, vs.pp("hidden1"))?;
        let hidden2 = linear(hidden_dim, hidden_dim, vs.pp("hidden2"))?;
        let output = linear(hidden_dim, num_hands, vs.pp("output"))?;
        Ok(Self {
            input,
            hidden1,
            hidden2,
            output,
            query_size,
            num_hands,
            device: vs.device().clone(),
        })
    }

    /// Load trained weights from a safetensors artifact.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files or mismatched tensor shapes.
    pub fn load(
        path: &Path,
        query_size: usize,
        num_hands: usize,
        hidden_dim: usize,
        device: &Device,
    ) -> Result<Self, NetError> {
        let tensors = candle_core::safetensors::load(path, device)?;
        let vs = VarBuilder::from_tensors(tensors, DType::F32, device);
        Self::new(query_size, num_hands, hidden_dim, &vs)
    }

    /// Forward pass: `[batch, query_size]` to `[batch, num_hands]`.
    ///
    /// # Errors
    ///
    /// Propagates tensor-shape and device failures.
    pub fn forward(&self, queries: &Tensor) -> Result<Tensor, NetError> {
        let h = self.input.forward(queries)?.relu()?;
        let h = self.hidden1.forward(&h)?.add(&h)?.relu()?;
        let h = self.hidden2.forward(&h)?.add(&h)?.relu()?;
        Ok(self.output.forward(&h)?)
    }

    /// Evaluate a flat batch of queries, returning a flat row-major
    /// `[batch, num_hands]` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Shape`] on a ragged batch, otherwise propagates
    /// tensor failures.
    pub fn compute_batch(&self, queries: &[f32], query_size: usize) -> Result<Vec<f32>, NetError> {
        if query_size != self.query_size {
            return Err(NetError::Shape(format!(
                "query size {query_size} does not match the network's {}",
                self.query_size
            )));
        }
        if queries.len() % query_size != 0 {
            return Err(NetError::Shape(format!(
                "ragged batch: {} values for query size {query_size}",
                queries.len()
            )));
        }
        let batch = queries.len() / query_size;
        let input = Tensor::from_slice(queries, (batch, query_size), &self.device)?;
        let values = self.forward(&input)?;
        Ok(values.flatten_all()?.to_vec1::<f32>()?)
    }

    #[must_use]
    pub fn num_hands(&self) -> usize {
        self.num_hands
    }

    #[must_use]
    pub fn query_size(&self) -> usize {
        self.query_size
    }
}
