//! Subgame solvers over the public tree.
//!
//! Two iterative solvers share the reach/value kernels in [`traverser`]:
//! fictitious play ([`fp::FpSolver`]) and counterfactual regret minimization
//! ([`cfr::CfrSolver`], covering vanilla, linear and discounted variants).
//! [`stats`] reuses the best-response solver for exploitability and EV
//! measurement.

mod br;
pub mod cfr;
pub mod fp;
pub mod stats;
pub mod traverser;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Game, PartialPublicState, PlayerId};
use crate::net::ValueNet;
use crate::tree::Tree;

pub use cfr::CfrSolver;
pub use fp::FpSolver;
pub use stats::{
    compute_ev, compute_ev2, compute_exploitability, compute_exploitability2,
    compute_immediate_regrets, write_strategy,
};

/// Parameters of one subgame solve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubgameSolvingParams {
    pub num_iters: usize,
    /// Depth bound of the unrolled subgame tree.
    pub max_depth: usize,
    /// Weight iteration `k` proportionally to `k` in the averages.
    pub linear_update: bool,
    /// FP only: average `sum + last` instead of `sum` (RM+-style).
    pub optimistic: bool,
    /// Select CFR instead of fictitious play.
    pub use_cfr: bool,
    /// CFR only: discounted CFR schedules parameterised by alpha/beta/gamma.
    pub dcfr: bool,
    pub dcfr_alpha: f64,
    pub dcfr_beta: f64,
    pub dcfr_gamma: f64,
}

impl Default for SubgameSolvingParams {
    fn default() -> Self {
        Self {
            num_iters: 10,
            max_depth: 2,
            linear_update: false,
            optimistic: false,
            use_cfr: false,
            dcfr: false,
            dcfr_alpha: 1.5,
            dcfr_beta: 0.0,
            dcfr_gamma: 2.0,
        }
    }
}

/// Per-node strategy tensor, `[num_nodes][num_hands][num_actions]` flattened.
///
/// Depending on the accessor a row is either a probability distribution over
/// the node's legal actions or a reach-weighted accumulation of one.
#[derive(Debug, Clone)]
pub struct TreeStrategy {
    num_hands: usize,
    num_actions: usize,
    data: Vec<f64>,
}

impl TreeStrategy {
    #[must_use]
    pub fn zeros(num_nodes: usize, num_hands: usize, num_actions: usize) -> Self {
        Self {
            num_hands,
            num_actions,
            data: vec![0.0; num_nodes * num_hands * num_actions],
        }
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.data.len() / (self.num_hands * self.num_actions)
    }

    #[must_use]
    pub fn num_hands(&self) -> usize {
        self.num_hands
    }

    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Action values for one `(node, hand)` row.
    #[must_use]
    pub fn row(&self, node: usize, hand: usize) -> &[f64] {
        let start = (node * self.num_hands + hand) * self.num_actions;
        &self.data[start..start + self.num_actions]
    }

    #[must_use]
    pub fn row_mut(&mut self, node: usize, hand: usize) -> &mut [f64] {
        let start = (node * self.num_hands + hand) * self.num_actions;
        &mut self.data[start..start + self.num_actions]
    }

    /// All rows of one node, `[num_hands * num_actions]`.
    #[must_use]
    pub fn node(&self, node: usize) -> &[f64] {
        let size = self.num_hands * self.num_actions;
        &self.data[node * size..(node + 1) * size]
    }

    #[must_use]
    pub fn node_mut(&mut self, node: usize) -> &mut [f64] {
        let size = self.num_hands * self.num_actions;
        &mut self.data[node * size..(node + 1) * size]
    }
}

/// Common operation set of the FP and CFR solvers.
pub trait SubgameSolver {
    /// Run one iteration for the given traverser.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures; a failing step leaves the solver in an
    /// unusable state and the instance must be discarded.
    fn step(&mut self, traverser: PlayerId) -> Result<(), SolverError>;

    /// Run `num_iters` iterations with alternating traversers.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::step`].
    fn multistep(&mut self) -> Result<(), SolverError>;

    /// Emit one training example per traverser at the subgame root.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures.
    fn update_value_network(&mut self) -> Result<(), SolverError>;

    /// The averaged strategy, the solver's actual output.
    fn strategy(&self) -> &TreeStrategy;

    /// Strategy the driver samples successor states from.
    fn sampling_strategy(&self) -> &TreeStrategy;

    /// Strategy the driver updates beliefs with while descending.
    fn belief_propagation_strategy(&self) -> &TreeStrategy;

    /// Averaged root values for `player`, one entry per hand.
    fn hand_values(&self, player: PlayerId) -> &[f64];

    fn tree(&self) -> &Arc<Tree>;
}

/// Construct the solver selected by `params` over a freshly unrolled subgame.
///
/// # Errors
///
/// Configuration errors: zero depth, or a depth-truncated tree without a
/// value net.
pub fn build_solver(
    game: &Game,
    root: &PartialPublicState,
    beliefs: Pair<Vec<f64>>,
    params: &SubgameSolvingParams,
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<Box<dyn SubgameSolver>, SolverError> {
    if params.max_depth == 0 {
        return Err(SolverError::Config("max_depth must be positive".into()));
    }
    if params.use_cfr {
        Ok(Box::new(CfrSolver::new(
            *game, root, value_net, beliefs, *params,
        )?))
    } else {
        Ok(Box::new(FpSolver::new(
            *game, root, value_net, beliefs, *params,
        )?))
    }
}

/// Uniform strategy: each legal-action interval receives `1/width`, all
/// other entries stay zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn uniform_strategy(game: &Game, tree: &Tree) -> TreeStrategy {
    let mut strategy = TreeStrategy::zeros(tree.len(), game.num_hands(), game.num_actions());
    for (node_id, node) in tree.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        let range = game.legal_action_range(&node.state);
        let width = range.len() as f64;
        for hand in 0..game.num_hands() {
            strategy.row_mut(node_id, hand)[range.clone()].fill(1.0 / width);
        }
    }
    strategy
}

/// Uniform strategy scaled by the acting player's reach at each node.
///
/// Seeds the strategy-sum accumulators so the very first average is
/// well-defined.
#[must_use]
pub fn uniform_reach_weighted_strategy(
    game: &Game,
    tree: &Tree,
    initial_beliefs: &Pair<Vec<f64>>,
) -> TreeStrategy {
    let mut strategy = uniform_strategy(game, tree);
    let mut reaches = vec![vec![0.0; game.num_hands()]; tree.len()];
    for traverser in 0..2 {
        traverser::compute_reach_probabilities(
            game,
            tree,
            &strategy,
            &initial_beliefs[traverser],
            traverser,
            &mut reaches,
        );
        for (node_id, node) in tree.iter().enumerate() {
            if node.is_leaf() || Game::active_player(&node.state) != traverser {
                continue;
            }
            let range = game.legal_action_range(&node.state);
            for hand in 0..game.num_hands() {
                let reach = reaches[node_id][hand];
                for value in &mut strategy.row_mut(node_id, hand)[range.clone()] {
                    *value *= reach;
                }
            }
        }
    }
    strategy
}
