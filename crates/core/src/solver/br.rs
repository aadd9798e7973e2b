//! Best-response solver.
//!
//! One bottom-up sweep against a fixed opponent strategy: `max` over actions
//! at traverser-controlled nodes, plain sums at opponent nodes (opponent
//! reach is embedded in the leaf values). Reused as FP's inner loop and for
//! exploitability measurement.

use std::sync::Arc;

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Game, PlayerId};
use crate::net::ValueNet;
use crate::solver::TreeStrategy;
use crate::solver::traverser::TreeTraverser;
use crate::tree::{Tree, children_actions};

pub(crate) struct BestResponseSolver {
    pub(crate) traverser: TreeTraverser,
    /// Pure best-response strategy per hand; rows are only meaningful at
    /// nodes the last `compute_br` traverser controls.
    br_strategy: TreeStrategy,
}

impl BestResponseSolver {
    pub fn new(
        game: Game,
        tree: Arc<Tree>,
        value_net: Option<Arc<dyn ValueNet>>,
    ) -> Result<Self, SolverError> {
        let br_strategy = TreeStrategy::zeros(tree.len(), game.num_hands(), game.num_actions());
        Ok(Self {
            traverser: TreeTraverser::new(game, tree, value_net)?,
            br_strategy,
        })
    }

    /// Recompute the best response for `traverser` against
    /// `opponent_strategy` and return the per-hand root values.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures from pseudo-leaf evaluation.
    pub fn compute_br(
        &mut self,
        traverser: PlayerId,
        opponent_strategy: &TreeStrategy,
        initial_beliefs: &Pair<Vec<f64>>,
    ) -> Result<Vec<f64>, SolverError> {
        self.traverser
            .precompute_reaches(opponent_strategy, initial_beliefs);
        self.traverser.precompute_all_leaf_values(traverser)?;

        let game = self.traverser.game;
        let tree = self.traverser.tree.clone();
        let num_hands = game.num_hands();

        for node_id in (0..tree.len()).rev() {
            let node = &tree[node_id];
            if node.is_leaf() {
                continue;
            }
            let mut value = vec![0.0; num_hands];
            if Game::active_player(&node.state) == traverser {
                let mut best_action = vec![0usize; num_hands];
                for (position, (child, action)) in children_actions(&game, node).enumerate() {
                    let child_values = &self.traverser.traverser_values[child];
                    for hand in 0..num_hands {
                        if position == 0 || child_values[hand] > value[hand] {
                            value[hand] = child_values[hand];
                            best_action[hand] = action;
                        }
                    }
                }
                for (hand, &action) in best_action.iter().enumerate() {
                    let row = self.br_strategy.row_mut(node_id, hand);
                    row.fill(0.0);
                    row[action] = 1.0;
                }
            } else {
                for child in node.children() {
                    let child_values = &self.traverser.traverser_values[child];
                    for (slot, &v) in value.iter_mut().zip(child_values) {
                        *slot += v;
                    }
                }
            }
            self.traverser.traverser_values[node_id] = value;
        }

        Ok(self.traverser.traverser_values[0].clone())
    }

    pub fn strategy(&self) -> &TreeStrategy {
        &self.br_strategy
    }
}
