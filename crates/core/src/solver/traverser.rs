//! Shared reach/value kernels for the tree solvers.
//!
//! [`TreeTraverser`] owns the per-node reach probabilities and traverser
//! values, packs queries for pseudo-leaves (depth-truncated non-terminals)
//! and computes exact expected values at terminals. FP, CFR and the
//! best-response solver all build on it.

use std::sync::Arc;

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Game, PartialPublicState, PlayerId};
use crate::hands::win_probability;
use crate::net::ValueNet;
use crate::query::{query_size, write_query_to};
use crate::solver::TreeStrategy;
use crate::tree::{Tree, incoming_action};

/// Top-down reach propagation for one player.
///
/// `out[node][hand] = P(root -> node | hand) * P(hand)`: starting from the
/// initial beliefs at the root, a node multiplies its parent's reach by the
/// parent's strategy probability on the incoming action whenever that action
/// was the player's own, and inherits it unchanged otherwise.
pub fn compute_reach_probabilities(
    game: &Game,
    tree: &Tree,
    strategy: &TreeStrategy,
    initial_beliefs: &[f64],
    player: PlayerId,
    out: &mut [Vec<f64>],
) {
    debug_assert_eq!(out.len(), tree.len());
    out[0].copy_from_slice(initial_beliefs);
    for node_id in 1..tree.len() {
        let parent = tree[node_id].parent.expect("non-root node has a parent");
        // Breadth-first layout guarantees parent < node_id.
        let (head, tail) = out.split_at_mut(node_id);
        let parent_reach = &head[parent];
        let node_reach = &mut tail[0];
        if Game::active_player(&tree[parent].state) == player {
            let action = incoming_action(game, tree, node_id);
            for (hand, slot) in node_reach.iter_mut().enumerate() {
                *slot = parent_reach[hand] * strategy.row(parent, hand)[action];
            }
        } else {
            node_reach.copy_from_slice(parent_reach);
        }
    }
}

/// Expected values for the traverser at a terminal node.
///
/// `win_probability` is already normalized to the opponent belief, so the
/// payoff `(2w - 1)` is rescaled by the opponent reach mass: the resulting
/// unnormalised expectations compose with plain sums at opponent-choice
/// interior nodes. `inverse` negates for the non-active traverser.
pub fn expected_terminal_values(
    game: &Game,
    state: &PartialPublicState,
    inverse: bool,
    opponent_reach: &[f64],
) -> Vec<f64> {
    let reach_sum: f64 = opponent_reach.iter().sum();
    let sign = if inverse { -1.0 } else { 1.0 };
    win_probability(game, state, opponent_reach)
        .into_iter()
        .map(|w| sign * (2.0 * w - 1.0) * reach_sum)
        .collect()
}

/// Reach and value state shared by the subgame solvers.
pub(crate) struct TreeTraverser {
    pub(crate) game: Game,
    pub(crate) tree: Arc<Tree>,
    /// `[player][node][hand]` reach probabilities, filled by
    /// [`Self::precompute_reaches`].
    pub(crate) reach_probabilities: Pair<Vec<Vec<f64>>>,
    /// `[node][hand]` values for the current traverser. Leaves are filled by
    /// [`Self::precompute_all_leaf_values`]; interior nodes are the caller's
    /// responsibility.
    pub(crate) traverser_values: Vec<Vec<f64>>,
    pseudo_leaves: Vec<usize>,
    terminals: Vec<usize>,
    query_buffer: Vec<f32>,
    value_net: Option<Arc<dyn ValueNet>>,
    query_size: usize,
}

impl TreeTraverser {
    /// # Errors
    ///
    /// Without a value net every leaf must be terminal; a truncated leaf is
    /// a configuration error.
    pub fn new(
        game: Game,
        tree: Arc<Tree>,
        value_net: Option<Arc<dyn ValueNet>>,
    ) -> Result<Self, SolverError> {
        let mut pseudo_leaves = Vec::new();
        let mut terminals = Vec::new();
        for (node_id, node) in tree.iter().enumerate() {
            if game.is_terminal(&node.state) {
                terminals.push(node_id);
            } else if node.is_leaf() {
                if value_net.is_none() {
                    return Err(SolverError::NonTerminalLeaf(game.state_string(&node.state)));
                }
                pseudo_leaves.push(node_id);
            }
        }

        let query_size = query_size(&game);
        Ok(Self {
            game,
            reach_probabilities: [
                vec![vec![0.0; game.num_hands()]; tree.len()],
                vec![vec![0.0; game.num_hands()]; tree.len()],
            ],
            traverser_values: vec![vec![0.0; game.num_hands()]; tree.len()],
            query_buffer: vec![0.0; pseudo_leaves.len() * query_size],
            pseudo_leaves,
            terminals,
            value_net,
            query_size,
            tree,
        })
    }

    /// Pack the query for `node_id` as seen by `traverser`.
    pub fn write_query(&self, node_id: usize, traverser: PlayerId, out: &mut [f32]) {
        let written = write_query_to(
            &self.game,
            traverser,
            &self.tree[node_id].state,
            &self.reach_probabilities[0][node_id],
            &self.reach_probabilities[1][node_id],
            out,
        );
        debug_assert_eq!(written, self.query_size);
    }

    /// Send one root training example to the evaluator's replay sink.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures.
    ///
    /// # Panics
    ///
    /// Panics if the solver was built without a value net.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_training_example(
        &self,
        traverser: PlayerId,
        values: &[f64],
    ) -> Result<(), SolverError> {
        let net = self
            .value_net
            .as_ref()
            .expect("training examples require a value net");
        let mut query = vec![0.0f32; self.query_size];
        self.write_query(0, traverser, &mut query);
        let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        net.add_training_example(&query, &values)
    }

    pub fn precompute_reaches_for(
        &mut self,
        strategy: &TreeStrategy,
        initial_beliefs: &[f64],
        player: PlayerId,
    ) {
        compute_reach_probabilities(
            &self.game,
            &self.tree,
            strategy,
            initial_beliefs,
            player,
            &mut self.reach_probabilities[player],
        );
    }

    pub fn precompute_reaches(&mut self, strategy: &TreeStrategy, beliefs: &Pair<Vec<f64>>) {
        self.precompute_reaches_for(strategy, &beliefs[0], 0);
        self.precompute_reaches_for(strategy, &beliefs[1], 1);
    }

    /// Fill `traverser_values` at every leaf: evaluator results at
    /// pseudo-leaves, exact showdown/fold values at terminals. Reaches for
    /// both players must be precomputed.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures.
    pub fn precompute_all_leaf_values(&mut self, traverser: PlayerId) -> Result<(), SolverError> {
        self.evaluate_pseudo_leaves(traverser)?;
        self.evaluate_terminals(traverser);
        Ok(())
    }

    /// Batch all pseudo-leaf queries into one evaluator call, then rescale
    /// each returned vector from "value given beliefs" to the opponent-reach
    /// scale of the terminal values.
    fn evaluate_pseudo_leaves(&mut self, traverser: PlayerId) -> Result<(), SolverError> {
        if self.pseudo_leaves.is_empty() {
            return Ok(());
        }
        let net = self
            .value_net
            .as_ref()
            .expect("pseudo-leaves require a value net")
            .clone();

        let mut buffer = std::mem::take(&mut self.query_buffer);
        for (row, &node_id) in self.pseudo_leaves.iter().enumerate() {
            let slot = &mut buffer[row * self.query_size..(row + 1) * self.query_size];
            self.write_query(node_id, traverser, slot);
        }
        let result = net.compute_values(&buffer, self.query_size);
        self.query_buffer = buffer;
        let values = result?;

        let num_hands = self.game.num_hands();
        assert_eq!(
            values.len(),
            self.pseudo_leaves.len() * num_hands,
            "evaluator returned a mis-shaped batch"
        );
        for (row, &node_id) in self.pseudo_leaves.iter().enumerate() {
            let scale: f64 = self.reach_probabilities[1 - traverser][node_id].iter().sum();
            let row_values = &values[row * num_hands..(row + 1) * num_hands];
            for (out, &v) in self.traverser_values[node_id].iter_mut().zip(row_values) {
                *out = f64::from(v) * scale;
            }
        }
        Ok(())
    }

    fn evaluate_terminals(&mut self, traverser: PlayerId) {
        for &node_id in &self.terminals {
            let state = &self.tree[node_id].state;
            let values = expected_terminal_values(
                &self.game,
                state,
                Game::active_player(state) != traverser,
                &self.reach_probabilities[1 - traverser][node_id],
            );
            self.traverser_values[node_id] = values;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ZeroNet;
    use crate::probability::initial_beliefs;
    use crate::solver::uniform_strategy;
    use crate::tree::unroll_tree;
    use test_macros::timed_test;

    #[timed_test(60)]
    fn reach_probabilities_multiply_own_actions_only() {
        let game = Game::new();
        let tree = unroll_tree(&game, &game.initial_state(), 2);
        let strategy = uniform_strategy(&game, &tree);
        let beliefs = initial_beliefs(&game);

        let mut reaches = vec![vec![0.0; game.num_hands()]; tree.len()];
        compute_reach_probabilities(&game, &tree, &strategy, &beliefs[0], 0, &mut reaches);

        let uniform = 1.0 / game.num_hands() as f64;
        let width = game.legal_action_range(&tree[0].state).len() as f64;
        // Root is player 0's node: children carry belief / width for player
        // 0, grandchildren (player 1 acting) inherit unchanged.
        for child in tree[0].children() {
            assert!((reaches[child][0] - uniform / width).abs() < 1e-15);
            for grandchild in tree[child].children() {
                assert!((reaches[grandchild][0] - uniform / width).abs() < 1e-15);
            }
        }
    }

    #[timed_test(60)]
    fn terminal_fold_values_are_zero_sum_flat() {
        let game = Game::new();
        let mut state = game.initial_state();
        state.street = crate::game::street::TERMINAL;
        // No board known to the solver: the degenerate 0.5 branch applies
        // and the reach-scaled payoff collapses to zero.
        let reach = vec![0.5 / game.num_hands() as f64; game.num_hands()];
        let values = expected_terminal_values(&game, &state, false, &reach);
        assert!(values.iter().all(|&v| v.abs() < 1e-12));
    }

    #[timed_test(60)]
    fn pseudo_leaves_use_the_net() {
        let game = Game::new();
        let tree = Arc::new(unroll_tree(&game, &game.initial_state(), 1));
        let net = Arc::new(ZeroNet::new(game.num_hands()));
        let mut tt = TreeTraverser::new(game, tree, Some(net)).unwrap();

        let strategy = uniform_strategy(&game, &tt.tree.clone());
        let beliefs = initial_beliefs(&game);
        tt.precompute_reaches(&strategy, &beliefs);
        tt.precompute_all_leaf_values(0).unwrap();

        // Zero net: every pseudo-leaf value is exactly zero; fold terminal
        // values are zero via the degenerate branch too.
        for node_id in 1..tt.tree.len() {
            assert!(tt.traverser_values[node_id].iter().all(|&v| v == 0.0));
        }
    }
}
