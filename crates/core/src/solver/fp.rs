//! Fictitious-play subgame solver.
//!
//! Each step computes a pure best response against the running average for
//! one traverser, folds the reach-weighted response into the strategy-sum
//! accumulator and renormalizes the average. With `linear_update` iteration
//! `k` contributes with weight proportional to `k`; with `optimistic` the
//! average is taken over `sum + last` instead of `sum`.

use std::sync::Arc;

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Game, PartialPublicState, PlayerId};
use crate::net::ValueNet;
use crate::probability::REGRET_SMOOTHING_EPS;
use crate::solver::br::BestResponseSolver;
use crate::solver::{
    SubgameSolver, SubgameSolvingParams, TreeStrategy, uniform_reach_weighted_strategy,
    uniform_strategy,
};
use crate::tree::{Tree, children_actions, unroll_tree};

pub struct FpSolver {
    params: SubgameSolvingParams,
    game: Game,
    /// Total number of `step` calls across both traversers.
    num_strategies: usize,
    initial_beliefs: Pair<Vec<f64>>,
    average: TreeStrategy,
    sum: TreeStrategy,
    last: TreeStrategy,
    /// Exponential running mean of root values per traverser.
    root_values_means: Pair<Vec<f64>>,
    tree: Arc<Tree>,
    br_solver: BestResponseSolver,
}

impl FpSolver {
    /// # Errors
    ///
    /// Configuration errors from tree validation (truncated leaves without a
    /// value net).
    pub fn new(
        game: Game,
        root: &PartialPublicState,
        value_net: Option<Arc<dyn ValueNet>>,
        beliefs: Pair<Vec<f64>>,
        params: SubgameSolvingParams,
    ) -> Result<Self, SolverError> {
        debug_assert!(!params.use_cfr);
        let tree = Arc::new(unroll_tree(&game, root, params.max_depth));
        let br_solver = BestResponseSolver::new(game, tree.clone(), value_net)?;

        let average = uniform_strategy(&game, &tree);
        let last = average.clone();
        let sum = uniform_reach_weighted_strategy(&game, &tree, &beliefs);
        Ok(Self {
            params,
            game,
            num_strategies: 0,
            initial_beliefs: beliefs,
            average,
            sum,
            last,
            root_values_means: [Vec::new(), Vec::new()],
            tree,
            br_solver,
        })
    }
}

impl SubgameSolver for FpSolver {
    #[allow(clippy::cast_precision_loss)]
    fn step(&mut self, traverser: PlayerId) -> Result<(), SolverError> {
        let root_values =
            self.br_solver
                .compute_br(traverser, &self.average, &self.initial_beliefs)?;

        // 1-based update index for this traverser under strict alternation.
        let num_update = self.num_strategies / 2 + 1;
        let alpha = if self.params.linear_update {
            2.0 / (num_update + 1) as f64
        } else {
            1.0 / num_update as f64
        };
        let means = &mut self.root_values_means[traverser];
        means.resize(root_values.len(), 0.0);
        for (mean, &value) in means.iter_mut().zip(&root_values) {
            *mean += (value - *mean) * alpha;
        }

        accumulate_best_response(
            &self.game,
            &self.tree,
            0,
            traverser,
            self.br_solver.strategy(),
            &self.initial_beliefs[traverser],
            &mut self.sum,
            &mut self.last,
        );

        let linear_scale = (num_update + 1) as f64 / (num_update + 2) as f64;
        for (node_id, node) in self.tree.iter().enumerate() {
            if node.is_leaf() || Game::active_player(&node.state) != traverser {
                continue;
            }
            let range = self.game.legal_action_range(&node.state);
            for hand in 0..self.game.num_hands() {
                if self.params.linear_update {
                    for value in self.sum.row_mut(node_id, hand) {
                        *value *= linear_scale;
                    }
                }
                let average_row = &mut self.average.row_mut(node_id, hand)[range.clone()];
                if self.params.optimistic {
                    let sum_row = &self.sum.row(node_id, hand)[range.clone()];
                    let last_row = &self.last.row(node_id, hand)[range.clone()];
                    let combined: Vec<f64> =
                        sum_row.iter().zip(last_row).map(|(&s, &l)| s + l).collect();
                    normalize_into(&combined, average_row);
                } else {
                    let sum_row = &self.sum.row(node_id, hand)[range.clone()];
                    normalize_into(sum_row, average_row);
                }
            }
        }

        self.num_strategies += 1;
        Ok(())
    }

    fn multistep(&mut self) -> Result<(), SolverError> {
        for iter in 0..self.params.num_iters {
            self.step(iter % 2)?;
        }
        Ok(())
    }

    fn update_value_network(&mut self) -> Result<(), SolverError> {
        self.br_solver
            .traverser
            .add_training_example(0, self.hand_values(0))?;
        self.br_solver
            .traverser
            .add_training_example(1, self.hand_values(1))
    }

    fn strategy(&self) -> &TreeStrategy {
        &self.average
    }

    fn sampling_strategy(&self) -> &TreeStrategy {
        &self.average
    }

    fn belief_propagation_strategy(&self) -> &TreeStrategy {
        &self.average
    }

    fn hand_values(&self, player: PlayerId) -> &[f64] {
        assert!(
            self.num_strategies >= 2,
            "hand values are undefined before both traversers have stepped"
        );
        &self.root_values_means[player]
    }

    fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }
}

/// Normalize `values` into `out`, falling back to uniform over the legal
/// interval when the mass underflows.
#[allow(clippy::cast_precision_loss)]
fn normalize_into(values: &[f64], out: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum >= REGRET_SMOOTHING_EPS {
        for (slot, &v) in out.iter_mut().zip(values) {
            *slot = v / sum;
        }
    } else {
        out.fill(1.0 / out.len() as f64);
    }
}

/// Fold `traverser`'s reach-weighted best response into `sum` and `last`
/// along every line the traverser's own actions can reach.
#[allow(clippy::too_many_arguments)]
fn accumulate_best_response(
    game: &Game,
    tree: &Tree,
    node_id: usize,
    traverser: PlayerId,
    br_strategy: &TreeStrategy,
    traverser_beliefs: &[f64],
    sum: &mut TreeStrategy,
    last: &mut TreeStrategy,
) {
    let node = &tree[node_id];
    if node.is_leaf() {
        return;
    }
    if Game::active_player(&node.state) == traverser {
        let mut child_beliefs = vec![0.0; game.num_hands()];
        for (child, action) in children_actions(game, node) {
            for (hand, belief_slot) in child_beliefs.iter_mut().enumerate() {
                let weighted = traverser_beliefs[hand] * br_strategy.row(node_id, hand)[action];
                sum.row_mut(node_id, hand)[action] += weighted;
                last.row_mut(node_id, hand)[action] = weighted;
                *belief_slot = weighted;
            }
            accumulate_best_response(
                game,
                tree,
                child,
                traverser,
                br_strategy,
                &child_beliefs,
                sum,
                last,
            );
        }
    } else {
        for child in node.children() {
            accumulate_best_response(
                game,
                tree,
                child,
                traverser,
                br_strategy,
                traverser_beliefs,
                sum,
                last,
            );
        }
    }
}
