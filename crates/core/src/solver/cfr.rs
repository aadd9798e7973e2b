//! Counterfactual-regret subgame solver.
//!
//! One step per traverser: propagate the last iterate's reaches, accumulate
//! counterfactual regrets bottom-up, regret-match the next iterate, and fold
//! its reach-weighted probabilities into the running average. Discount
//! schedules cover vanilla CFR, Linear CFR and Discounted CFR (Tammelin's
//! alpha/beta/gamma parameterisation).

use std::sync::Arc;

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Game, PartialPublicState, PlayerId};
use crate::net::ValueNet;
use crate::probability::REGRET_SMOOTHING_EPS;
use crate::solver::traverser::{TreeTraverser, compute_reach_probabilities};
use crate::solver::{
    SubgameSolver, SubgameSolvingParams, TreeStrategy, uniform_reach_weighted_strategy,
    uniform_strategy,
};
use crate::tree::{Tree, children_actions, unroll_tree};

pub struct CfrSolver {
    params: SubgameSolvingParams,
    traverser: TreeTraverser,
    /// Steps completed per traverser.
    num_steps: Pair<usize>,
    initial_beliefs: Pair<Vec<f64>>,
    average: TreeStrategy,
    sum: TreeStrategy,
    last: TreeStrategy,
    /// Signed cumulative counterfactual regrets.
    regrets: TreeStrategy,
    /// Reach probabilities of `last` for the stepping traverser.
    reach_buffer: Vec<Vec<f64>>,
    root_values_means: Pair<Vec<f64>>,
}

impl CfrSolver {
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
        debug_assert!(params.use_cfr);
        debug_assert!(
            !(params.linear_update && params.dcfr),
            "linear_update and dcfr are mutually exclusive"
        );
        let tree = Arc::new(unroll_tree(&game, root, params.max_depth));
        let traverser = TreeTraverser::new(game, tree.clone(), value_net)?;

        let average = uniform_strategy(&game, &tree);
        let last = average.clone();
        let sum = uniform_reach_weighted_strategy(&game, &tree, &beliefs);
        let regrets = TreeStrategy::zeros(tree.len(), game.num_hands(), game.num_actions());
        Ok(Self {
            params,
            traverser,
            num_steps: [0, 0],
            initial_beliefs: beliefs,
            average,
            sum,
            last,
            regrets,
            reach_buffer: vec![vec![0.0; game.num_hands()]; tree.len()],
            root_values_means: [Vec::new(), Vec::new()],
        })
    }

    /// Add the regrets of `last` into `regrets` and set `traverser_values`
    /// to the EVs of `last` for the traverser, bottom-up.
    fn update_regrets(&mut self, traverser: PlayerId) -> Result<(), SolverError> {
        self.traverser
            .precompute_reaches(&self.last, &self.initial_beliefs);
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
                for (child, action) in children_actions(&game, node) {
                    let child_values = &self.traverser.traverser_values[child];
                    for hand in 0..num_hands {
                        let action_value = child_values[hand];
                        self.regrets.row_mut(node_id, hand)[action] += action_value;
                        value[hand] += action_value * self.last.row(node_id, hand)[action];
                    }
                }
                let range = game.legal_action_range(&node.state);
                for (hand, &node_value) in value.iter().enumerate() {
                    for regret in &mut self.regrets.row_mut(node_id, hand)[range.clone()] {
                        *regret -= node_value;
                    }
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
        Ok(())
    }

    /// Positive-regret, negative-regret and strategy-sum discounts for this
    /// step, `1` everywhere for vanilla CFR.
    #[allow(clippy::cast_precision_loss)]
    fn discount_factors(&self, traverser: PlayerId) -> (f64, f64, f64) {
        // The uniform initialization counts as one accumulated strategy.
        let k = self.num_steps[traverser] as f64 + 1.0;
        if self.params.linear_update {
            let factor = k / (k + 1.0);
            (factor, factor, factor)
        } else if self.params.dcfr {
            let positive = if self.params.dcfr_alpha >= 5.0 {
                1.0
            } else {
                let ka = k.powf(self.params.dcfr_alpha);
                ka / (ka + 1.0)
            };
            let negative = if self.params.dcfr_beta <= -5.0 {
                0.0
            } else {
                let kb = k.powf(self.params.dcfr_beta);
                kb / (kb + 1.0)
            };
            let strategy = (k / (k + 1.0)).powf(self.params.dcfr_gamma);
            (positive, negative, strategy)
        } else {
            (1.0, 1.0, 1.0)
        }
    }
}

impl SubgameSolver for CfrSolver {
    #[allow(clippy::cast_precision_loss)]
    fn step(&mut self, traverser: PlayerId) -> Result<(), SolverError> {
        self.update_regrets(traverser)?;

        let alpha = if self.params.linear_update {
            2.0 / (self.num_steps[traverser] + 2) as f64
        } else {
            1.0 / (self.num_steps[traverser] + 1) as f64
        };
        let root_values = &self.traverser.traverser_values[0];
        let means = &mut self.root_values_means[traverser];
        means.resize(root_values.len(), 0.0);
        for (mean, &value) in means.iter_mut().zip(root_values) {
            *mean += (value - *mean) * alpha;
        }

        let (positive_discount, negative_discount, strategy_discount) =
            self.discount_factors(traverser);

        let game = self.traverser.game;
        let tree = self.traverser.tree.clone();

        // Regret-match the next iterate from clipped positive regrets.
        for (node_id, node) in tree.iter().enumerate() {
            if node.is_leaf() || Game::active_player(&node.state) != traverser {
                continue;
            }
            let range = game.legal_action_range(&node.state);
            for hand in 0..game.num_hands() {
                let regret_row = &self.regrets.row(node_id, hand)[range.clone()];
                let last_row = &mut self.last.row_mut(node_id, hand)[range.clone()];
                let mut mass = 0.0;
                for (slot, &regret) in last_row.iter_mut().zip(regret_row.iter()) {
                    *slot = regret.max(REGRET_SMOOTHING_EPS);
                    mass += *slot;
                }
                if mass >= REGRET_SMOOTHING_EPS {
                    for slot in last_row.iter_mut() {
                        *slot /= mass;
                    }
                } else {
                    // All-zero row at a dominated spot: uniform over legal.
                    last_row.fill(1.0 / last_row.len() as f64);
                }
            }
        }

        compute_reach_probabilities(
            &game,
            &tree,
            &self.last,
            &self.initial_beliefs[traverser],
            traverser,
            &mut self.reach_buffer,
        );

        // Discount regrets, fold the reach-weighted iterate into the sum and
        // renormalize the average.
        for (node_id, node) in tree.iter().enumerate() {
            if node.is_leaf() || Game::active_player(&node.state) != traverser {
                continue;
            }
            let range = game.legal_action_range(&node.state);
            for hand in 0..game.num_hands() {
                for regret in &mut self.regrets.row_mut(node_id, hand)[range.clone()] {
                    *regret *= if *regret > 0.0 {
                        positive_discount
                    } else {
                        negative_discount
                    };
                }
                let reach = self.reach_buffer[node_id][hand];
                let last_row = &self.last.row(node_id, hand)[range.clone()];
                let sum_row = &mut self.sum.row_mut(node_id, hand)[range.clone()];
                let mut mass = 0.0;
                for (slot, &p) in sum_row.iter_mut().zip(last_row.iter()) {
                    *slot = *slot * strategy_discount + reach * p;
                    mass += *slot;
                }
                let average_row = &mut self.average.row_mut(node_id, hand)[range.clone()];
                if mass >= REGRET_SMOOTHING_EPS {
                    for (slot, &s) in average_row.iter_mut().zip(sum_row.iter()) {
                        *slot = s / mass;
                    }
                } else {
                    average_row.fill(1.0 / average_row.len() as f64);
                }
            }
        }

        self.num_steps[traverser] += 1;
        Ok(())
    }

    fn multistep(&mut self) -> Result<(), SolverError> {
        for iter in 0..self.params.num_iters {
            self.step(iter % 2)?;
        }
        Ok(())
    }

    fn update_value_network(&mut self) -> Result<(), SolverError> {
        assert!(
            self.num_steps[0] > 0 && self.num_steps[1] > 0,
            "training examples are undefined before both traversers have stepped"
        );
        self.traverser.add_training_example(0, self.hand_values(0))?;
        self.traverser.add_training_example(1, self.hand_values(1))
    }

    fn strategy(&self) -> &TreeStrategy {
        &self.average
    }

    fn sampling_strategy(&self) -> &TreeStrategy {
        &self.last
    }

    fn belief_propagation_strategy(&self) -> &TreeStrategy {
        &self.last
    }

    fn hand_values(&self, player: PlayerId) -> &[f64] {
        assert!(
            self.num_steps[player] > 0,
            "hand values are undefined before the traverser has stepped"
        );
        &self.root_values_means[player]
    }

    fn tree(&self) -> &Arc<Tree> {
        &self.traverser.tree
    }
}
