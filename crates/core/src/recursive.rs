//! Recursive self-play driver.
//!
//! A runner repeatedly solves a depth-bounded subgame at its current public
//! state, emits one training example per traverser at the root, then samples
//! a successor state from the solver's own play distribution (descending to
//! a subgame leaf, or taking a single root action) and updates both belief
//! vectors along the way. Terminal states reset the episode.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::Pair;
use crate::error::SolverError;
use crate::game::{Action, Game, PartialPublicState, PlayerId};
use crate::net::ValueNet;
use crate::probability::{REACH_SMOOTHING_EPS, initial_beliefs, normalize_probabilities_safe_in_place};
use crate::solver::{SubgameSolver, SubgameSolvingParams, TreeStrategy, build_solver};
use crate::tree::{Tree, children_actions, unroll_tree};

/// Parameters of the recursive self-play loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecursiveSolvingParams {
    /// Probability of exploring a uniformly random legal action while
    /// sampling the next state.
    pub random_action_prob: f64,
    /// Walk to a subgame leaf instead of taking a single root action.
    pub sample_leaf: bool,
    pub subgame_params: SubgameSolvingParams,
}

impl Default for RecursiveSolvingParams {
    fn default() -> Self {
        Self {
            random_action_prob: 1.0,
            sample_leaf: false,
            subgame_params: SubgameSolvingParams::default(),
        }
    }
}

/// One worker's self-play loop state.
pub struct SelfPlayRunner {
    game: Game,
    params: RecursiveSolvingParams,
    value_net: Arc<dyn ValueNet>,
    state: PartialPublicState,
    beliefs: Pair<Vec<f64>>,
    rng: StdRng,
}

impl SelfPlayRunner {
    #[must_use]
    pub fn new(params: RecursiveSolvingParams, value_net: Arc<dyn ValueNet>, seed: u64) -> Self {
        let game = Game::new();
        Self {
            game,
            params,
            value_net,
            state: game.initial_state(),
            beliefs: initial_beliefs(&game),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current public state, for inspection.
    #[must_use]
    pub fn state(&self) -> &PartialPublicState {
        &self.state
    }

    /// Solve one subgame, emit training examples, advance the state.
    ///
    /// # Errors
    ///
    /// Propagates configuration and evaluator failures; the runner should be
    /// discarded after an error.
    pub fn step(&mut self) -> Result<(), SolverError> {
        let mut solver = build_solver(
            &self.game,
            &self.state,
            self.beliefs.clone(),
            &self.params.subgame_params,
            Some(self.value_net.clone()),
        )?;
        solver.multistep()?;
        solver.update_value_network()?;

        if self.params.sample_leaf {
            self.sample_state_to_leaf(solver.as_ref());
        } else {
            self.sample_state_single(solver.as_ref());
        }

        if self.game.is_terminal(&self.state) {
            self.state = self.game.initial_state();
            self.beliefs = initial_beliefs(&self.game);
        }
        Ok(())
    }

    /// Apply one action sampled at the subgame root.
    fn sample_state_single(&mut self, solver: &dyn SubgameSolver) {
        let tree = solver.tree().clone();
        let player = Game::active_player(&self.state);
        let action = self.sample_tree_action(solver.sampling_strategy(), &tree, 0, player);
        self.update_beliefs(solver.belief_propagation_strategy(), 0, player, action);
        self.state = self.game.act(&self.state, action);
        self.normalize_beliefs();
    }

    /// Walk down the subgame to one of its leaves, updating beliefs along
    /// the sampled path. The new beliefs are the normalized reaches at the
    /// reached leaf.
    fn sample_state_to_leaf(&mut self, solver: &dyn SubgameSolver) {
        let tree = solver.tree().clone();
        let mut node_id = 0;
        let mut path: Vec<(usize, Action)> = Vec::new();
        while !tree[node_id].is_leaf() {
            let state = tree[node_id].state;
            let player = Game::active_player(&state);
            let action = self.sample_tree_action(solver.sampling_strategy(), &tree, node_id, player);
            path.push((node_id, action));
            let offset = action - self.game.legal_action_range(&state).start;
            node_id = tree[node_id].children_begin + offset;
        }
        self.state = tree[node_id].state;

        let propagation = solver.belief_propagation_strategy();
        for &(node, action) in &path {
            let player = Game::active_player(&tree[node].state);
            self.update_beliefs(propagation, node, player, action);
        }
        self.normalize_beliefs();
    }

    /// Sample an action at a tree node: uniform exploration with probability
    /// `random_action_prob`, otherwise belief-weighted play from the
    /// sampling strategy.
    fn sample_tree_action(
        &mut self,
        strategy: &TreeStrategy,
        tree: &Tree,
        node_id: usize,
        player: PlayerId,
    ) -> Action {
        let state = tree[node_id].state;
        let range = self.game.legal_action_range(&state);
        if self.rng.random::<f64>() < self.params.random_action_prob {
            return self.rng.random_range(range);
        }
        let hand = sample_weighted(&self.beliefs[player], &mut self.rng);
        let row = &strategy.row(node_id, hand)[range.clone()];
        range.start + sample_weighted(row, &mut self.rng)
    }

    /// Multiply the acting player's beliefs by its probability of the taken
    /// action.
    fn update_beliefs(
        &mut self,
        strategy: &TreeStrategy,
        node_id: usize,
        player: PlayerId,
        action: Action,
    ) {
        for (hand, belief) in self.beliefs[player].iter_mut().enumerate() {
            *belief *= strategy.row(node_id, hand)[action];
        }
    }

    fn normalize_beliefs(&mut self) {
        for side in &mut self.beliefs {
            normalize_probabilities_safe_in_place(side, REACH_SMOOTHING_EPS);
        }
    }
}

/// Sample an index proportionally to non-negative weights, cumulative-sum
/// style. Falls back to the last index on floating-point shortfall.
fn sample_weighted(weights: &[f64], rng: &mut StdRng) -> usize {
    let total: f64 = weights.iter().sum();
    let mut remaining = rng.random::<f64>() * total;
    for (index, &weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining <= 0.0 {
            return index;
        }
    }
    weights.len() - 1
}

/// Solve a subgame at every interior node of a bounded full tree, keeping
/// only each subgame's root strategy.
///
/// # Errors
///
/// Propagates solver construction and evaluator failures.
pub fn compute_strategy_recursive(
    game: &Game,
    params: &SubgameSolvingParams,
    value_net: &Arc<dyn ValueNet>,
    full_depth: usize,
) -> Result<TreeStrategy, SolverError> {
    let full_tree = unroll_tree(game, &game.initial_state(), full_depth);
    let mut strategy = TreeStrategy::zeros(full_tree.len(), game.num_hands(), game.num_actions());
    descend_root_only(
        game,
        params,
        value_net,
        &full_tree,
        0,
        initial_beliefs(game),
        &mut strategy,
    )?;
    Ok(strategy)
}

fn descend_root_only(
    game: &Game,
    params: &SubgameSolvingParams,
    value_net: &Arc<dyn ValueNet>,
    full_tree: &Tree,
    node_id: usize,
    beliefs: Pair<Vec<f64>>,
    out: &mut TreeStrategy,
) -> Result<(), SolverError> {
    let node = &full_tree[node_id];
    if node.is_leaf() || game.is_terminal(&node.state) {
        return Ok(());
    }
    let mut solver = build_solver(
        game,
        &node.state,
        beliefs.clone(),
        params,
        Some(value_net.clone()),
    )?;
    solver.multistep()?;
    out.node_mut(node_id).copy_from_slice(solver.strategy().node(0));

    let player = Game::active_player(&node.state);
    for (child, action) in children_actions(game, node) {
        let mut child_beliefs = beliefs.clone();
        for (hand, belief) in child_beliefs[player].iter_mut().enumerate() {
            *belief *= solver.strategy().row(0, hand)[action];
        }
        normalize_probabilities_safe_in_place(&mut child_beliefs[player], REACH_SMOOTHING_EPS);
        descend_root_only(game, params, value_net, full_tree, child, child_beliefs, out)?;
    }
    Ok(())
}

/// Solve subgames recursively, copying each subgame's strategy for all of
/// its interior nodes and re-solving only at subgame leaves.
///
/// # Errors
///
/// Propagates solver construction and evaluator failures.
pub fn compute_strategy_recursive_to_leaf(
    game: &Game,
    params: &SubgameSolvingParams,
    value_net: &Arc<dyn ValueNet>,
    full_depth: usize,
) -> Result<TreeStrategy, SolverError> {
    let full_tree = unroll_tree(game, &game.initial_state(), full_depth);
    let mut strategy = TreeStrategy::zeros(full_tree.len(), game.num_hands(), game.num_actions());
    descend_to_leaf(
        game,
        params,
        value_net,
        &full_tree,
        0,
        initial_beliefs(game),
        &mut strategy,
        &mut |solver, _| solver.multistep(),
        false,
        false,
    )?;
    Ok(strategy)
}

/// Like [`compute_strategy_recursive_to_leaf`], but mimicking training:
/// every subgame stops at an iteration sampled with linear weighting and
/// contributes its sampling strategy instead of the average.
///
/// # Errors
///
/// Propagates solver construction and evaluator failures.
#[allow(clippy::cast_precision_loss)]
pub fn compute_sampled_strategy_recursive_to_leaf(
    game: &Game,
    params: &SubgameSolvingParams,
    value_net: &Arc<dyn ValueNet>,
    seed: u64,
    root_only: bool,
    full_depth: usize,
) -> Result<TreeStrategy, SolverError> {
    let full_tree = unroll_tree(game, &game.initial_state(), full_depth);
    let mut strategy = TreeStrategy::zeros(full_tree.len(), game.num_hands(), game.num_actions());
    let mut rng = StdRng::seed_from_u64(seed);
    descend_to_leaf(
        game,
        params,
        value_net,
        &full_tree,
        0,
        initial_beliefs(game),
        &mut strategy,
        &mut move |solver, num_iters| {
            if num_iters == 0 {
                return Ok(());
            }
            // Linear weighting: stop after t iterations with P(t) ~ t.
            let weights: Vec<f64> = (1..=num_iters).map(|t| t as f64).collect();
            let stop_after = 1 + sample_weighted(&weights, &mut rng);
            for iter in 0..stop_after {
                solver.step(iter % 2)?;
            }
            Ok(())
        },
        root_only,
        true,
    )?;
    Ok(strategy)
}

/// Shared recursion for the `_to_leaf` variants. `run` advances a freshly
/// built solver; the chosen strategies then fill the mapped full-tree nodes
/// and seed the leaf recursions. With `sampled` the solver's sampling
/// strategy is copied and its belief-propagation strategy drives the leaf
/// beliefs; otherwise both roles use the averaged strategy.
#[allow(clippy::too_many_arguments)]
fn descend_to_leaf(
    game: &Game,
    params: &SubgameSolvingParams,
    value_net: &Arc<dyn ValueNet>,
    full_tree: &Tree,
    full_root: usize,
    beliefs: Pair<Vec<f64>>,
    out: &mut TreeStrategy,
    run: &mut dyn FnMut(&mut dyn SubgameSolver, usize) -> Result<(), SolverError>,
    root_only: bool,
    sampled: bool,
) -> Result<(), SolverError> {
    let root_node = &full_tree[full_root];
    if root_node.is_leaf() || game.is_terminal(&root_node.state) {
        return Ok(());
    }
    let mut solver = build_solver(
        game,
        &root_node.state,
        beliefs.clone(),
        params,
        Some(value_net.clone()),
    )?;
    run(solver.as_mut(), params.num_iters)?;

    let subgame_tree = solver.tree().clone();
    let (copied, propagated) = if sampled {
        (
            solver.sampling_strategy(),
            solver.belief_propagation_strategy(),
        )
    } else {
        (solver.strategy(), solver.strategy())
    };

    // Both trees unroll the same game breadth-first, so children pair up
    // positionally. The subgame may reach deeper than the bounded full
    // tree; mapping stops where the full tree ends.
    let mut map = vec![usize::MAX; subgame_tree.len()];
    map[0] = full_root;
    for (sub_id, sub_node) in subgame_tree.iter().enumerate() {
        let full_id = map[sub_id];
        if full_id == usize::MAX || sub_node.is_leaf() {
            continue;
        }
        if !(root_only && sub_id > 0) {
            out.node_mut(full_id).copy_from_slice(copied.node(sub_id));
        }
        let full_node = &full_tree[full_id];
        if full_node.is_leaf() {
            continue;
        }
        debug_assert_eq!(sub_node.num_children(), full_node.num_children());
        for (offset, sub_child) in sub_node.children().enumerate() {
            map[sub_child] = full_node.children_begin + offset;
        }
    }

    // Beliefs at subgame leaves are the normalized reaches under the
    // propagation strategy.
    let mut reaches = [
        vec![vec![0.0; game.num_hands()]; subgame_tree.len()],
        vec![vec![0.0; game.num_hands()]; subgame_tree.len()],
    ];
    for player in 0..2 {
        crate::solver::traverser::compute_reach_probabilities(
            game,
            &subgame_tree,
            propagated,
            &beliefs[player],
            player,
            &mut reaches[player],
        );
    }

    for (sub_id, sub_node) in subgame_tree.iter().enumerate() {
        let descend_here = if root_only {
            sub_node.parent == Some(0)
        } else {
            sub_node.is_leaf()
        };
        if !descend_here || game.is_terminal(&sub_node.state) {
            continue;
        }
        let full_id = map[sub_id];
        if full_id == usize::MAX || full_tree[full_id].is_leaf() {
            continue;
        }
        let mut leaf_beliefs = [reaches[0][sub_id].clone(), reaches[1][sub_id].clone()];
        for side in &mut leaf_beliefs {
            normalize_probabilities_safe_in_place(side, REACH_SMOOTHING_EPS);
        }
        descend_to_leaf(
            game,
            params,
            value_net,
            full_tree,
            full_id,
            leaf_beliefs,
            out,
            run,
            root_only,
            sampled,
        )?;
    }
    Ok(())
}
