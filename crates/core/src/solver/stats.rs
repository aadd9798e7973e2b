//! Exploitability, expected value and regret statistics.
//!
//! All of these evaluate a finished strategy over a bounded breadth-first
//! tree from the initial state. The tree is recovered from the strategy's
//! node count: breadth-first unrolls of increasing depth form a prefix
//! chain, so the node count identifies the depth unambiguously.

use std::io;
use std::sync::Arc;

use crate::Pair;
use crate::error::SolverError;
use crate::game::Game;
use crate::net::ValueNet;
use crate::probability::initial_beliefs;
use crate::solver::br::BestResponseSolver;
use crate::solver::traverser::TreeTraverser;
use crate::solver::TreeStrategy;
use crate::tree::{Tree, children_actions, unroll_tree};

/// Deepest tree [`tree_for_strategy`] will try to reconstruct.
const MAX_INFERRED_DEPTH: usize = 64;

/// Recover the breadth-first tree a strategy was computed on from its node
/// count.
fn tree_for_strategy(game: &Game, num_nodes: usize) -> Result<Tree, SolverError> {
    let root = game.initial_state();
    for depth in 0..=MAX_INFERRED_DEPTH {
        let tree = unroll_tree(game, &root, depth);
        if tree.len() == num_nodes {
            return Ok(tree);
        }
        if tree.len() > num_nodes {
            break;
        }
    }
    Err(SolverError::Config(format!(
        "strategy with {num_nodes} nodes does not match any breadth-first unroll from the root"
    )))
}

/// Per-player exploitability of `strategy`: the mean best-response value
/// over hands, for each traverser, from uniform beliefs.
///
/// # Errors
///
/// Configuration errors when the strategy does not cover a root-based tree,
/// or when the tree has truncated leaves and no evaluator was supplied.
#[allow(clippy::cast_precision_loss)]
pub fn compute_exploitability2(
    game: &Game,
    strategy: &TreeStrategy,
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<Pair<f64>, SolverError> {
    let tree = Arc::new(tree_for_strategy(game, strategy.num_nodes())?);
    let beliefs = initial_beliefs(game);
    let mut solver = BestResponseSolver::new(*game, tree, value_net)?;

    let values0 = solver.compute_br(0, strategy, &beliefs)?;
    let values1 = solver.compute_br(1, strategy, &beliefs)?;
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    Ok([mean(&values0), mean(&values1)])
}

/// Mean of the two per-player exploitabilities. Zero iff `strategy` is a
/// Nash equilibrium of the (bounded) game.
///
/// # Errors
///
/// Same contract as [`compute_exploitability2`].
pub fn compute_exploitability(
    game: &Game,
    strategy: &TreeStrategy,
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<f64, SolverError> {
    let values = compute_exploitability2(game, strategy, value_net)?;
    Ok((values[0] + values[1]) / 2.0)
}

/// Expected value per hand for player 0 when player 0 plays `strategy0` and
/// player 1 plays `strategy1`, from uniform beliefs.
///
/// # Errors
///
/// Configuration errors as for [`compute_exploitability2`].
pub fn compute_ev(
    game: &Game,
    strategy0: &TreeStrategy,
    strategy1: &TreeStrategy,
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<Vec<f64>, SolverError> {
    assert_eq!(strategy0.num_nodes(), strategy1.num_nodes());
    let tree = Arc::new(tree_for_strategy(game, strategy0.num_nodes())?);
    let beliefs = initial_beliefs(game);

    let mut traverser = TreeTraverser::new(*game, tree.clone(), value_net)?;
    traverser.precompute_reaches_for(strategy0, &beliefs[0], 0);
    traverser.precompute_reaches_for(strategy1, &beliefs[1], 1);
    traverser.precompute_all_leaf_values(0)?;

    let num_hands = game.num_hands();
    for node_id in (0..tree.len()).rev() {
        let node = &tree[node_id];
        if node.is_leaf() {
            continue;
        }
        let mut value = vec![0.0; num_hands];
        if Game::active_player(&node.state) == 0 {
            for (child, action) in children_actions(game, node) {
                let child_values = &traverser.traverser_values[child];
                for (hand, slot) in value.iter_mut().enumerate() {
                    *slot += strategy0.row(node_id, hand)[action] * child_values[hand];
                }
            }
        } else {
            for child in node.children() {
                let child_values = &traverser.traverser_values[child];
                for (slot, &v) in value.iter_mut().zip(child_values) {
                    *slot += v;
                }
            }
        }
        traverser.traverser_values[node_id] = value;
    }
    Ok(traverser.traverser_values[0].clone())
}

/// Expected value for both players under the profile `(strategy0,
/// strategy1)`, averaged over hands.
///
/// # Errors
///
/// Same contract as [`compute_ev`].
#[allow(clippy::cast_precision_loss)]
pub fn compute_ev2(
    game: &Game,
    strategy0: &TreeStrategy,
    strategy1: &TreeStrategy,
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<Pair<f64>, SolverError> {
    let mean = |values: Vec<f64>| values.iter().sum::<f64>() / values.len() as f64;
    let ev0 = mean(compute_ev(game, strategy0, strategy1, value_net.clone())?);
    let ev1 = -mean(compute_ev(game, strategy1, strategy0, value_net)?);
    Ok([ev0, ev1])
}

/// Immediate counterfactual regret per node and hand, averaged over a set of
/// strategies: the best single-action deviation value against the strategy
/// mixture.
///
/// # Errors
///
/// Configuration errors as for [`compute_exploitability2`].
///
/// # Panics
///
/// Panics when `strategies` is empty.
#[allow(clippy::cast_precision_loss)]
pub fn compute_immediate_regrets(
    game: &Game,
    strategies: &[TreeStrategy],
    value_net: Option<Arc<dyn ValueNet>>,
) -> Result<Vec<Vec<f64>>, SolverError> {
    assert!(!strategies.is_empty(), "need at least one strategy");
    let tree = Arc::new(tree_for_strategy(game, strategies[0].num_nodes())?);
    let uniform = initial_beliefs(game);
    let num_hands = game.num_hands();

    let mut traverser = TreeTraverser::new(*game, tree.clone(), value_net)?;
    let mut regrets = TreeStrategy::zeros(tree.len(), num_hands, game.num_actions());

    for strategy in strategies {
        traverser.precompute_reaches(strategy, &uniform);
        for player in 0..2 {
            traverser.precompute_all_leaf_values(player)?;
            for node_id in (0..tree.len()).rev() {
                let node = &tree[node_id];
                if node.is_leaf() {
                    continue;
                }
                let mut value = vec![0.0; num_hands];
                if Game::active_player(&node.state) == player {
                    for (child, action) in children_actions(game, node) {
                        let child_values = &traverser.traverser_values[child];
                        for hand in 0..num_hands {
                            regrets.row_mut(node_id, hand)[action] += child_values[hand];
                            value[hand] += child_values[hand] * strategy.row(node_id, hand)[action];
                        }
                    }
                    let range = game.legal_action_range(&node.state);
                    for (hand, &node_value) in value.iter().enumerate() {
                        for regret in &mut regrets.row_mut(node_id, hand)[range.clone()] {
                            *regret -= node_value;
                        }
                    }
                } else {
                    for child in node.children() {
                        let child_values = &traverser.traverser_values[child];
                        for (slot, &v) in value.iter_mut().zip(child_values) {
                            *slot += v;
                        }
                    }
                }
                traverser.traverser_values[node_id] = value;
            }
        }
    }

    let scale = strategies.len() as f64;
    let mut immediate = vec![vec![0.0; num_hands]; tree.len()];
    for (node_id, node) in tree.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        for (hand, slot) in immediate[node_id].iter_mut().enumerate() {
            let best = regrets
                .row(node_id, hand)
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            *slot = best / scale;
        }
    }
    Ok(immediate)
}

/// Dump a strategy's per-hand action probabilities, one node per line.
///
/// # Errors
///
/// Propagates writer failures.
pub fn write_strategy(
    game: &Game,
    tree: &Tree,
    strategy: &TreeStrategy,
    writer: &mut impl io::Write,
) -> io::Result<()> {
    assert_eq!(tree.len(), strategy.num_nodes());
    writeln!(writer, "strategies per node")?;
    for (node_id, node) in tree.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        write!(writer, "node={node_id}\t{}", game.state_string(&node.state))?;
        for hand in 0..strategy.num_hands() {
            write!(writer, "| hand={hand} ")?;
            for probability in strategy.row(node_id, hand) {
                write!(writer, "{probability:.2} ")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}
