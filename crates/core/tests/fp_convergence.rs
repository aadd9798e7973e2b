//! Fictitious play on small subgames with the zero evaluator.

use std::sync::Arc;

use test_macros::timed_test;
use toss_solver_core::game::Game;
use toss_solver_core::net::{ValueNet, ZeroNet};
use toss_solver_core::probability::initial_beliefs;
use toss_solver_core::solver::{
    SubgameSolvingParams, build_solver, compute_exploitability, compute_exploitability2,
};

#[timed_test(600)]
fn fp_depth_two_subgame_stays_below_payoff_bound() {
    let game = Game::new();
    let params = SubgameSolvingParams {
        num_iters: 100,
        max_depth: 2,
        linear_update: true,
        ..SubgameSolvingParams::default()
    };
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    let mut solver = build_solver(
        &game,
        &game.initial_state(),
        initial_beliefs(&game),
        &params,
        Some(net.clone()),
    )
    .unwrap();
    solver.multistep().unwrap();

    // Average strategy validity: legal interval sums to one, the rest is
    // exactly zero.
    let strategy = solver.strategy();
    let tree = solver.tree();
    for (node_id, node) in tree.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        let range = game.legal_action_range(&node.state);
        for hand in 0..game.num_hands() {
            let row = strategy.row(node_id, hand);
            let sum: f64 = row[range.clone()].iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-6,
                "node {node_id} hand {hand} sums to {sum}"
            );
            for (action, &p) in row.iter().enumerate() {
                if !range.contains(&action) {
                    assert_eq!(p, 0.0, "illegal action {action} has mass at {node_id}");
                }
            }
        }
    }

    // Exploitability of both players is non-negative and strictly below the
    // unit payoff bound.
    let per_player = compute_exploitability2(&game, strategy, Some(net.clone())).unwrap();
    assert!(per_player[0] >= 0.0 && per_player[1] >= 0.0);

    let exploitability = compute_exploitability(&game, strategy, Some(net)).unwrap();
    assert!((0.0..1.0).contains(&exploitability), "got {exploitability}");

    // Root hand values are defined after both traversers stepped.
    assert_eq!(solver.hand_values(0).len(), game.num_hands());
    assert_eq!(solver.hand_values(1).len(), game.num_hands());
}

#[timed_test(300)]
fn optimistic_fp_produces_valid_average() {
    let game = Game::new();
    let params = SubgameSolvingParams {
        num_iters: 16,
        max_depth: 1,
        linear_update: true,
        optimistic: true,
        ..SubgameSolvingParams::default()
    };
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    let mut solver = build_solver(
        &game,
        &game.initial_state(),
        initial_beliefs(&game),
        &params,
        Some(net),
    )
    .unwrap();
    solver.multistep().unwrap();

    let range = game.legal_action_range(&game.initial_state());
    let strategy = solver.strategy();
    for hand in (0..game.num_hands()).step_by(499) {
        let sum: f64 = strategy.row(0, hand)[range.clone()].iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
