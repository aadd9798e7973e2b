//! Recursive self-play driver with the zero evaluator.

use std::sync::Arc;

use test_macros::timed_test;
use toss_solver_core::game::Game;
use toss_solver_core::net::{ValueNet, ZeroNet};
use toss_solver_core::recursive::{
    RecursiveSolvingParams, SelfPlayRunner, compute_sampled_strategy_recursive_to_leaf,
    compute_strategy_recursive, compute_strategy_recursive_to_leaf,
};
use toss_solver_core::solver::SubgameSolvingParams;
use toss_solver_core::tree::unroll_tree;

#[timed_test(300)]
fn zero_net_driver_adds_two_examples_per_step() {
    let game = Game::new();
    let params = RecursiveSolvingParams {
        subgame_params: SubgameSolvingParams {
            num_iters: 100,
            max_depth: 1,
            linear_update: true,
            ..SubgameSolvingParams::default()
        },
        ..RecursiveSolvingParams::default()
    };
    let net = Arc::new(ZeroNet::new(game.num_hands()));
    let shared_net: Arc<dyn ValueNet> = net.clone();
    let mut runner = SelfPlayRunner::new(params, shared_net, 0);

    for _ in 0..10 {
        runner.step().unwrap();
    }
    assert_eq!(net.num_examples_added(), 20);
}

#[timed_test(300)]
fn zero_net_driver_samples_to_leaf() {
    let game = Game::new();
    let params = RecursiveSolvingParams {
        sample_leaf: true,
        random_action_prob: 0.5,
        subgame_params: SubgameSolvingParams {
            num_iters: 8,
            max_depth: 2,
            linear_update: true,
            use_cfr: true,
            ..SubgameSolvingParams::default()
        },
    };
    let net = Arc::new(ZeroNet::new(game.num_hands()));
    let shared_net: Arc<dyn ValueNet> = net.clone();
    let mut runner = SelfPlayRunner::new(params, shared_net, 7);

    for _ in 0..3 {
        runner.step().unwrap();
    }
    assert_eq!(net.num_examples_added(), 6);
    // The walk either landed on a later public state or reset to the root.
    let state = runner.state();
    assert!(!game.is_terminal(state));
}

#[timed_test(300)]
fn recursive_strategy_covers_the_bounded_tree() {
    let game = Game::new();
    let params = SubgameSolvingParams {
        num_iters: 4,
        max_depth: 1,
        linear_update: true,
        ..SubgameSolvingParams::default()
    };
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    let strategy = compute_strategy_recursive(&game, &params, &net, 2).unwrap();
    let full_tree = unroll_tree(&game, &game.initial_state(), 2);
    assert_eq!(strategy.num_nodes(), full_tree.len());

    // Every solved interior node carries a distribution over its legal
    // interval.
    for (node_id, node) in full_tree.iter().enumerate() {
        if node.is_leaf() || game.is_terminal(&node.state) {
            continue;
        }
        let range = game.legal_action_range(&node.state);
        for hand in (0..game.num_hands()).step_by(1009) {
            let sum: f64 = strategy.row(node_id, hand)[range.clone()].iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-6,
                "node {node_id} hand {hand}: {sum}"
            );
        }
    }
}

#[timed_test(600)]
fn recursive_to_leaf_fills_interior_subgame_nodes() {
    let game = Game::new();
    let params = SubgameSolvingParams {
        num_iters: 2,
        max_depth: 1,
        linear_update: true,
        ..SubgameSolvingParams::default()
    };
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    // Subgames of depth 1 inside a depth-2 tree force one re-solve per
    // non-terminal depth-1 node.
    let strategy = compute_strategy_recursive_to_leaf(&game, &params, &net, 2).unwrap();
    let full_tree = unroll_tree(&game, &game.initial_state(), 2);
    assert_eq!(strategy.num_nodes(), full_tree.len());

    for (node_id, node) in full_tree.iter().enumerate() {
        if node.is_leaf() || game.is_terminal(&node.state) {
            continue;
        }
        let range = game.legal_action_range(&node.state);
        let sum: f64 = strategy.row(node_id, 0)[range.clone()].iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "node {node_id}: {sum}");
    }
}

#[timed_test(300)]
fn sampled_recursive_strategy_has_full_shape() {
    let game = Game::new();
    let params = SubgameSolvingParams {
        num_iters: 4,
        max_depth: 2,
        linear_update: true,
        ..SubgameSolvingParams::default()
    };
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    let strategy =
        compute_sampled_strategy_recursive_to_leaf(&game, &params, &net, 3, false, 2).unwrap();
    let full_tree = unroll_tree(&game, &game.initial_state(), 2);
    assert_eq!(strategy.num_nodes(), full_tree.len());

    let range = game.legal_action_range(&game.initial_state());
    let sum: f64 = strategy.row(0, 42)[range].iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
}
