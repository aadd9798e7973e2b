//! Query codec round-trips over solver-reachable and synthetic states.

use test_macros::timed_test;
use toss_solver_core::game::{ACTION_CALL, Game, street};
use toss_solver_core::probability::normalize_probabilities_safe;
use toss_solver_core::query::{deserialize_query, query_size, serialize_query};
use toss_solver_core::tree::unroll_tree;

#[timed_test(120)]
fn roundtrip_over_subgame_states() {
    let game = Game::new();
    let tree = unroll_tree(&game, &game.initial_state(), 2);

    #[allow(clippy::cast_precision_loss)]
    let raw0: Vec<f64> = (0..game.num_hands()).map(|i| i as f64).collect();
    #[allow(clippy::cast_precision_loss)]
    let raw1: Vec<f64> = (0..game.num_hands()).map(|i| i as f64 + 0.5).collect();
    let beliefs0 = normalize_probabilities_safe(&raw0, 1e-80);
    let beliefs1 = normalize_probabilities_safe(&raw1, 1e-80);

    for node in &tree {
        if game.is_terminal(&node.state) {
            continue;
        }
        for traverser in 0..2 {
            let query = serialize_query(&game, traverser, &node.state, &beliefs0, &beliefs1);
            assert_eq!(query.len(), query_size(&game));

            let (got_traverser, got_state, got_beliefs) = deserialize_query(&game, &query);
            assert_eq!(got_traverser, traverser);
            assert_eq!(got_state.player_id, node.state.player_id);
            assert_eq!(got_state.last_action, node.state.last_action);
            assert_eq!(got_state.street, node.state.street);
            assert_eq!(got_state.num_board_cards, node.state.num_board_cards);
            assert_eq!(got_state.board_cards, node.state.board_cards);
            assert_eq!(got_state.discard_choice, node.state.discard_choice);

            for hand in 0..game.num_hands() {
                assert!((got_beliefs[0][hand] - beliefs0[hand]).abs() < 1e-6);
                assert!((got_beliefs[1][hand] - beliefs1[hand]).abs() < 1e-6);
            }
        }
    }
}

#[timed_test(60)]
fn roundtrip_with_board_and_discards() {
    let game = Game::new();
    let mut state = game.initial_state();
    state.street = street::TURN_BET;
    state.player_id = 1;
    state.last_action = Some(ACTION_CALL);
    state.num_board_cards = 4;
    state.board_cards = [12, 25, 38, 51, -1, -1];
    state.discard_choice = [2, 0];

    let beliefs0 = vec![1.0 / Game::NUM_HANDS as f64; Game::NUM_HANDS];
    let beliefs1 = beliefs0.clone();
    let query = serialize_query(&game, 1, &state, &beliefs0, &beliefs1);
    let (traverser, got, _) = deserialize_query(&game, &query);

    assert_eq!(traverser, 1);
    assert_eq!(got.street, street::TURN_BET);
    assert_eq!(got.player_id, 1);
    assert_eq!(got.last_action, Some(ACTION_CALL));
    assert_eq!(got.num_board_cards, 4);
    assert_eq!(got.board_cards, state.board_cards);
    assert_eq!(got.discard_choice, [2, 0]);
}
