//! Value-network query codec.
//!
//! A query packs `(active player, traverser, one-hot last action, board
//! slots, discard choices, street, both belief vectors)` into one flat `f32`
//! buffer. The belief sections are safely normalized on write, so the
//! round-trip is exact modulo that normalization.

use crate::Pair;
use crate::game::{Game, PartialPublicState, PlayerId};
use crate::probability::{REACH_SMOOTHING_EPS, write_normalized_probabilities};

/// Flat query length for this game.
#[must_use]
pub fn query_size(game: &Game) -> usize {
    // player + traverser + one-hot action + 6 board slots + 2 discards
    // + street + two belief vectors.
    1 + 1 + game.num_actions() + 6 + 2 + 1 + 2 * game.num_hands()
}

/// Serialize a query into `out`, returning the number of values written.
///
/// # Panics
///
/// Panics unless `out.len() == query_size(game)`.
#[allow(clippy::cast_precision_loss)]
pub fn write_query_to(
    game: &Game,
    traverser: PlayerId,
    state: &PartialPublicState,
    reaches0: &[f64],
    reaches1: &[f64],
    out: &mut [f32],
) -> usize {
    assert_eq!(out.len(), query_size(game), "query buffer size mismatch");

    let num_hands = game.num_hands();
    let mut index = 0;
    out[index] = state.player_id as f32;
    index += 1;
    out[index] = traverser as f32;
    index += 1;

    for action in 0..game.num_actions() {
        out[index] = f32::from(state.last_action == Some(action));
        index += 1;
    }

    for (slot, &card) in state.board_cards.iter().enumerate() {
        out[index] = if slot < state.num_board_cards && card >= 0 {
            f32::from(card)
        } else {
            -1.0
        };
        index += 1;
    }

    out[index] = f32::from(state.discard_choice[0]);
    index += 1;
    out[index] = f32::from(state.discard_choice[1]);
    index += 1;
    out[index] = f32::from(state.street);
    index += 1;

    write_normalized_probabilities(
        reaches0,
        REACH_SMOOTHING_EPS,
        &mut out[index..index + num_hands],
    );
    index += num_hands;
    write_normalized_probabilities(
        reaches1,
        REACH_SMOOTHING_EPS,
        &mut out[index..index + num_hands],
    );
    index += num_hands;
    index
}

/// Serialize a query into a fresh buffer.
#[must_use]
pub fn serialize_query(
    game: &Game,
    traverser: PlayerId,
    state: &PartialPublicState,
    reaches0: &[f64],
    reaches1: &[f64],
) -> Vec<f32> {
    let mut out = vec![0.0; query_size(game)];
    write_query_to(game, traverser, state, reaches0, reaches1, &mut out);
    out
}

/// Invert [`serialize_query`].
///
/// Returns `(traverser, state, beliefs)`. `num_board_cards` is
/// recovered as the highest populated board slot, so deals the solver never
/// saw concretely (all slots `-1`) deserialize with an empty board.
///
/// # Panics
///
/// Panics unless `query.len() == query_size(game)`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
pub fn deserialize_query(
    game: &Game,
    query: &[f32],
) -> (PlayerId, PartialPublicState, Pair<Vec<f64>>) {
    assert_eq!(query.len(), query_size(game), "query buffer size mismatch");

    let mut state = game.initial_state();
    let mut index = 0;
    state.player_id = query[index].round() as PlayerId;
    index += 1;
    let traverser = query[index].round() as PlayerId;
    index += 1;

    state.last_action = None;
    for action in 0..game.num_actions() {
        if query[index] > 0.5 {
            state.last_action = Some(action);
        }
        index += 1;
    }

    state.num_board_cards = 0;
    for slot in 0..6 {
        let card = query[index].round() as i32;
        index += 1;
        if (0..52).contains(&card) {
            state.board_cards[slot] = card as i8;
            state.num_board_cards = slot + 1;
        } else {
            state.board_cards[slot] = -1;
        }
    }

    state.discard_choice[0] = query[index].round() as i8;
    index += 1;
    state.discard_choice[1] = query[index].round() as i8;
    index += 1;
    state.street = query[index].round() as u16;
    index += 1;

    let num_hands = game.num_hands();
    let beliefs0 = query[index..index + num_hands]
        .iter()
        .map(|&v| f64::from(v))
        .collect();
    index += num_hands;
    let beliefs1 = query[index..index + num_hands]
        .iter()
        .map(|&v| f64::from(v))
        .collect();

    (traverser, state, [beliefs0, beliefs1])
}
