//! Public-state model for the Toss-or-Hold'em variant.
//!
//! The solver operates on public observation equivalence classes only:
//! street, acting player, last action, board-card slots and discard choices.
//! Pot and stack accounting belong to the engine and are deliberately absent;
//! terminal payoffs are unit-magnitude win/loss.

use std::ops::Range;

/// Action index, always in `[0, NUM_ACTIONS)`.
pub type Action = usize;

/// Player index, 0 or 1.
pub type PlayerId = usize;

/// Number of discretised bet sizes on the betting ladder.
pub const NUM_BET_SIZES: usize = 10;

/// Bet sizes in big blinds; the last entry is the all-in stack.
pub const BET_SIZES: [u32; NUM_BET_SIZES] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 400];

/// Action encoding: fold, call/check, bets, then discards.
pub const ACTION_FOLD: Action = 0;
pub const ACTION_CALL: Action = 1;
pub const ACTION_BET_BASE: Action = 2;
pub const ACTION_DISCARD_BASE: Action = ACTION_BET_BASE + NUM_BET_SIZES;

/// Total number of distinct actions: fold + call/check + bets + 3 discards.
pub const NUM_ACTIONS: usize = ACTION_DISCARD_BASE + 3;

/// Street markers stored in [`PartialPublicState::street`].
pub mod street {
    pub const PREFLOP: u16 = 0;
    /// Player 1 chooses its discard.
    pub const DISCARD_P1: u16 = 2;
    /// Player 0 chooses its discard.
    pub const DISCARD_P0: u16 = 3;
    pub const FLOP_BET: u16 = 4;
    pub const TURN_BET: u16 = 5;
    /// River completion; terminal for the solver.
    pub const RIVER: u16 = 6;
    /// Terminal by fold or by showdown.
    pub const TERMINAL: u16 = 999;
}

/// An [`Action`] unpacked into its semantic form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Fold,
    CallCheck,
    /// Bet or raise at the given discretised size.
    Bet(u32),
    /// Discard the hole card at this index (0, 1 or 2).
    Discard(usize),
}

/// Public information common to both players.
///
/// `board_cards` slots beyond `num_board_cards` are `-1`; slots within the
/// count may also be `-1` when the concrete deal is unknown to the solver.
/// `discard_choice` is `-1` until the player has discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialPublicState {
    pub street: u16,
    /// Player to act next; meaningless once terminal.
    pub player_id: PlayerId,
    /// Last recorded action, `None` at the root.
    pub last_action: Option<Action>,
    pub num_board_cards: usize,
    pub board_cards: [i8; 6],
    pub discard_choice: [i8; 2],
}

/// The Toss-or-Hold'em public game: three hole cards, one discard each,
/// shared board, four betting rounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Game;

impl Game {
    /// C(52, 3) distinct pre-discard holdings.
    pub const NUM_HANDS: usize = 52 * 51 * 50 / 6;

    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub const fn num_actions(&self) -> usize {
        NUM_ACTIONS
    }

    #[must_use]
    pub const fn num_hands(&self) -> usize {
        Self::NUM_HANDS
    }

    /// Preflop, player 0 to act, nothing on the board, no discards.
    #[must_use]
    pub fn initial_state(&self) -> PartialPublicState {
        PartialPublicState {
            street: street::PREFLOP,
            player_id: 0,
            last_action: None,
            num_board_cards: 0,
            board_cards: [-1; 6],
            discard_choice: [-1; 2],
        }
    }

    /// Decode an action index.
    ///
    /// # Panics
    ///
    /// Panics if `action >= NUM_ACTIONS`.
    #[must_use]
    pub fn unpack_action(&self, action: Action) -> ActionKind {
        match action {
            ACTION_FOLD => ActionKind::Fold,
            ACTION_CALL => ActionKind::CallCheck,
            a if (ACTION_BET_BASE..ACTION_DISCARD_BASE).contains(&a) => {
                ActionKind::Bet(BET_SIZES[a - ACTION_BET_BASE])
            }
            a if (ACTION_DISCARD_BASE..NUM_ACTIONS).contains(&a) => {
                ActionKind::Discard(a - ACTION_DISCARD_BASE)
            }
            _ => panic!("action {action} out of range"),
        }
    }

    #[must_use]
    pub fn is_terminal(&self, state: &PartialPublicState) -> bool {
        state.street == street::TERMINAL || state.street == street::RIVER
    }

    #[must_use]
    pub fn active_player(state: &PartialPublicState) -> PlayerId {
        state.player_id
    }

    /// Legal actions at `state` as a single contiguous half-open interval.
    ///
    /// During a discard street the discarding player sees the discard block;
    /// the other player has a single pass action (encoded as call/check).
    /// Every betting street exposes the full fold/call/bet block.
    #[must_use]
    pub fn legal_action_range(&self, state: &PartialPublicState) -> Range<Action> {
        if state.street == street::DISCARD_P1 || state.street == street::DISCARD_P0 {
            let discarder = usize::from(state.street == street::DISCARD_P1);
            if state.player_id == discarder {
                ACTION_DISCARD_BASE..NUM_ACTIONS
            } else {
                ACTION_CALL..ACTION_CALL + 1
            }
        } else {
            0..ACTION_DISCARD_BASE
        }
    }

    /// Apply `action` to `state`.
    ///
    /// # Panics
    ///
    /// Panics if the action is outside [`Self::legal_action_range`].
    #[must_use]
    pub fn act(&self, state: &PartialPublicState, action: Action) -> PartialPublicState {
        let range = self.legal_action_range(state);
        assert!(
            range.contains(&action),
            "action {action} outside legal range {range:?} at {}",
            self.state_string(state)
        );

        let mut next = *state;
        match self.unpack_action(action) {
            ActionKind::Discard(index) => {
                debug_assert!(
                    state.street == street::DISCARD_P1 || state.street == street::DISCARD_P0
                );
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                {
                    next.discard_choice[state.player_id] = index as i8;
                }
                next.player_id = 1 - state.player_id;
                // Both discards are in once the turn wraps past the second discarder.
                let both_done = (state.street == street::DISCARD_P1 && next.player_id == 0)
                    || (state.street == street::DISCARD_P0 && next.player_id == 1);
                if both_done {
                    return self.proceed_street(next);
                }
                next
            }
            ActionKind::Fold => {
                next.street = street::TERMINAL;
                next
            }
            ActionKind::CallCheck => {
                next.last_action = Some(action);
                next.player_id = 1 - state.player_id;
                if next.player_id == 0 && state.street != street::PREFLOP {
                    return self.proceed_street(next);
                }
                next
            }
            ActionKind::Bet(_) => {
                next.last_action = Some(action);
                next.player_id = 1 - state.player_id;
                next
            }
        }
    }

    /// Advance to the next street. Player 1 acts first after every
    /// transition; board-card counts follow the engine's reveal schedule.
    fn proceed_street(&self, mut state: PartialPublicState) -> PartialPublicState {
        match state.street {
            street::RIVER => {
                state.street = street::TERMINAL;
            }
            street::PREFLOP => {
                state.street = street::DISCARD_P1;
                state.player_id = 1;
                state.num_board_cards = 2;
            }
            street::DISCARD_P1 => {
                state.street = street::DISCARD_P0;
                state.player_id = 0;
                state.num_board_cards = 3;
            }
            street::DISCARD_P0 => {
                state.street = street::FLOP_BET;
                state.player_id = 1;
                state.num_board_cards = 4;
            }
            _ => {
                state.street += 1;
                state.player_id = 1;
                state.num_board_cards = usize::from(state.street) - 1;
            }
        }
        state
    }

    #[must_use]
    pub fn action_string(&self, action: Action) -> String {
        match self.unpack_action(action) {
            ActionKind::Fold => "fold".to_string(),
            ActionKind::CallCheck => "call/check".to_string(),
            ActionKind::Bet(size) => format!("bet/raise({size})"),
            ActionKind::Discard(index) => format!("discard(card={index})"),
        }
    }

    #[must_use]
    pub fn state_string(&self, state: &PartialPublicState) -> String {
        let last = state
            .last_action
            .map_or_else(|| "start".to_string(), |a| self.action_string(a));
        format!(
            "(street={},player={},board={},last={})",
            state.street, state.player_id, state.num_board_cards, last
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn initial_state_is_preflop_player_zero() {
        let game = Game::new();
        let state = game.initial_state();

        assert_eq!(state.street, street::PREFLOP);
        assert_eq!(state.player_id, 0);
        assert_eq!(state.last_action, None);
        assert_eq!(state.num_board_cards, 0);
        assert!(state.board_cards.iter().all(|&c| c == -1));
        assert_eq!(state.discard_choice, [-1, -1]);
        assert!(!game.is_terminal(&state));
    }

    #[timed_test]
    fn action_encoding_roundtrip() {
        let game = Game::new();
        assert_eq!(game.unpack_action(ACTION_FOLD), ActionKind::Fold);
        assert_eq!(game.unpack_action(ACTION_CALL), ActionKind::CallCheck);
        assert_eq!(game.unpack_action(ACTION_BET_BASE), ActionKind::Bet(1));
        assert_eq!(
            game.unpack_action(ACTION_DISCARD_BASE - 1),
            ActionKind::Bet(400)
        );
        assert_eq!(
            game.unpack_action(ACTION_DISCARD_BASE),
            ActionKind::Discard(0)
        );
        assert_eq!(game.unpack_action(NUM_ACTIONS - 1), ActionKind::Discard(2));
    }

    #[timed_test]
    fn betting_street_exposes_full_block() {
        let game = Game::new();
        let state = game.initial_state();
        assert_eq!(game.legal_action_range(&state), 0..ACTION_DISCARD_BASE);
    }

    #[timed_test]
    fn fold_is_terminal() {
        let game = Game::new();
        let state = game.act(&game.initial_state(), ACTION_FOLD);
        assert_eq!(state.street, street::TERMINAL);
        assert!(game.is_terminal(&state));
    }

    #[timed_test]
    fn bet_swaps_player_and_records_action() {
        let game = Game::new();
        let state = game.act(&game.initial_state(), ACTION_BET_BASE + 3);
        assert_eq!(state.player_id, 1);
        assert_eq!(state.last_action, Some(ACTION_BET_BASE + 3));
        assert_eq!(state.street, street::PREFLOP);
    }

    #[timed_test]
    fn preflop_calls_do_not_advance_street() {
        let game = Game::new();
        let mut state = game.initial_state();
        state = game.act(&state, ACTION_CALL);
        assert_eq!(state.street, street::PREFLOP);
        assert_eq!(state.player_id, 1);
        state = game.act(&state, ACTION_CALL);
        assert_eq!(state.street, street::PREFLOP);
        assert_eq!(state.player_id, 0);
    }

    #[timed_test]
    fn discard_order_is_player_one_then_player_zero() {
        let game = Game::new();
        // Start mid-game at player 1's discard decision.
        let mut state = game.initial_state();
        state.street = street::DISCARD_P1;
        state.player_id = 1;
        state.num_board_cards = 2;

        assert_eq!(
            game.legal_action_range(&state),
            ACTION_DISCARD_BASE..NUM_ACTIONS
        );

        let state = game.act(&state, ACTION_DISCARD_BASE + 2);
        assert_eq!(state.street, street::DISCARD_P0);
        assert_eq!(state.player_id, 0);
        assert_eq!(state.discard_choice, [-1, 2]);
        assert_eq!(state.num_board_cards, 3);

        let state = game.act(&state, ACTION_DISCARD_BASE);
        assert_eq!(state.street, street::FLOP_BET);
        assert_eq!(state.player_id, 1);
        assert_eq!(state.discard_choice, [0, 2]);
        assert_eq!(state.num_board_cards, 4);
    }

    #[timed_test]
    fn non_discarder_has_single_pass_action() {
        let game = Game::new();
        let mut state = game.initial_state();
        state.street = street::DISCARD_P1;
        state.player_id = 0;
        assert_eq!(game.legal_action_range(&state), ACTION_CALL..ACTION_CALL + 1);
    }

    #[timed_test]
    fn flop_call_call_reaches_turn() {
        let game = Game::new();
        let mut state = game.initial_state();
        state.street = street::FLOP_BET;
        state.player_id = 1;
        state.num_board_cards = 4;

        let state = game.act(&state, ACTION_CALL);
        assert_eq!(state.street, street::FLOP_BET);
        assert_eq!(state.player_id, 0);

        let state = game.act(&state, ACTION_CALL);
        assert_eq!(state.street, street::TURN_BET);
        assert_eq!(state.player_id, 1);
        assert_eq!(state.num_board_cards, 4);
    }

    #[timed_test]
    fn turn_completion_reaches_terminal_river() {
        let game = Game::new();
        let mut state = game.initial_state();
        state.street = street::TURN_BET;
        state.player_id = 1;
        state.num_board_cards = 4;

        let state = game.act(&state, ACTION_CALL);
        let state = game.act(&state, ACTION_CALL);
        assert_eq!(state.street, street::RIVER);
        assert_eq!(state.num_board_cards, 5);
        assert!(game.is_terminal(&state));
    }

    #[timed_test]
    fn state_equality_is_field_wise() {
        let game = Game::new();
        let a = game.initial_state();
        let mut b = game.initial_state();
        assert_eq!(a, b);

        b.player_id = 1;
        assert_ne!(a, b);

        let mut c = game.initial_state();
        c.board_cards[3] = 17;
        assert_ne!(a, c);
    }

    #[timed_test]
    #[should_panic(expected = "outside legal range")]
    fn act_rejects_illegal_action() {
        let game = Game::new();
        // Discard actions are illegal on a betting street.
        let _ = game.act(&game.initial_state(), ACTION_DISCARD_BASE);
    }
}
