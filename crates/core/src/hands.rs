//! Hand indexing and 5-card evaluation.
//!
//! A hand index identifies one of the C(52, 3) = 22,100 unordered pre-discard
//! holdings via the lexicographic enumeration of 3-element subsets of the
//! deck. Ranks encode the hand class in the bits above 20 so that plain
//! integer comparison matches poker ordering.

use std::cmp::Ordering;

use arrayvec::ArrayVec;
use rayon::prelude::*;

use crate::game::{Game, PartialPublicState};

/// Total order on 5-card combinations; higher is better.
pub type HandRank = i64;

/// Cards in a pre-discard holding.
pub const NUM_HOLE_CARDS: usize = 3;

/// Bit position of the hand-class nibble inside a [`HandRank`].
const CLASS_SHIFT: i64 = 20;

/// Belief mass below this is treated as impossible when computing win
/// probabilities.
const MIN_BELIEF: f64 = 1e-10;

/// Hand classes in ascending strength, matching the rank encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum HandClass {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    Trips = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    Quads = 7,
    StraightFlush = 8,
}

impl HandClass {
    /// Decode the class nibble of a [`HandRank`].
    ///
    /// # Panics
    ///
    /// Panics on a rank whose class bits are outside `0..=8`.
    #[must_use]
    pub fn from_rank(rank: HandRank) -> Self {
        match (rank >> CLASS_SHIFT) & 0xF {
            0 => Self::HighCard,
            1 => Self::Pair,
            2 => Self::TwoPair,
            3 => Self::Trips,
            4 => Self::Straight,
            5 => Self::Flush,
            6 => Self::FullHouse,
            7 => Self::Quads,
            8 => Self::StraightFlush,
            other => panic!("invalid hand class {other}"),
        }
    }
}

/// `rank = card / 4` with 0 = two and 12 = ace.
#[must_use]
pub fn card_rank(card: u8) -> usize {
    usize::from(card) / 4
}

/// `suit = card % 4`.
#[must_use]
pub fn card_suit(card: u8) -> usize {
    usize::from(card) % 4
}

/// Binomial coefficient, exact for the small arguments used here.
fn choose(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let mut result = 1usize;
    for i in 0..k {
        result = result * (n - i) / (i + 1);
    }
    result
}

/// Map a hand index to its three cards, strictly increasing.
///
/// Inverse of [`cards_to_hand`]; the enumeration is lexicographic over
/// 3-element subsets of `{0, .., 51}`.
///
/// # Panics
///
/// Panics if `hand >= Game::NUM_HANDS`.
#[must_use]
pub fn hand_to_cards(hand: usize) -> [u8; NUM_HOLE_CARDS] {
    assert!(hand < Game::NUM_HANDS, "hand index {hand} out of range");
    let mut cards = [0u8; NUM_HOLE_CARDS];
    let mut remaining = hand;
    let mut card = 0usize;
    for (slot, out) in cards.iter_mut().enumerate() {
        loop {
            // Subsets that start with `card` at this position.
            let with_card = choose(51 - card, NUM_HOLE_CARDS - slot - 1);
            if remaining < with_card {
                #[allow(clippy::cast_possible_truncation)]
                {
                    *out = card as u8;
                }
                card += 1;
                break;
            }
            remaining -= with_card;
            card += 1;
        }
    }
    cards
}

/// Map a strictly increasing card triple back to its hand index.
///
/// # Panics
///
/// Panics if the cards are not strictly increasing or exceed the deck.
#[must_use]
pub fn cards_to_hand(cards: [u8; NUM_HOLE_CARDS]) -> usize {
    assert!(
        cards[0] < cards[1] && cards[1] < cards[2] && cards[2] < 52,
        "cards must be strictly increasing deck indices, got {cards:?}"
    );
    let mut index = 0usize;
    let mut previous = 0usize;
    for (slot, &card) in cards.iter().enumerate() {
        for skipped in previous..usize::from(card) {
            index += choose(51 - skipped, NUM_HOLE_CARDS - slot - 1);
        }
        previous = usize::from(card) + 1;
    }
    index
}

/// The two cards kept after discarding hole-card index `discard`.
#[must_use]
pub fn post_discard_cards(hand: usize, discard: usize) -> [u8; 2] {
    let cards = hand_to_cards(hand);
    match discard {
        0 => [cards[1], cards[2]],
        1 => [cards[0], cards[2]],
        2 => [cards[0], cards[1]],
        _ => panic!("discard index {discard} out of range"),
    }
}

/// Evaluate exactly five cards into a [`HandRank`].
///
/// Encoding: class nibble above bit 20, kickers in descending nibbles below,
/// so lexicographic `i64` comparison matches poker ranking.
#[must_use]
#[allow(clippy::similar_names)]
pub fn evaluate_5card_hand(cards: [u8; 5]) -> HandRank {
    let mut rank_count = [0u8; 13];
    let mut suit_count = [0u8; 4];
    for &card in &cards {
        rank_count[card_rank(card)] += 1;
        suit_count[card_suit(card)] += 1;
    }

    let is_flush = suit_count.contains(&5);

    // A-2-3-4-5 counts as a five-high straight.
    let mut straight_high: Option<i64> = None;
    if rank_count[0] > 0
        && rank_count[1] > 0
        && rank_count[2] > 0
        && rank_count[3] > 0
        && rank_count[12] > 0
    {
        straight_high = Some(3);
    }
    for start in 0..=8 {
        if rank_count[start..start + 5].iter().all(|&c| c > 0) {
            straight_high = Some((start + 4) as i64);
            break;
        }
    }

    let mut pair_ranks: ArrayVec<i64, 2> = ArrayVec::new();
    let mut num_pairs = 0usize;
    let mut trip_rank: Option<i64> = None;
    let mut quad_rank: Option<i64> = None;
    let mut kickers: ArrayVec<i64, 5> = ArrayVec::new();
    for rank in (0..13).rev() {
        let rank_value = rank as i64;
        match rank_count[rank] {
            4 => quad_rank = Some(rank_value),
            3 => trip_rank = Some(rank_value),
            2 => {
                if pair_ranks.len() < 2 {
                    pair_ranks.push(rank_value);
                }
                num_pairs += 1;
            }
            1 => kickers.push(rank_value),
            _ => {}
        }
    }

    if let Some(high) = straight_high {
        if is_flush {
            return (8 << CLASS_SHIFT) | high;
        }
    }
    if let Some(quad) = quad_rank {
        return (7 << CLASS_SHIFT) | (quad << 4) | kickers[0];
    }
    if let (Some(trips), true) = (trip_rank, num_pairs > 0) {
        return (6 << CLASS_SHIFT) | (trips << 4) | pair_ranks[0];
    }
    if is_flush {
        let mut value = 5 << CLASS_SHIFT;
        for (i, &kicker) in kickers.iter().enumerate() {
            value |= kicker << (4 * (4 - i));
        }
        return value;
    }
    if let Some(high) = straight_high {
        return (4 << CLASS_SHIFT) | high;
    }
    if let Some(trips) = trip_rank {
        return (3 << CLASS_SHIFT) | (trips << 8) | (kickers[0] << 4) | kickers[1];
    }
    if num_pairs >= 2 {
        return (2 << CLASS_SHIFT) | (pair_ranks[0] << 8) | (pair_ranks[1] << 4) | kickers[0];
    }
    if num_pairs == 1 {
        return (1 << CLASS_SHIFT)
            | (pair_ranks[0] << 12)
            | (kickers[0] << 8)
            | (kickers[1] << 4)
            | kickers[2];
    }
    (kickers[0] << 16) | (kickers[1] << 12) | (kickers[2] << 8) | (kickers[3] << 4) | kickers[4]
}

/// Best rank over all 5-card subsets of `hole ∪ board`.
///
/// Fewer than five available cards evaluates to the zero rank, as no
/// showdown hand can be formed.
#[must_use]
pub fn evaluate_best_hand(hole: &[u8], board: &[u8]) -> HandRank {
    let mut all: ArrayVec<u8, 8> = ArrayVec::new();
    all.try_extend_from_slice(hole).expect("at most 2 hole cards");
    all.try_extend_from_slice(board).expect("at most 6 board cards");

    let n = all.len();
    if n < 5 {
        return 0;
    }
    if n == 5 {
        return evaluate_5card_hand([all[0], all[1], all[2], all[3], all[4]]);
    }

    let mut best = 0;
    for a in 0..n - 4 {
        for b in a + 1..n - 3 {
            for c in b + 1..n - 2 {
                for d in c + 1..n - 1 {
                    for e in d + 1..n {
                        let rank = evaluate_5card_hand([all[a], all[b], all[c], all[d], all[e]]);
                        if rank > best {
                            best = rank;
                        }
                    }
                }
            }
        }
    }
    best
}

/// Sign of `a - b`, as a standard ordering.
#[must_use]
pub fn compare_hands(a: HandRank, b: HandRank) -> Ordering {
    a.cmp(&b)
}

/// Best achievable rank for a pre-discard holding: the player picks the
/// discard that maximizes the showdown hand.
#[must_use]
pub fn best_post_discard_rank(hand: usize, board: &[u8]) -> HandRank {
    (0..NUM_HOLE_CARDS)
        .map(|discard| evaluate_best_hand(&post_discard_cards(hand, discard), board))
        .max()
        .unwrap_or(0)
}

/// P(win) + 0.5 P(tie) for every own hand against an opponent belief vector.
///
/// Both sides are assumed to pick their best discard. Returns normalized
/// probabilities in `[0, 1]`; with fewer than four board cards (a degenerate
/// call before any showdown is possible) every entry is 0.5.
#[must_use]
pub fn win_probability(game: &Game, state: &PartialPublicState, beliefs: &[f64]) -> Vec<f64> {
    assert_eq!(beliefs.len(), game.num_hands());

    #[allow(clippy::cast_sign_loss)]
    let board: ArrayVec<u8, 6> = state.board_cards[..state.num_board_cards]
        .iter()
        .filter(|&&card| card >= 0)
        .map(|&card| card as u8)
        .collect();
    if board.len() < 4 {
        return vec![0.5; game.num_hands()];
    }

    let ranks: Vec<HandRank> = (0..game.num_hands())
        .into_par_iter()
        .map(|hand| best_post_discard_rank(hand, &board))
        .collect();

    // Group opponent mass by rank so each own hand resolves with one
    // binary search instead of a 22,100-hand scan.
    let mut entries: Vec<(HandRank, f64)> = ranks
        .iter()
        .copied()
        .zip(beliefs.iter().copied())
        .filter(|&(_, weight)| weight >= MIN_BELIEF)
        .collect();
    entries.sort_unstable_by_key(|&(rank, _)| rank);

    // (rank, mass strictly below, mass at rank)
    let mut groups: Vec<(HandRank, f64, f64)> = Vec::new();
    let mut below = 0.0;
    let mut i = 0;
    while i < entries.len() {
        let rank = entries[i].0;
        let mut mass = 0.0;
        while i < entries.len() && entries[i].0 == rank {
            mass += entries[i].1;
            i += 1;
        }
        groups.push((rank, below, mass));
        below += mass;
    }
    let total = below;
    if total <= MIN_BELIEF {
        return vec![0.5; game.num_hands()];
    }

    ranks
        .iter()
        .map(|&rank| {
            match groups.binary_search_by(|group| group.0.cmp(&rank)) {
                Ok(at) => (groups[at].1 + 0.5 * groups[at].2) / total,
                Err(above) => {
                    let won = if above == 0 {
                        0.0
                    } else {
                        groups[above - 1].1 + groups[above - 1].2
                    };
                    won / total
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::street;
    use test_macros::timed_test;

    #[timed_test]
    fn first_hand_is_lowest_triple() {
        assert_eq!(hand_to_cards(0), [0, 1, 2]);
        assert_eq!(post_discard_cards(0, 0), [1, 2]);
        assert_eq!(post_discard_cards(0, 1), [0, 2]);
        assert_eq!(post_discard_cards(0, 2), [0, 1]);
    }

    #[timed_test]
    fn last_hand_is_highest_triple() {
        assert_eq!(hand_to_cards(Game::NUM_HANDS - 1), [49, 50, 51]);
    }

    #[timed_test(30)]
    fn hand_index_bijection() {
        for hand in 0..Game::NUM_HANDS {
            let cards = hand_to_cards(hand);
            assert!(cards[0] < cards[1] && cards[1] < cards[2]);
            assert!(cards[2] < 52);
            assert_eq!(cards_to_hand(cards), hand, "roundtrip failed for {cards:?}");
        }
    }

    #[timed_test]
    fn classifies_pair_above_high_card() {
        // 2c 2d 4h 5s 7c vs 2c 3d 4h 5s 7c
        let pair = evaluate_5card_hand([0, 4, 10, 15, 20]);
        let high_card = evaluate_5card_hand([0, 5, 10, 15, 20]);

        assert_eq!(HandClass::from_rank(pair), HandClass::Pair);
        assert_eq!(HandClass::from_rank(high_card), HandClass::HighCard);
        assert_eq!(compare_hands(pair, high_card), Ordering::Greater);
    }

    #[timed_test]
    fn classifies_every_hand_class() {
        let cases: [([u8; 5], HandClass); 9] = [
            ([0, 5, 10, 15, 24], HandClass::HighCard),
            ([0, 4, 10, 15, 20], HandClass::Pair),
            ([0, 4, 5, 6, 20], HandClass::TwoPair),
            ([0, 1, 2, 15, 20], HandClass::Trips),
            ([0, 5, 10, 15, 17], HandClass::Straight),
            ([0, 4, 8, 12, 20], HandClass::Flush),
            ([0, 1, 2, 4, 5], HandClass::FullHouse),
            ([0, 1, 2, 3, 20], HandClass::Quads),
            ([0, 4, 8, 12, 16], HandClass::StraightFlush),
        ];
        for (cards, expected) in cases {
            let rank = evaluate_5card_hand(cards);
            assert_eq!(
                HandClass::from_rank(rank),
                expected,
                "misclassified {cards:?}"
            );
        }
    }

    #[timed_test]
    fn class_ordering_is_total() {
        let ladder = [
            evaluate_5card_hand([0, 5, 10, 15, 24]), // high card
            evaluate_5card_hand([0, 4, 10, 15, 20]), // pair
            evaluate_5card_hand([0, 4, 5, 6, 20]),   // two pair
            evaluate_5card_hand([0, 1, 2, 15, 20]),  // trips
            evaluate_5card_hand([0, 5, 10, 15, 17]), // straight
            evaluate_5card_hand([0, 4, 8, 12, 20]),  // flush
            evaluate_5card_hand([0, 1, 2, 4, 5]),    // full house
            evaluate_5card_hand([0, 1, 2, 3, 20]),   // quads
            evaluate_5card_hand([0, 4, 8, 12, 16]),  // straight flush
        ];
        for pair in ladder.windows(2) {
            assert_eq!(
                compare_hands(pair[1], pair[0]),
                Ordering::Greater,
                "{:?} should beat {:?}",
                HandClass::from_rank(pair[1]),
                HandClass::from_rank(pair[0])
            );
        }
    }

    #[timed_test]
    fn wheel_loses_to_six_high_straight() {
        // A-2-3-4-5 vs 2-3-4-5-6, both rainbow.
        let wheel = evaluate_5card_hand([0, 5, 10, 15, 49]);
        let six_high = evaluate_5card_hand([0, 5, 10, 15, 17]);
        assert_eq!(HandClass::from_rank(wheel), HandClass::Straight);
        assert_eq!(compare_hands(six_high, wheel), Ordering::Greater);
    }

    #[timed_test]
    fn best_hand_search_finds_quads_in_seven() {
        // Hole 2c 2d with two more twos on the board.
        let rank = evaluate_best_hand(&[0, 1], &[2, 3, 16, 20, 24]);
        assert_eq!(HandClass::from_rank(rank), HandClass::Quads);
    }

    #[timed_test]
    fn best_hand_with_too_few_cards_is_zero() {
        assert_eq!(evaluate_best_hand(&[0, 1], &[2]), 0);
    }

    #[timed_test]
    fn kickers_break_pair_ties() {
        // Both hold a pair of twos; the second has a better top kicker.
        let low_kicker = evaluate_5card_hand([0, 4, 10, 15, 20]);
        let high_kicker = evaluate_5card_hand([0, 4, 10, 15, 48]);
        assert_eq!(compare_hands(high_kicker, low_kicker), Ordering::Greater);
    }

    #[timed_test]
    fn win_probability_degenerate_board_is_half() {
        let game = Game::new();
        let state = game.initial_state();
        let beliefs = vec![1.0 / game.num_hands() as f64; game.num_hands()];
        let values = win_probability(&game, &state, &beliefs);
        assert!(values.iter().all(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[timed_test(120)]
    fn win_probability_bounded_on_full_board() {
        let game = Game::new();
        let mut state = game.initial_state();
        state.street = street::TERMINAL;
        state.num_board_cards = 6;
        for (i, slot) in state.board_cards.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            {
                *slot = (10 + i) as i8;
            }
        }

        let beliefs = vec![1.0 / game.num_hands() as f64; game.num_hands()];
        let values = win_probability(&game, &state, &beliefs);

        assert_eq!(values.len(), game.num_hands());
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // A hand that can use the board's straight potential should beat
        // a weak one on average; at minimum the values must not be constant.
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(max > min, "showdown values should discriminate hands");
    }
}
