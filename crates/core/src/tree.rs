//! Breadth-first public game tree.
//!
//! Nodes live in one contiguous array; the children of a node occupy a
//! contiguous index range. Because expansion is breadth-first, unrolling to a
//! smaller depth yields an exact prefix of the deeper tree, which downstream
//! code relies on for partial initialization.

use std::ops::Range;

use crate::game::{Action, Game, PartialPublicState};

/// One node of the unrolled public tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub state: PartialPublicState,
    /// `None` for the root.
    pub parent: Option<usize>,
    pub children_begin: usize,
    pub children_end: usize,
    pub depth: usize,
}

impl TreeNode {
    #[must_use]
    pub fn num_children(&self) -> usize {
        self.children_end - self.children_begin
    }

    #[must_use]
    pub fn children(&self) -> Range<usize> {
        self.children_begin..self.children_end
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children_begin == self.children_end
    }
}

/// Contiguous breadth-first node array; index 0 is the root.
pub type Tree = Vec<TreeNode>;

/// Unroll the public state graph below `root` to at most `max_depth` plies.
///
/// A node is expanded iff it is non-terminal and strictly above the depth
/// bound; one child is produced per legal action, in action order.
#[must_use]
pub fn unroll_tree(game: &Game, root: &PartialPublicState, max_depth: usize) -> Tree {
    let mut nodes = vec![TreeNode {
        state: *root,
        parent: None,
        children_begin: 0,
        children_end: 0,
        depth: 0,
    }];

    let mut next = 0;
    while next < nodes.len() {
        let state = nodes[next].state;
        let depth = nodes[next].depth;
        if depth < max_depth && !game.is_terminal(&state) {
            let begin = nodes.len();
            for action in game.legal_action_range(&state) {
                nodes.push(TreeNode {
                    state: game.act(&state, action),
                    parent: Some(next),
                    children_begin: 0,
                    children_end: 0,
                    depth: depth + 1,
                });
            }
            nodes[next].children_begin = begin;
            nodes[next].children_end = nodes.len();
        }
        next += 1;
    }
    nodes
}

/// Iterate a node's children together with the action leading to each.
///
/// Children were generated one per legal action in order, so the pairing is
/// positional.
pub fn children_actions<'a>(
    game: &Game,
    node: &'a TreeNode,
) -> impl Iterator<Item = (usize, Action)> + 'a {
    node.children().zip(game.legal_action_range(&node.state))
}

/// The action that was applied at the parent to reach `node_id`.
///
/// Derived from the child's position in the parent's contiguous range; the
/// state's own `last_action` is not authoritative here because a fold does
/// not record itself.
///
/// # Panics
///
/// Panics when called on the root.
#[must_use]
pub fn incoming_action(game: &Game, tree: &Tree, node_id: usize) -> Action {
    let parent = tree[node_id].parent.expect("root has no incoming action");
    let range = game.legal_action_range(&tree[parent].state);
    range.start + (node_id - tree[parent].children_begin)
}
