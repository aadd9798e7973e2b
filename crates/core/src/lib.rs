#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Toss-or-Hold'em Subgame Solver Core
//!
//! A public-tree subgame solver for a two-player, zero-sum, imperfect-
//! information poker variant, plus the recursive self-play driver used to
//! generate value-network training data.
//!
//! # Modules
//!
//! - `game` - public-state model: actions, streets, transitions
//! - `hands` - hand indexing and 5-card evaluation
//! - `tree` - breadth-first public tree construction
//! - `solver` - FP / CFR / best-response subgame solvers and stats
//! - `query` - value-network query codec
//! - `net` - value-network contract
//! - `recursive` - recursive self-play driver
//! - `probability` - belief vectors and safe normalization

pub mod error;
pub mod game;
pub mod hands;
pub mod net;
pub mod probability;
pub mod query;
pub mod recursive;
pub mod solver;
pub mod tree;

pub use error::SolverError;
pub use game::{Action, Game, PartialPublicState, PlayerId};
pub use solver::{SubgameSolver, SubgameSolvingParams, TreeStrategy, build_solver};

/// One value per player, indexed by [`PlayerId`].
pub type Pair<T> = [T; 2];
