use thiserror::Error;

/// Errors surfaced by the subgame solver and its collaborators.
///
/// Contract violations (actions outside the legal range, mis-sized query
/// buffers, value reads before the solver has stepped) are programming
/// errors and assert instead.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A depth-truncated leaf exists but no value net was supplied.
    #[error("found non-terminal leaf {0}; either provide a value net or increase max_depth")]
    NonTerminalLeaf(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Failure propagated verbatim from the external value evaluator.
    #[error("value evaluator error: {0}")]
    Evaluator(String),
}
