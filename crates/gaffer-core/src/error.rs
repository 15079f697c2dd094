// Error taxonomy for the decision layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Squad composition precondition failed (size, quota or duplicates).
    /// Raised before any solver is invoked.
    #[error("invalid squad: {0}")]
    InvalidSquad(String),

    /// A squad member could not be found in the player pool.
    #[error("player {0} is not present in the player pool")]
    UnknownPlayer(u32),

    /// The integer program did not reach an optimal solution.
    #[error("{problem} did not reach an optimal solution: {status}")]
    Infeasible {
        problem: &'static str,
        status: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Map a solver failure onto `Infeasible` for the named problem.
pub(crate) fn infeasible(problem: &'static str, err: good_lp::ResolutionError) -> OptimizerError {
    OptimizerError::Infeasible {
        problem,
        status: err.to_string(),
    }
}
