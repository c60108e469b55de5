use thiserror::Error;

/// Status reported by a quadratic program solver.
///
/// Lives here rather than in the optimizer crate so that [`Error::SolverFailure`] can carry it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum SolverStatus {
    /// The solution satisfies every constraint within the solver tolerance.
    Optimal,
    /// The iteration budget ran out, but the solution is feasible within a looser tolerance.
    Suboptimal,
    /// The constraints admit no solution.
    Infeasible,
    /// The iteration budget ran out before a feasible point was found.
    IterationLimit,
    /// The objective could not be factorized, or the iterate stopped being finite.
    NumericError,
}

impl SolverStatus {
    /// Whether variable values may be read back from the solution.
    pub fn is_usable(self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::Suboptimal)
    }
}

impl core::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::Suboptimal => "suboptimal",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::IterationLimit => "iteration limit",
            SolverStatus::NumericError => "numeric error",
        };
        f.write_str(name)
    }
}

/// Errors produced anywhere in the tracking pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Empty point cloud, mismatched dimensions, non-positive node count, and the like.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A computation degenerated numerically (zero-length directions, singular systems).
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),
    /// Geodesic ordering found no frontier edge with nonzero length before visiting every point.
    #[error("ordering stalled after visiting {visited} of {total} points")]
    OrderingStall { visited: usize, total: usize },
    /// The separation constraints contradict each other.
    #[error("separation constraints are infeasible")]
    ConstraintInfeasible,
    /// The quadratic program solver did not report a usable solution.
    #[error("quadratic program solver failed with status: {status}")]
    SolverFailure { status: SolverStatus },
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    /// Whether a tracking session can keep going by reusing the previous frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InvalidInput(_))
    }
}

pub type Result<T> = core::result::Result<T, Error>;
