//! Quadratic programs with linear inequality constraints.
//!
//! A [`QuadraticProgram`] is built up the way a modelling layer of a commercial solver is used:
//! declare variables with bounds, add linear constraints over them, then describe the objective.
//! Any [`QpSolver`] can then solve it. [`HildrethSolver`] is the solver shipped with this crate.
//!
//! ```
//! use dlo_optimize::{HildrethSolver, LinearExpr, QpSolver, QuadraticProgram};
//!
//! // Project (0, 0) onto the half-plane x + y >= 2.
//! let mut program = QuadraticProgram::new();
//! let x = program.add_free_variable();
//! let y = program.add_free_variable();
//! program.add_ge(LinearExpr::from(x) + LinearExpr::from(y), 2.0);
//! program.minimize_squared(LinearExpr::from(x));
//! program.minimize_squared(LinearExpr::from(y));
//!
//! let solution = HildrethSolver::new().solve(&program);
//! assert!(solution.status().is_usable());
//! assert!((solution.value(x).unwrap() - 1.0).abs() < 1e-6);
//! ```

mod expr;
mod hildreth;
mod program;

pub use dlo_core::SolverStatus;
pub use expr::*;
pub use hildreth::*;
pub use program::*;

/// The capability of solving a [`QuadraticProgram`].
///
/// Implementations may keep state (licenses, warm starts, scratch space) between calls, which
/// is why solving takes `&mut self`. A tracking session owns one solver and threads it through
/// every frame.
pub trait QpSolver {
    /// Minimize the objective of `program` subject to its constraints and bounds.
    fn solve(&mut self, program: &QuadraticProgram) -> QpSolution;
}

impl<S> QpSolver for &mut S
where
    S: QpSolver + ?Sized,
{
    fn solve(&mut self, program: &QuadraticProgram) -> QpSolution {
        (**self).solve(program)
    }
}

impl<S> QpSolver for Box<S>
where
    S: QpSolver + ?Sized,
{
    fn solve(&mut self, program: &QuadraticProgram) -> QpSolution {
        (**self).solve(program)
    }
}

/// The outcome of [`QpSolver::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    status: SolverStatus,
    values: Vec<f64>,
    iterations: usize,
}

impl QpSolution {
    pub fn new(status: SolverStatus, values: Vec<f64>, iterations: usize) -> Self {
        Self {
            status,
            values,
            iterations,
        }
    }

    /// A solution without usable values.
    pub fn failed(status: SolverStatus, iterations: usize) -> Self {
        Self::new(status, Vec::new(), iterations)
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The value of `variable`, if the status allows reading values back.
    pub fn value(&self, variable: Variable) -> Option<f64> {
        self.values().and_then(|values| values.get(variable.index()).copied())
    }

    /// All variable values in declaration order, if the status allows reading values back.
    pub fn values(&self) -> Option<&[f64]> {
        if self.status.is_usable() {
            Some(&self.values)
        } else {
            None
        }
    }
}
