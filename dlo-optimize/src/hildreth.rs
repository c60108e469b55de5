use crate::{QpSolution, QpSolver, QuadraticProgram};
use dlo_core::{
    nalgebra::{Cholesky, DMatrix, DVector, Dynamic},
    SolverStatus,
};
use log::*;

/// Solves convex quadratic programs with Hildreth's dual coordinate ascent.
///
/// The problem `min 0.5 x' Q x + c' x` subject to `G x >= h` has the dual
/// `max_{l >= 0} -0.5 (G' l - c)' Q^-1 (G' l - c) + h' l`, whose coordinates can be maximized
/// one at a time in closed form. Each step clips one multiplier at zero and moves the primal
/// iterate `x = Q^-1 (G' l - c)` along the corresponding column of `Q^-1 G'`.
///
/// This is very cheap per step and works well for the small, sparse and mostly inactive
/// constraint sets produced by self-intersection avoidance. It requires `Q` to be positive
/// definite. Rows are kept sparse, and when `Q` is diagonal so are the columns of `Q^-1 G'`.
///
/// Coordinate ascent converges slowly once many coupled constraints are active. Every
/// [`HildrethSolver::polish_interval`] sweeps, the rows with positive multipliers are taken as
/// the active set and the equality constrained problem is solved directly. The polished point is
/// accepted as optimal if its multipliers are non-negative and it satisfies every row.
///
/// Infeasibility is detected through a Farkas certificate: weights `y >= 0` with `G' y = 0` and
/// `h' y > 0`. On an infeasible problem the multipliers grow without bound along such a
/// direction, so both the multipliers and their change over the last sweep are checked.
/// Diverging multipliers are also reported as infeasible.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HildrethSolver {
    max_iterations: usize,
    tolerance: f64,
    suboptimal_tolerance: f64,
    divergence_limit: f64,
    polish_interval: usize,
}

impl HildrethSolver {
    /// Creates a `HildrethSolver` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the maximum number of sweeps over all constraints.
    ///
    /// Default is `10000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Set the constraint violation and step size below which the solution is optimal.
    ///
    /// Default is `1e-9`.
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Set the constraint violation accepted as suboptimal when the sweeps run out.
    ///
    /// Default is `1e-5`.
    #[must_use]
    pub fn suboptimal_tolerance(self, suboptimal_tolerance: f64) -> Self {
        Self {
            suboptimal_tolerance,
            ..self
        }
    }

    /// Set the multiplier magnitude beyond which the problem is declared infeasible.
    ///
    /// Default is `1e12`.
    #[must_use]
    pub fn divergence_limit(self, divergence_limit: f64) -> Self {
        Self {
            divergence_limit,
            ..self
        }
    }

    /// Set the number of sweeps between attempts to solve the active set directly. `0` disables
    /// polishing.
    ///
    /// Polishing is only attempted once the violation is within the suboptimal tolerance.
    ///
    /// Default is `20`.
    #[must_use]
    pub fn polish_interval(self, polish_interval: usize) -> Self {
        Self {
            polish_interval,
            ..self
        }
    }
}

impl Default for HildrethSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
            suboptimal_tolerance: 1e-5,
            divergence_limit: 1e12,
            polish_interval: 20,
        }
    }
}

/// A constraint row `g' x >= h` along with `Q^-1 g` and `g' Q^-1 g`, both vectors sparse.
struct DualRow {
    g: Vec<(usize, f64)>,
    h: f64,
    step: Vec<(usize, f64)>,
    curvature: f64,
}

impl DualRow {
    fn slack(&self, x: &DVector<f64>) -> f64 {
        self.h - self.g.iter().map(|&(i, c)| c * x[i]).sum::<f64>()
    }

    fn apply(&self, weight: f64, x: &mut DVector<f64>) {
        for &(i, c) in &self.step {
            x[i] += weight * c;
        }
    }

    fn step_amax(&self) -> f64 {
        self.step.iter().fold(0.0, |max, &(_, c)| max.max(c.abs()))
    }
}

/// The inverse diagonal of `hessian`, if it has no off-diagonal entries.
fn inverse_diagonal(hessian: &DMatrix<f64>) -> Option<DVector<f64>> {
    let n = hessian.nrows();
    let off_diagonal = (0..n).any(|i| (0..n).any(|j| i != j && hessian[(i, j)] != 0.0));
    if off_diagonal {
        None
    } else {
        Some(hessian.diagonal().map(|q| 1.0 / q))
    }
}

fn densify(n: usize, entries: &[(usize, f64)]) -> DVector<f64> {
    let mut dense = DVector::zeros(n);
    for &(i, c) in entries {
        dense[i] += c;
    }
    dense
}

/// The rows with a positive multiplier.
fn active_rows(multipliers: &[f64]) -> Vec<usize> {
    (0..multipliers.len())
        .filter(|&r| multipliers[r] > 0.0)
        .collect()
}

fn max_violation(rows: &[DualRow], x: &DVector<f64>) -> f64 {
    rows.iter().map(|row| row.slack(x)).fold(0.0, f64::max)
}

impl HildrethSolver {
    /// Whether the non-negative `weights` combine the rows into `0 >= positive`.
    fn is_infeasibility_certificate(&self, n: usize, rows: &[DualRow], weights: &[f64]) -> bool {
        if weights.iter().any(|&w| w < 0.0) {
            return false;
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return false;
        }
        let mut combination = DVector::<f64>::zeros(n);
        let mut bound = 0.0;
        let mut scale = 0.0f64;
        for (row, &weight) in rows.iter().zip(weights) {
            if weight == 0.0 {
                continue;
            }
            let y = weight / total;
            for &(i, c) in &row.g {
                combination[i] += y * c;
                scale = scale.max(c.abs());
            }
            bound += y * row.h;
        }
        combination.amax() <= 1e-9 * scale && bound > self.tolerance
    }

    /// Solves for the multipliers that hold every row of `active` at equality, dropping the rows
    /// whose multipliers turn negative until none do.
    ///
    /// Returns the polished point, or `None` if no consistent active set was found.
    fn polish(
        &self,
        rows: &[DualRow],
        mut active: Vec<usize>,
        unconstrained: &DVector<f64>,
    ) -> Option<DVector<f64>> {
        let n = unconstrained.len();
        while !active.is_empty() {
            let a = active.len();
            let steps: Vec<DVector<f64>> = active
                .iter()
                .map(|&r| densify(n, &rows[r].step))
                .collect();
            let gram = DMatrix::from_fn(a, a, |i, j| {
                rows[active[i]]
                    .g
                    .iter()
                    .map(|&(k, c)| c * steps[j][k])
                    .sum::<f64>()
            });
            let residual =
                DVector::from_iterator(a, active.iter().map(|&r| rows[r].slack(unconstrained)));

            // Duplicate or dependent rows make the gram matrix singular.
            let regularization = 1e-12 * gram.diagonal().amax().max(f64::MIN_POSITIVE);
            let regularized = gram + DMatrix::identity(a, a) * regularization;
            let multipliers = regularized.cholesky()?.solve(&residual);

            if multipliers.iter().any(|&m| m < 0.0) {
                let before = active.len();
                active = active
                    .iter()
                    .zip(multipliers.iter())
                    .filter(|&(_, &m)| m >= 0.0)
                    .map(|(&r, _)| r)
                    .collect();
                trace!("polish dropped {} of {} rows", before - active.len(), before);
                continue;
            }

            let mut x = unconstrained.clone();
            for (&r, &multiplier) in active.iter().zip(multipliers.iter()) {
                rows[r].apply(multiplier, &mut x);
            }
            return Some(x);
        }
        None
    }

    /// Polishes on the `active` rows and checks the result against every row.
    fn try_polish(
        &self,
        rows: &[DualRow],
        active: Vec<usize>,
        unconstrained: &DVector<f64>,
    ) -> Option<DVector<f64>> {
        let x = self.polish(rows, active, unconstrained)?;
        let violation = max_violation(rows, &x);
        if x.iter().all(|v| v.is_finite()) && violation <= self.tolerance {
            Some(x)
        } else {
            trace!("polish rejected with violation {}", violation);
            None
        }
    }

    fn finish(
        &self,
        program: &QuadraticProgram,
        x: DVector<f64>,
        status: SolverStatus,
        iterations: usize,
    ) -> QpSolution {
        debug!(
            "hildreth finished with status {} after {} sweeps, objective {}",
            status,
            iterations,
            program.objective().evaluate(x.as_slice())
        );
        QpSolution::new(status, x.as_slice().to_vec(), iterations)
    }
}

impl QpSolver for HildrethSolver {
    fn solve(&mut self, program: &QuadraticProgram) -> QpSolution {
        let n = program.num_variables();
        if n == 0 {
            return QpSolution::new(SolverStatus::Optimal, Vec::new(), 0);
        }

        let (hessian, gradient, _) = program.objective().assemble(n);
        let inverse_diagonal = inverse_diagonal(&hessian);
        let cholesky: Cholesky<f64, Dynamic> = match hessian.cholesky() {
            Some(cholesky) => cholesky,
            None => {
                warn!("quadratic objective is not positive definite");
                return QpSolution::failed(SolverStatus::NumericError, 0);
            }
        };

        // Unconstrained minimizer.
        let unconstrained = -cholesky.solve(&gradient);
        let mut x = unconstrained.clone();

        let mut rows = Vec::new();
        for (g, h) in program.greater_equal_rows() {
            let step: Vec<(usize, f64)> = match &inverse_diagonal {
                Some(inverse) => g.iter().map(|&(i, c)| (i, c * inverse[i])).collect(),
                None => cholesky
                    .solve(&densify(n, &g))
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c != 0.0)
                    .map(|(i, &c)| (i, c))
                    .collect(),
            };
            let dense_step = densify(n, &step);
            let curvature: f64 = g.iter().map(|&(i, c)| c * dense_step[i]).sum();
            if curvature <= f64::EPSILON {
                // An empty row: `0 >= h`.
                if h > self.tolerance {
                    return QpSolution::failed(SolverStatus::Infeasible, 0);
                }
                continue;
            }
            rows.push(DualRow {
                g,
                h,
                step,
                curvature,
            });
        }
        trace!("hildreth solving {} variables and {} rows", n, rows.len());

        if rows.is_empty() {
            return self.finish(program, x, SolverStatus::Optimal, 0);
        }

        let mut multipliers = vec![0.0; rows.len()];
        let mut previous = multipliers.clone();
        let mut last_polished: Vec<usize> = Vec::new();
        for iteration in 1..=self.max_iterations {
            previous.copy_from_slice(&multipliers);
            let mut largest_move = 0.0f64;
            for (row, multiplier) in rows.iter().zip(multipliers.iter_mut()) {
                let updated = (*multiplier + row.slack(&x) / row.curvature).max(0.0);
                let delta = updated - *multiplier;
                if delta != 0.0 {
                    row.apply(delta, &mut x);
                    *multiplier = updated;
                    largest_move = largest_move.max(delta.abs() * row.step_amax());
                }
            }

            if !x.iter().all(|v| v.is_finite()) {
                return QpSolution::failed(SolverStatus::NumericError, iteration);
            }

            let violation = max_violation(&rows, &x);
            if violation <= self.tolerance && largest_move <= self.tolerance {
                return self.finish(program, x, SolverStatus::Optimal, iteration);
            }

            if self.polish_interval != 0
                && iteration % self.polish_interval == 0
                && violation <= self.suboptimal_tolerance
            {
                let active = active_rows(&multipliers);
                if active != last_polished {
                    if let Some(polished) = self.try_polish(&rows, active.clone(), &unconstrained)
                    {
                        debug!("hildreth polished {} active rows", active.len());
                        return self.finish(program, polished, SolverStatus::Optimal, iteration);
                    }
                    last_polished = active;
                }
            }

            let increments: Vec<f64> = multipliers
                .iter()
                .zip(&previous)
                .map(|(now, before)| now - before)
                .collect();
            if multipliers.iter().any(|&m| m > self.divergence_limit)
                || self.is_infeasibility_certificate(n, &rows, &increments)
                || self.is_infeasibility_certificate(n, &rows, &multipliers)
            {
                debug!("hildreth detected infeasibility after {} sweeps", iteration);
                return QpSolution::failed(SolverStatus::Infeasible, iteration);
            }
        }

        if self.polish_interval != 0 {
            if let Some(polished) =
                self.try_polish(&rows, active_rows(&multipliers), &unconstrained)
            {
                return self.finish(program, polished, SolverStatus::Optimal, self.max_iterations);
            }
        }

        let violation = max_violation(&rows, &x);
        if violation <= self.suboptimal_tolerance {
            self.finish(program, x, SolverStatus::Suboptimal, self.max_iterations)
        } else {
            warn!(
                "hildreth ran out of sweeps with constraint violation {}",
                violation
            );
            QpSolution::failed(SolverStatus::IterationLimit, self.max_iterations)
        }
    }
}
