use crate::{LinearExpr, Variable};
use dlo_core::nalgebra::{DMatrix, DVector};

/// The direction of a [`LinearConstraint`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Sense {
    GreaterEqual,
    LessEqual,
}

/// `expr >= rhs` or `expr <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Amount by which `values` violate this constraint, zero if satisfied.
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::GreaterEqual => (self.rhs - lhs).max(0.0),
            Sense::LessEqual => (lhs - self.rhs).max(0.0),
        }
    }
}

/// A convex quadratic objective: a weighted sum of squared affine expressions plus an affine term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadraticObjective {
    squares: Vec<(f64, LinearExpr)>,
    linear: LinearExpr,
}

impl QuadraticObjective {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight * expr^2`. The weight must be non-negative to keep the objective convex.
    pub fn add_squared(&mut self, weight: f64, expr: LinearExpr) {
        self.squares.push((weight, expr));
    }

    /// Adds an affine term.
    pub fn add_linear(&mut self, expr: LinearExpr) {
        self.linear = core::mem::take(&mut self.linear) + expr;
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.squares
            .iter()
            .map(|(weight, expr)| weight * expr.evaluate(values).powi(2))
            .sum::<f64>()
            + self.linear.evaluate(values)
    }

    /// Assembles the objective as `0.5 * x' Q x + c' x + k` over `num_variables` variables.
    ///
    /// Returns `(Q, c, k)`.
    pub fn assemble(&self, num_variables: usize) -> (DMatrix<f64>, DVector<f64>, f64) {
        let mut hessian = DMatrix::zeros(num_variables, num_variables);
        let mut gradient = DVector::zeros(num_variables);
        let mut constant = self.linear.constant_term();

        for &(variable, coefficient) in self.linear.terms() {
            gradient[variable.index()] += coefficient;
        }
        for (weight, expr) in &self.squares {
            let offset = expr.constant_term();
            for &(vi, ci) in expr.terms() {
                for &(vj, cj) in expr.terms() {
                    hessian[(vi.index(), vj.index())] += 2.0 * weight * ci * cj;
                }
                gradient[vi.index()] += 2.0 * weight * offset * ci;
            }
            constant += weight * offset * offset;
        }

        (hessian, gradient, constant)
    }
}

/// A quadratic program: real variables with bounds, linear inequality constraints, and a convex
/// quadratic objective to minimize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadraticProgram {
    lower: Vec<f64>,
    upper: Vec<f64>,
    constraints: Vec<LinearConstraint>,
    objective: QuadraticObjective,
}

impl QuadraticProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable with bounds `lower <= v <= upper`. Either bound may be infinite.
    pub fn add_variable(&mut self, lower: f64, upper: f64) -> Variable {
        self.lower.push(lower);
        self.upper.push(upper);
        Variable(self.lower.len() - 1)
    }

    /// Declares an unbounded variable.
    pub fn add_free_variable(&mut self) -> Variable {
        self.add_variable(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Declares `count` variables sharing the same bounds.
    pub fn add_variables(&mut self, count: usize, lower: f64, upper: f64) -> Vec<Variable> {
        (0..count).map(|_| self.add_variable(lower, upper)).collect()
    }

    pub fn add_constraint(&mut self, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.constraints.push(LinearConstraint { expr, sense, rhs });
    }

    /// Adds `expr >= rhs`.
    pub fn add_ge(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Sense::GreaterEqual, rhs);
    }

    /// Adds `expr <= rhs`.
    pub fn add_le(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Sense::LessEqual, rhs);
    }

    /// Replaces the objective.
    pub fn set_objective(&mut self, objective: QuadraticObjective) {
        self.objective = objective;
    }

    /// Adds `expr^2` to the objective.
    pub fn minimize_squared(&mut self, expr: LinearExpr) {
        self.objective.add_squared(1.0, expr);
    }

    pub fn num_variables(&self) -> usize {
        self.lower.len()
    }

    pub fn bounds(&self, variable: Variable) -> (f64, f64) {
        (self.lower[variable.index()], self.upper[variable.index()])
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &QuadraticObjective {
        &self.objective
    }

    /// The largest violation of any constraint or bound by `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let bounds = values
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| (lo - v).max(v - hi).max(0.0));
        self.constraints
            .iter()
            .map(|constraint| constraint.violation(values))
            .chain(bounds)
            .fold(0.0, f64::max)
    }

    /// Every constraint and finite bound as `(g, h)` meaning `g' x >= h`.
    ///
    /// `g` holds the nonzero coefficients as `(index, coefficient)` pairs sorted by index.
    pub(crate) fn greater_equal_rows(&self) -> Vec<(Vec<(usize, f64)>, f64)> {
        let mut rows = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let sign = match constraint.sense {
                Sense::GreaterEqual => 1.0,
                Sense::LessEqual => -1.0,
            };
            let g = sparse_coefficients(&constraint.expr, sign);
            let h = sign * (constraint.rhs - constraint.expr.constant_term());
            rows.push((g, h));
        }
        for (i, (&lo, &hi)) in self.lower.iter().zip(&self.upper).enumerate() {
            if lo.is_finite() {
                rows.push((vec![(i, 1.0)], lo));
            }
            if hi.is_finite() {
                rows.push((vec![(i, -1.0)], -hi));
            }
        }
        rows
    }
}

/// The coefficients of `expr` scaled by `sign`, with repeated variables summed and zeros dropped.
fn sparse_coefficients(expr: &LinearExpr, sign: f64) -> Vec<(usize, f64)> {
    let mut terms: Vec<(usize, f64)> = expr
        .terms()
        .iter()
        .map(|&(variable, coefficient)| (variable.index(), sign * coefficient))
        .collect();
    terms.sort_unstable_by_key(|&(index, _)| index);

    let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
    for (index, coefficient) in terms {
        match merged.last_mut() {
            Some(last) if last.0 == index => last.1 += coefficient,
            _ => merged.push((index, coefficient)),
        }
    }
    merged.retain(|&(_, coefficient)| coefficient != 0.0);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_objective_matches_evaluation() {
        let mut program = QuadraticProgram::new();
        let x = program.add_free_variable();
        let y = program.add_free_variable();
        program.minimize_squared(LinearExpr::from(x) - 1.0);
        program.minimize_squared(LinearExpr::from(x) + LinearExpr::from(y) * 2.0);

        let (q, c, k) = program.objective().assemble(2);
        let values = [0.3, -0.7];
        let v = DVector::from_column_slice(&values);
        let assembled = 0.5 * (v.transpose() * &q * &v)[0] + c.dot(&v) + k;
        let direct = program.objective().evaluate(&values);
        assert!((assembled - direct).abs() < 1e-12);
    }

    #[test]
    fn bounds_become_rows() {
        let mut program = QuadraticProgram::new();
        program.add_variable(0.0, 1.0);
        program.add_variable(f64::NEG_INFINITY, 2.0);
        program.add_free_variable();
        assert_eq!(program.greater_equal_rows().len(), 3);
        assert_eq!(program.max_violation(&[1.5, 0.0, 0.0]), 0.5);
    }

    #[test]
    fn rows_are_sparse_and_merged() {
        let mut program = QuadraticProgram::new();
        let x = program.add_free_variable();
        let y = program.add_free_variable();
        let z = program.add_free_variable();
        program.add_le(
            LinearExpr::from(z) * 2.0 + LinearExpr::from(x) + LinearExpr::from(x) * 2.0
                - LinearExpr::from(y)
                + LinearExpr::from(y)
                + 1.0,
            4.0,
        );
        assert_eq!(
            program.greater_equal_rows(),
            vec![(vec![(0, -3.0), (2, -2.0)], -3.0)]
        );
    }
}
