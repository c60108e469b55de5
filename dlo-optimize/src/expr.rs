use core::ops::{Add, Mul, Neg, Sub};

/// A decision variable of a [`QuadraticProgram`](crate::QuadraticProgram).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(pub(crate) usize);

impl Variable {
    /// The position of this variable in the solution vector.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An affine expression `sum(coefficient * variable) + constant`.
///
/// Terms on the same variable are not merged; evaluation and assembly simply add them up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(Variable, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// An expression with no variables.
    pub fn constant(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    /// Adds `coefficient * variable` to the expression.
    #[must_use]
    pub fn term(mut self, variable: Variable, coefficient: f64) -> Self {
        self.add_term(variable, coefficient);
        self
    }

    pub fn add_term(&mut self, variable: Variable, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((variable, coefficient));
        }
    }

    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// Evaluates the expression given a value for every variable.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(variable, coefficient)| coefficient * values[variable.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl From<Variable> for LinearExpr {
    fn from(variable: Variable) -> Self {
        Self::new().term(variable, 1.0)
    }
}

impl Add for LinearExpr {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = Self;

    fn add(mut self, rhs: f64) -> Self {
        self.constant += rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + -rhs
    }
}

impl Sub<f64> for LinearExpr {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self {
        self + -rhs
    }
}

impl Mul<f64> for LinearExpr {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for (_, coefficient) in &mut self.terms {
            *coefficient *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Neg for LinearExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_evaluates_like_algebra() {
        let x = Variable(0);
        let y = Variable(1);
        let expr = (LinearExpr::from(x) * 2.0 - LinearExpr::from(y) + 1.0) * 0.5;
        assert_eq!(expr.evaluate(&[3.0, 4.0]), 1.5);
        assert_eq!((-expr).evaluate(&[3.0, 4.0]), -1.5);
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let expr = LinearExpr::new().term(Variable(0), 0.0).term(Variable(1), 1.0);
        assert_eq!(expr.terms().len(), 1);
    }
}
