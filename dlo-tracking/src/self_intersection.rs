//! Keeping non-adjacent edges of the tracked shape at least one diameter apart.
//!
//! Registration has no notion of the object's thickness, so two strands that cross in the image
//! can be pulled into each other. For every pair of non-adjacent edges that came close, the
//! resolver linearizes their separation around the previous frame, where the strands were still
//! apart, and projects the candidate nodes onto the resulting half-spaces with a quadratic
//! program.

use dlo_core::{
    nalgebra::{Point3, Vector3},
    Edge, Error, Result, SolverStatus, TrackedShape,
};
use dlo_geom::{closest_point_on_segment, shortest_distance_between_segments, DEGENERATE_LENGTH};
use dlo_optimize::{LinearExpr, QpSolver, QuadraticProgram, Variable};
use itertools::Itertools;
use log::*;

/// A linearized requirement that two edges stay `clearance` apart.
///
/// With `v` the new node positions, the constraint reads
///
/// ```text
/// ((ra v[a.0] + (1 - ra) v[a.1]) - (rb v[b.0] + (1 - rb) v[b.1])) . direction >= clearance
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeparationConstraint {
    pub first: Edge,
    pub second: Edge,
    /// Interpolation ratios `(ra, rb)` of the closest points on the previous edges.
    pub ratios: (f64, f64),
    /// Unit vector from the closest point on `second` to the closest point on `first`, taken
    /// from the previous frame.
    pub direction: Vector3<f64>,
    pub clearance: f64,
}

impl SeparationConstraint {
    /// The left hand side of the constraint evaluated at `nodes`.
    pub fn separation(&self, nodes: &[Point3<f64>]) -> f64 {
        let (ra, rb) = self.ratios;
        let on_first = nodes[self.first.0].coords * ra + nodes[self.first.1].coords * (1.0 - ra);
        let on_second =
            nodes[self.second.0].coords * rb + nodes[self.second.1].coords * (1.0 - rb);
        (on_first - on_second).dot(&self.direction)
    }

    fn expression(&self, variables: &[[Variable; 3]]) -> LinearExpr {
        let (ra, rb) = self.ratios;
        let mut expr = LinearExpr::new();
        for k in 0..3 {
            let d = self.direction[k];
            expr.add_term(variables[self.first.0][k], ra * d);
            expr.add_term(variables[self.first.1][k], (1.0 - ra) * d);
            expr.add_term(variables[self.second.0][k], -rb * d);
            expr.add_term(variables[self.second.1][k], -(1.0 - rb) * d);
        }
        expr
    }
}

/// The outcome of [`SelfIntersectionResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub nodes: Vec<Point3<f64>>,
    pub constraints: Vec<SeparationConstraint>,
}

/// Pushes apart edges that came closer than the object's diameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SelfIntersectionResolver {
    check_distance: f64,
    dlo_diameter: f64,
    clamp: bool,
}

impl SelfIntersectionResolver {
    /// Creates a `SelfIntersectionResolver` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Only edge pairs closer than this in the candidate shape are constrained.
    ///
    /// Default is `0.04`.
    #[must_use]
    pub fn check_distance(self, check_distance: f64) -> Self {
        Self {
            check_distance,
            ..self
        }
    }

    /// The clearance required between constrained edges.
    ///
    /// Default is `0.015`.
    #[must_use]
    pub fn dlo_diameter(self, dlo_diameter: f64) -> Self {
        Self {
            dlo_diameter,
            ..self
        }
    }

    /// Whether the closest points on the previous edges are restricted to the segments rather
    /// than the lines through them.
    ///
    /// Default is `true`.
    #[must_use]
    pub fn clamp(self, clamp: bool) -> Self {
        Self { clamp, ..self }
    }

    /// Discovers the separation constraints between `previous` and `candidate` nodes.
    ///
    /// `candidate` must have as many nodes as `previous`.
    pub fn constraints(
        &self,
        previous: &TrackedShape,
        candidate: &[Point3<f64>],
    ) -> Result<Vec<SeparationConstraint>> {
        if candidate.len() != previous.len() {
            return Err(Error::InvalidInput(format!(
                "candidate has {} nodes but the previous shape has {}",
                candidate.len(),
                previous.len()
            )));
        }
        let prior = previous.nodes();

        let constraints = previous
            .edges()
            .into_iter()
            .tuple_combinations()
            .filter(|(first, second): &(Edge, Edge)| second.0 > first.0 + 1)
            .filter(|&(first, second)| {
                let (a0, a1) = first.endpoints(candidate);
                let (b0, b1) = second.endpoints(candidate);
                shortest_distance_between_segments(a0, a1, b0, b1, true).distance
                    < self.check_distance
            })
            .filter_map(|(first, second)| self.linearize(prior, first, second))
            .collect::<Vec<_>>();

        for constraint in &constraints {
            debug!(
                "separating edges {:?} and {:?} along {:?} with ratios {:?}",
                constraint.first, constraint.second, constraint.direction, constraint.ratios
            );
        }
        Ok(constraints)
    }

    fn linearize(
        &self,
        prior: &[Point3<f64>],
        first: Edge,
        second: Edge,
    ) -> Option<SeparationConstraint> {
        let (a0, a1) = first.endpoints(prior);
        let (b0, b1) = second.endpoints(prior);
        let (pa, pb) = shortest_distance_between_segments(a0, a1, b0, b1, self.clamp)
            .closest
            .unwrap_or_else(|| self.overlap_midpoint(a0, a1, b0, b1));

        let offset = pa - pb;
        let length = offset.norm();
        if length < DEGENERATE_LENGTH {
            warn!(
                "edges {:?} and {:?} touched in the previous frame, leaving them unconstrained",
                first, second
            );
            return None;
        }

        Some(SeparationConstraint {
            first,
            second,
            ratios: (ratio(pa, a0, a1), ratio(pb, b0, b1)),
            direction: offset / length,
            clearance: self.dlo_diameter,
        })
    }

    /// Closest points of two parallel segments: the middle of their overlap along `a` and its
    /// foot on `b`.
    fn overlap_midpoint(
        &self,
        a0: Point3<f64>,
        a1: Point3<f64>,
        b0: Point3<f64>,
        b1: Point3<f64>,
    ) -> (Point3<f64>, Point3<f64>) {
        let axis = a1 - a0;
        let length = axis.norm();
        let axis = axis / length;
        let t0 = axis.dot(&(b0 - a0));
        let t1 = axis.dot(&(b1 - a0));
        let start = t0.min(t1).max(0.0);
        let end = t0.max(t1).min(length);
        let pa = a0 + axis * (0.5 * (start + end));
        (pa, closest_point_on_segment(pa, b0, b1, self.clamp))
    }

    /// Moves `candidate` as little as possible to satisfy every separation constraint.
    ///
    /// When no edge pair needs separating the candidate is returned unchanged and `solver` is
    /// not called.
    pub fn resolve<S>(
        &self,
        previous: &TrackedShape,
        candidate: &[Point3<f64>],
        solver: &mut S,
    ) -> Result<Resolution>
    where
        S: QpSolver + ?Sized,
    {
        let constraints = self.constraints(previous, candidate)?;
        if constraints.is_empty() {
            return Ok(Resolution {
                nodes: candidate.to_vec(),
                constraints,
            });
        }

        let mut program = QuadraticProgram::new();
        let variables: Vec<[Variable; 3]> = candidate
            .iter()
            .map(|_| {
                [
                    program.add_free_variable(),
                    program.add_free_variable(),
                    program.add_free_variable(),
                ]
            })
            .collect();
        for (node, vars) in candidate.iter().zip(&variables) {
            for k in 0..3 {
                program.minimize_squared(LinearExpr::from(vars[k]) - node[k]);
            }
        }
        for constraint in &constraints {
            program.add_ge(constraint.expression(&variables), constraint.clearance);
        }

        let solution = solver.solve(&program);
        let status = solution.status();
        let values = match (status, solution.values()) {
            (_, Some(values)) if values.len() == program.num_variables() => values,
            (SolverStatus::Infeasible, _) => {
                warn!("{} separation constraints are infeasible", constraints.len());
                return Err(Error::ConstraintInfeasible);
            }
            _ => {
                warn!(
                    "separation program with {} constraints failed: {}",
                    constraints.len(),
                    status
                );
                return Err(Error::SolverFailure { status });
            }
        };
        debug!(
            "separated {} edge pairs in {} solver iterations ({})",
            constraints.len(),
            solution.iterations(),
            status
        );

        let nodes = variables
            .iter()
            .map(|vars| {
                Point3::new(
                    values[vars[0].index()],
                    values[vars[1].index()],
                    values[vars[2].index()],
                )
            })
            .collect();
        Ok(Resolution { nodes, constraints })
    }
}

impl Default for SelfIntersectionResolver {
    fn default() -> Self {
        Self {
            check_distance: 0.04,
            dlo_diameter: 0.015,
            clamp: true,
        }
    }
}

/// The `r` for which `point = r start + (1 - r) end`, by projection onto the edge.
fn ratio(point: Point3<f64>, start: Point3<f64>, end: Point3<f64>) -> f64 {
    let edge = end - start;
    let length_squared = edge.norm_squared();
    if length_squared < DEGENERATE_LENGTH * DEGENERATE_LENGTH {
        return 1.0;
    }
    1.0 - edge.dot(&(point - start)) / length_squared
}
