use approx::assert_relative_eq;
use dlo_core::nalgebra::Vector3;
use dlo_optimize::{HildrethSolver, LinearExpr, QpSolver, QuadraticProgram, SolverStatus};

/// Projects `point` onto `{x : normal . x >= offset}` with the solver.
fn project(point: Vector3<f64>, normal: Vector3<f64>, offset: f64) -> (SolverStatus, Vector3<f64>) {
    let mut program = QuadraticProgram::new();
    let vars = program.add_variables(3, f64::NEG_INFINITY, f64::INFINITY);
    let constraint = vars
        .iter()
        .zip(normal.iter())
        .fold(LinearExpr::new(), |expr, (&v, &n)| expr.term(v, n));
    program.add_ge(constraint, offset);
    for (&v, &p) in vars.iter().zip(point.iter()) {
        program.minimize_squared(LinearExpr::from(v) - p);
    }

    let solution = HildrethSolver::new().solve(&program);
    let values = solution.values().map(|v| Vector3::new(v[0], v[1], v[2]));
    (solution.status(), values.unwrap_or_else(Vector3::zeros))
}

#[test]
fn violated_half_space_projection_is_analytic() {
    let point = Vector3::new(0.2, -0.1, 0.4);
    let normal = Vector3::new(1.0, 2.0, -0.5);
    let offset = 1.5;

    let (status, projected) = project(point, normal, offset);
    assert_eq!(status, SolverStatus::Optimal);

    let expected = point + normal * (offset - normal.dot(&point)) / normal.norm_squared();
    assert_relative_eq!(projected, expected, epsilon = 1e-9);
}

#[test]
fn satisfied_half_space_leaves_point() {
    let point = Vector3::new(3.0, 1.0, 0.0);
    let (status, projected) = project(point, Vector3::new(1.0, 0.0, 0.0), 1.0);
    assert_eq!(status, SolverStatus::Optimal);
    assert_relative_eq!(projected, point, epsilon = 1e-12);
}

#[test]
fn corner_of_two_half_planes() {
    // Project the origin onto {x >= 1, y >= 2}; the answer is the corner.
    let mut program = QuadraticProgram::new();
    let x = program.add_free_variable();
    let y = program.add_free_variable();
    program.add_ge(LinearExpr::from(x), 1.0);
    program.add_ge(LinearExpr::from(y) * 0.5, 1.0);
    program.minimize_squared(LinearExpr::from(x));
    program.minimize_squared(LinearExpr::from(y));

    let solution = HildrethSolver::new().solve(&program);
    assert_eq!(solution.status(), SolverStatus::Optimal);
    assert_relative_eq!(solution.value(x).unwrap(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(solution.value(y).unwrap(), 2.0, epsilon = 1e-9);
    assert!(program.max_violation(solution.values().unwrap()) < 1e-9);
}

#[test]
fn coupled_constraints_converge() {
    // Two overlapping half-planes whose normals are not orthogonal.
    let mut program = QuadraticProgram::new();
    let x = program.add_free_variable();
    let y = program.add_free_variable();
    program.add_ge(LinearExpr::from(x) + LinearExpr::from(y), 2.0);
    program.add_ge(LinearExpr::from(x) - LinearExpr::from(y) * 0.5, 1.0);
    program.minimize_squared(LinearExpr::from(x));
    program.minimize_squared(LinearExpr::from(y));

    let solution = HildrethSolver::new().solve(&program);
    assert!(solution.status().is_usable());
    let values = solution.values().unwrap();
    assert!(program.max_violation(values) < 1e-6);

    // The minimum norm point of the intersection of both half-planes is where both are active.
    assert_relative_eq!(values[0], 4.0 / 3.0, epsilon = 1e-6);
    assert_relative_eq!(values[1], 2.0 / 3.0, epsilon = 1e-6);
}
