use dlo_core::{
    nalgebra::{Point3, Vector3},
    PointCloud, SolverStatus, TrackedShape,
};
use dlo_geom::shortest_distance_between_segments;
use dlo_optimize::{HildrethSolver, QpSolution, QpSolver, QuadraticProgram};
use dlo_tracking::{DloTracker, RegistrationMethod, TrackerSettings, TrackingQuality};
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// A cable lying diagonally in the x-y plane that drifts in y and sags over time.
fn cable(t: f64, frame: usize) -> Point3<f64> {
    let drift = 0.003 * frame as f64;
    let sag = 0.002 * frame as f64 * (std::f64::consts::PI * t).sin();
    Point3::new(0.3 * t, 0.15 * t + drift + sag, 0.7)
}

fn observe(frame: usize, rng: &mut SmallRng) -> PointCloud {
    (0..200)
        .map(|i| {
            let noise = Vector3::new(
                rng.gen_range(-0.001..0.001),
                rng.gen_range(-0.001..0.001),
                rng.gen_range(-0.001..0.001),
            );
            cable(i as f64 / 199.0, frame) + noise
        })
        .collect()
}

fn distance_to_cable(node: &Point3<f64>, frame: usize) -> f64 {
    (0..=1000)
        .map(|i| (cable(i as f64 / 1000.0, frame) - node).norm())
        .fold(f64::INFINITY, f64::min)
}

fn settings(registration: RegistrationMethod) -> TrackerSettings {
    TrackerSettings {
        num_nodes: 15,
        nodes_per_dlo: 15,
        registration,
        visibility_threshold: Some(0.01),
        ..Default::default()
    }
}

fn track_moving_cable(registration: RegistrationMethod) {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(0);
    let mut tracker = DloTracker::new(settings(registration), HildrethSolver::new());

    let first = tracker.initialize(&observe(0, &mut rng)).unwrap();
    assert_eq!(first.nodes.len(), 15);

    for frame in 1..=10 {
        let tracked = tracker.track(&observe(frame, &mut rng)).unwrap();
        assert_eq!(tracked.quality, TrackingQuality::Nominal);
        assert_eq!(tracked.edges.len(), 14);
        let mean = tracked
            .nodes
            .iter()
            .map(|node| distance_to_cable(node, frame))
            .sum::<f64>()
            / tracked.nodes.len() as f64;
        assert!(mean < 5e-3, "frame {} mean distance {}", frame, mean);
        assert_eq!(tracked.visible.as_ref().map(Vec::len), Some(15));
    }
}

#[test]
fn coherent_tracking_follows_a_moving_cable() {
    track_moving_cable(RegistrationMethod::Coherent);
}

#[test]
fn lle_tracking_follows_a_moving_cable() {
    track_moving_cable(RegistrationMethod::Lle);
}

#[test]
fn tracked_nodes_keep_their_order() {
    let mut rng = SmallRng::seed_from_u64(1);
    let mut tracker = DloTracker::new(
        settings(RegistrationMethod::Coherent),
        HildrethSolver::new(),
    );
    tracker.initialize(&observe(0, &mut rng)).unwrap();
    let tracked = tracker.track(&observe(1, &mut rng)).unwrap();
    let increasing = tracked.nodes.windows(2).all(|w| w[0].x < w[1].x);
    let decreasing = tracked.nodes.windows(2).all(|w| w[0].x > w[1].x);
    assert!(increasing || decreasing);
}

/// Two straight strands crossing at the origin, `height` apart.
fn crossing_strands(height: f64) -> Vec<Point3<f64>> {
    let along_x = (0..4).map(|i| Point3::new(-0.15 + 0.1 * i as f64, 0.0, 0.0));
    let along_y = (0..4).map(|i| Point3::new(0.0, -0.15 + 0.1 * i as f64, height));
    along_x.chain(along_y).collect()
}

fn sample_strands(height: f64) -> PointCloud {
    let along_x = (0..61).map(|i| Point3::new(-0.15 + 0.005 * i as f64, 0.0, 0.0));
    let along_y = (0..61).map(|i| Point3::new(0.0, -0.15 + 0.005 * i as f64, height));
    along_x.chain(along_y).collect()
}

fn two_strand_settings() -> TrackerSettings {
    TrackerSettings {
        num_nodes: 8,
        nodes_per_dlo: 4,
        ..Default::default()
    }
}

#[test]
fn strands_pressed_together_keep_their_clearance() {
    let mut tracker = DloTracker::new(two_strand_settings(), HildrethSolver::new());
    tracker
        .seed(TrackedShape::new(crossing_strands(0.05), 4).unwrap())
        .unwrap();

    let tracked = tracker.track(&sample_strands(0.004)).unwrap();
    assert_eq!(tracked.quality, TrackingQuality::Nominal);
    assert!(tracked.constraints >= 1);
    assert_eq!(tracked.edges.len(), 6);

    let nodes = &tracked.nodes;
    let gap = shortest_distance_between_segments(nodes[1], nodes[2], nodes[5], nodes[6], true);
    assert!(gap.distance >= 0.015 - 1e-6, "gap {}", gap.distance);
    // The upper strand stays on top.
    assert!(nodes[5].z > nodes[1].z);
}

/// A solver that never produces a solution.
struct Broken;

impl QpSolver for Broken {
    fn solve(&mut self, _program: &QuadraticProgram) -> QpSolution {
        QpSolution::failed(SolverStatus::NumericError, 0)
    }
}

#[test]
fn solver_failure_degrades_to_the_previous_shape() {
    let seed = crossing_strands(0.05);
    let mut tracker = DloTracker::new(two_strand_settings(), Broken);
    tracker.seed(TrackedShape::new(seed.clone(), 4).unwrap()).unwrap();

    let tracked = tracker.track(&sample_strands(0.004)).unwrap();
    assert!(tracked.is_degraded());
    assert!(matches!(tracked.quality, TrackingQuality::Degraded(ref reason) if reason.contains("numeric error")));
    assert_eq!(tracked.nodes, seed);
    assert_eq!(tracker.shape().map(|shape| shape.nodes().to_vec()), Some(seed));
}
