use dlo_core::nalgebra::Point3;
use dlo_geom::{closest_point_on_segment, shortest_distance_between_segments};
use proptest::prelude::*;

fn point() -> impl Strategy<Value = Point3<f64>> {
    (-5.0..5.0f64, -5.0..5.0f64, -5.0..5.0f64).prop_map(|(x, y, z)| Point3::new(x, y, z))
}

proptest! {
    #[test]
    fn lines_are_never_farther_than_segments(a0 in point(), a1 in point(), b0 in point(), b1 in point()) {
        let clamped = shortest_distance_between_segments(a0, a1, b0, b1, true);
        let lines = shortest_distance_between_segments(a0, a1, b0, b1, false);
        prop_assert!(lines.distance <= clamped.distance + 1e-6);
    }

    #[test]
    fn argument_order_does_not_matter(a0 in point(), a1 in point(), b0 in point(), b1 in point()) {
        let forward = shortest_distance_between_segments(a0, a1, b0, b1, false);
        let backward = shortest_distance_between_segments(b0, b1, a0, a1, false);
        prop_assert!((forward.distance - backward.distance).abs() < 1e-6);
    }

    #[test]
    fn clamped_points_lie_on_segments(a0 in point(), a1 in point(), b0 in point(), b1 in point()) {
        let proximity = shortest_distance_between_segments(a0, a1, b0, b1, true);
        if let Some((pa, pb)) = proximity.closest {
            let on_a = closest_point_on_segment(pa, a0, a1, true);
            let on_b = closest_point_on_segment(pb, b0, b1, true);
            prop_assert!((pa - on_a).norm() < 1e-6);
            prop_assert!((pb - on_b).norm() < 1e-6);
            prop_assert!(((pa - pb).norm() - proximity.distance).abs() < 1e-9);
        }
    }
}
