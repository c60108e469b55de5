use crate::DEGENERATE_LENGTH;
use dlo_core::nalgebra::{Matrix3, Point3, Vector3};

/// Below this squared sine of the angle between two directions, they are considered parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// The result of [`shortest_distance_between_segments`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SegmentProximity {
    /// The closest point on segment `a` and the closest point on segment `b`.
    ///
    /// This is `None` when the segments are parallel and overlap (or are parallel infinite
    /// lines), since every point of the overlap is equally close.
    pub closest: Option<(Point3<f64>, Point3<f64>)>,
    /// The distance between the segments.
    pub distance: f64,
}

impl SegmentProximity {
    fn between(pa: Point3<f64>, pb: Point3<f64>) -> Self {
        Self {
            closest: Some((pa, pb)),
            distance: (pa - pb).norm(),
        }
    }
}

/// The closest point to `point` on the segment `[start, end]`, or on the infinite line through
/// both points if `clamp` is `false`.
///
/// A zero-length segment returns `start`.
pub fn closest_point_on_segment(
    point: Point3<f64>,
    start: Point3<f64>,
    end: Point3<f64>,
    clamp: bool,
) -> Point3<f64> {
    let direction = end - start;
    let length = direction.norm();
    if length < DEGENERATE_LENGTH {
        return start;
    }
    let direction = direction / length;
    let projection = direction.dot(&(point - start));
    let projection = if clamp {
        projection.clamp(0.0, length)
    } else {
        projection
    };
    start + direction * projection
}

/// Computes the closest points between segments `[a0, a1]` and `[b0, b1]`.
///
/// If `clamp` is `false` the segments are extended into infinite lines.
///
/// Skew segments are solved by projecting onto each direction with a determinant ratio.
/// With `clamp`, a projection falling outside of its segment is pulled back to the nearest
/// endpoint, and the point on the other segment is re-projected from it.
///
/// Parallel segments that overlap have no unique closest points; only their distance is reported.
///
/// A zero-length segment is treated as a single point.
///
/// ```
/// use dlo_core::nalgebra::Point3;
/// use dlo_geom::shortest_distance_between_segments;
///
/// let proximity = shortest_distance_between_segments(
///     Point3::new(-1.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, -1.0, 2.0),
///     Point3::new(0.0, 1.0, 2.0),
///     true,
/// );
/// assert!((proximity.distance - 2.0).abs() < 1e-12);
/// ```
pub fn shortest_distance_between_segments(
    a0: Point3<f64>,
    a1: Point3<f64>,
    b0: Point3<f64>,
    b1: Point3<f64>,
    clamp: bool,
) -> SegmentProximity {
    let a = a1 - a0;
    let b = b1 - b0;
    let a_len = a.norm();
    let b_len = b.norm();

    match (a_len < DEGENERATE_LENGTH, b_len < DEGENERATE_LENGTH) {
        (true, true) => return SegmentProximity::between(a0, b0),
        (true, false) => {
            return SegmentProximity::between(a0, closest_point_on_segment(a0, b0, b1, clamp))
        }
        (false, true) => {
            return SegmentProximity::between(closest_point_on_segment(b0, a0, a1, clamp), b0)
        }
        (false, false) => {}
    }

    let a_dir: Vector3<f64> = a / a_len;
    let b_dir: Vector3<f64> = b / b_len;
    let cross = a_dir.cross(&b_dir);
    let denom = cross.norm_squared();

    if denom < PARALLEL_EPSILON {
        let d0 = a_dir.dot(&(b0 - a0));

        // Only finite segments can fail to overlap.
        if clamp {
            let d1 = a_dir.dot(&(b1 - a0));
            let nearer_b = if d0.abs() < d1.abs() { b0 } else { b1 };

            if d0 <= 0.0 && d1 <= 0.0 {
                // B lies before A.
                return SegmentProximity::between(a0, nearer_b);
            } else if d0 >= a_len && d1 >= a_len {
                // B lies after A.
                return SegmentProximity::between(a1, nearer_b);
            }
        }

        return SegmentProximity {
            closest: None,
            distance: (a0 + a_dir * d0 - b0).norm(),
        };
    }

    let t = b0 - a0;
    let t0 = Matrix3::from_rows(&[t.transpose(), b_dir.transpose(), cross.transpose()])
        .determinant()
        / denom;
    let t1 = Matrix3::from_rows(&[t.transpose(), a_dir.transpose(), cross.transpose()])
        .determinant()
        / denom;

    let mut pa = a0 + a_dir * t0;
    let mut pb = b0 + b_dir * t1;

    if clamp {
        let a_clamped = t0 < 0.0 || t0 > a_len;
        let b_clamped = t1 < 0.0 || t1 > b_len;

        if t0 < 0.0 {
            pa = a0;
        } else if t0 > a_len {
            pa = a1;
        }
        if t1 < 0.0 {
            pb = b0;
        } else if t1 > b_len {
            pb = b1;
        }

        if a_clamped {
            pb = b0 + b_dir * b_dir.dot(&(pa - b0)).clamp(0.0, b_len);
        }
        if b_clamped {
            pa = a0 + a_dir * a_dir.dot(&(pb - a0)).clamp(0.0, a_len);
        }
    }

    SegmentProximity::between(pa, pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn perpendicular_skew_segments() {
        let proximity =
            shortest_distance_between_segments(p(-1.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, -1.0, 2.0), p(0.0, 1.0, 2.0), true);
        let (pa, pb) = proximity.closest.unwrap();
        assert_relative_eq!(proximity.distance, 2.0, epsilon = 1e-12);
        assert_relative_eq!(pa, p(0.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(pb, p(0.0, 0.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn clamping_pulls_projection_to_endpoint() {
        let a0 = p(0.0, 0.0, 0.0);
        let a1 = p(1.0, 0.0, 0.0);
        let b0 = p(3.0, -1.0, 1.0);
        let b1 = p(3.0, 1.0, 1.0);

        let lines = shortest_distance_between_segments(a0, a1, b0, b1, false);
        assert_relative_eq!(lines.distance, 1.0, epsilon = 1e-12);
        assert_relative_eq!(lines.closest.unwrap().0, p(3.0, 0.0, 0.0), epsilon = 1e-12);

        let segments = shortest_distance_between_segments(a0, a1, b0, b1, true);
        let (pa, pb) = segments.closest.unwrap();
        assert_relative_eq!(pa, a1, epsilon = 1e-12);
        assert_relative_eq!(pb, p(3.0, 0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(segments.distance, 5.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn parallel_disjoint_segments() {
        let a0 = p(0.0, 0.0, 0.0);
        let a1 = p(1.0, 0.0, 0.0);
        let b0 = p(2.0, 1.0, 0.0);
        let b1 = p(3.0, 1.0, 0.0);

        let clamped = shortest_distance_between_segments(a0, a1, b0, b1, true);
        assert_eq!(clamped.closest, Some((a1, b0)));
        assert_relative_eq!(clamped.distance, 2.0f64.sqrt(), epsilon = 1e-12);

        let unclamped = shortest_distance_between_segments(a0, a1, b0, b1, false);
        assert_eq!(unclamped.closest, None);
        assert_relative_eq!(unclamped.distance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn parallel_segment_before_start() {
        let proximity = shortest_distance_between_segments(
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(-3.0, 0.0, 1.0),
            p(-1.0, 0.0, 1.0),
            true,
        );
        assert_eq!(proximity.closest, Some((p(0.0, 0.0, 0.0), p(-1.0, 0.0, 1.0))));
        assert_relative_eq!(proximity.distance, 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn parallel_overlap_reports_distance_only() {
        let proximity = shortest_distance_between_segments(
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(1.0, 0.0, 0.5),
            p(3.0, 0.0, 0.5),
            true,
        );
        assert_eq!(proximity.closest, None);
        assert_relative_eq!(proximity.distance, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_segment_is_a_point() {
        let proximity = shortest_distance_between_segments(
            p(0.5, 1.0, 0.0),
            p(0.5, 1.0, 0.0),
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            true,
        );
        let (pa, pb) = proximity.closest.unwrap();
        assert_eq!(pa, p(0.5, 1.0, 0.0));
        assert_relative_eq!(pb, p(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert!(proximity.distance.is_finite());
        assert_relative_eq!(proximity.distance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_in_argument_order() {
        let forward = shortest_distance_between_segments(
            p(0.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.3),
            p(1.0, 0.0, 0.3),
            true,
        );
        let backward = shortest_distance_between_segments(
            p(0.0, 1.0, 0.3),
            p(1.0, 0.0, 0.3),
            p(0.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            true,
        );
        assert_relative_eq!(forward.distance, 0.3, epsilon = 1e-12);
        assert_relative_eq!(forward.distance, backward.distance, epsilon = 1e-12);
    }
}
