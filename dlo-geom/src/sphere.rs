use crate::DEGENERATE_LENGTH;
use arrayvec::ArrayVec;
use dlo_core::nalgebra::Point3;

/// Absolute slack allowed when testing whether an intersection lies on the segment.
pub const SEGMENT_TOLERANCE: f64 = 1e-4;

/// Checks per coordinate that `x` lies between `a` and `b`, inclusive, up to [`SEGMENT_TOLERANCE`].
fn is_between(x: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> bool {
    (0..3).all(|i| {
        let (lo, hi) = if a[i] <= b[i] { (a[i], b[i]) } else { (b[i], a[i]) };
        lo - SEGMENT_TOLERANCE <= x[i] && x[i] <= hi + SEGMENT_TOLERANCE
    })
}

/// Intersects the segment `[a, b]` with the sphere at `center` with `radius`.
///
/// The line through `a` and `b` is intersected with the sphere by solving a quadratic in the
/// line parameter. Solutions that fall outside of the closed segment are dropped. When both
/// solutions are kept, the one nearer to `a` comes first.
///
/// A zero-length segment never intersects.
///
/// ```
/// use dlo_core::nalgebra::Point3;
/// use dlo_geom::line_sphere_intersection;
///
/// let hits = line_sphere_intersection(
///     Point3::new(-2.0, 0.0, 0.0),
///     Point3::new(2.0, 0.0, 0.0),
///     Point3::origin(),
///     1.0,
/// );
/// assert_eq!(hits.len(), 2);
/// assert!((hits[0].x + 1.0).abs() < 1e-12);
/// ```
pub fn line_sphere_intersection(
    a: Point3<f64>,
    b: Point3<f64>,
    center: Point3<f64>,
    radius: f64,
) -> ArrayVec<Point3<f64>, 2> {
    let mut intersections = ArrayVec::new();

    let direction = b - a;
    let qa = direction.norm_squared();
    if qa < DEGENERATE_LENGTH * DEGENERATE_LENGTH {
        return intersections;
    }
    let qb = 2.0 * direction.dot(&(a - center));
    let qc = (a - center).norm_squared() - radius * radius;
    let delta = qb * qb - 4.0 * qa * qc;

    let mut push_if_on_segment = |t: f64| {
        let point = a + direction * t;
        if is_between(&point, &a, &b) {
            intersections.push(point);
        }
    };

    if delta > 0.0 {
        let root = delta.sqrt();
        push_if_on_segment((-qb - root) / (2.0 * qa));
        push_if_on_segment((-qb + root) / (2.0 * qa));
    } else if delta == 0.0 {
        push_if_on_segment(-qb / (2.0 * qa));
    }

    intersections
}
