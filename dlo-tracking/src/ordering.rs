//! Recovering the order of points sampled along a single curve.
//!
//! The points are joined greedily into a spanning tree, always taking the shortest edge between
//! a visited and an unvisited point (Prim's algorithm on the complete graph). On a simple curve
//! that tree is a path, but it grows from both ends of the visited set. The path is assembled in
//! a double ended sequence: every time growth switches to the other end, the insertion point
//! moves with it.

use dlo_core::{nalgebra::Point3, Error, Result};
use float_ord::FloatOrd;
use itertools::iproduct;
use log::*;
use std::collections::VecDeque;

/// Where the next attached point goes in the assembled sequence.
struct PathAssembly {
    sequence: VecDeque<usize>,
    last_attached: usize,
    reversals: usize,
    anchor: usize,
    offset: usize,
}

impl PathAssembly {
    fn new(first: usize, second: usize) -> Self {
        Self {
            sequence: [first, second].into_iter().collect(),
            last_attached: second,
            reversals: 0,
            anchor: first,
            offset: 0,
        }
    }

    fn position(&self, point: usize) -> usize {
        self.sequence
            .iter()
            .position(|&p| p == point)
            .unwrap_or(self.sequence.len())
    }

    /// Attach `point`, found as the nearest unvisited neighbour of the visited point `from`.
    fn attach(&mut self, from: usize, point: usize) {
        if from != self.last_attached {
            self.reversals += 1;
            self.anchor = from;
            self.offset = 1;
        }

        if self.reversals % 2 == 1 {
            let at = self.position(from);
            self.sequence.insert(at, point);
        } else if self.reversals != 0 {
            let at = (self.position(self.anchor) + self.offset).min(self.sequence.len());
            self.sequence.insert(at, point);
            self.offset += 1;
        } else {
            self.sequence.push_back(point);
        }
        self.last_attached = point;
    }
}

/// Returns a permutation of `0..points.len()` that walks along the curve the points sample.
///
/// The walk starts its growth at point `0`, so the result may begin at either end of the curve.
/// Exact duplicate points cannot be attached and stall the ordering.
///
/// ```
/// use dlo_core::nalgebra::Point3;
/// use dlo_tracking::geodesic_order;
///
/// let points = [
///     Point3::new(0.2, 0.0, 0.0),
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(0.33, 0.0, 0.0),
///     Point3::new(0.1, 0.0, 0.0),
/// ];
/// assert_eq!(geodesic_order(&points).unwrap(), [2, 0, 3, 1]);
/// ```
pub fn geodesic_order(points: &[Point3<f64>]) -> Result<Vec<usize>> {
    let total = points.len();
    match total {
        0 => return Err(Error::InvalidInput("cannot order an empty point set".into())),
        1 => return Ok(vec![0]),
        _ => {}
    }

    let distances: Vec<Vec<f64>> = points
        .iter()
        .map(|a| points.iter().map(|b| (a - b).norm_squared()).collect())
        .collect();

    let mut visited = vec![false; total];
    visited[0] = true;
    let mut assembly: Option<PathAssembly> = None;

    for attached in 1..total {
        let nearest = iproduct!(0..total, 0..total)
            .filter(|&(m, n)| visited[m] && !visited[n] && distances[m][n] != 0.0)
            .min_by_key(|&(m, n)| FloatOrd(distances[m][n]));
        let (from, point) = match nearest {
            Some(edge) => edge,
            None => {
                warn!(
                    "geodesic ordering stalled with {} of {} points visited",
                    attached, total
                );
                return Err(Error::OrderingStall {
                    visited: attached,
                    total,
                });
            }
        };

        match assembly.as_mut() {
            Some(assembly) => assembly.attach(from, point),
            None => assembly = Some(PathAssembly::new(from, point)),
        }
        visited[point] = true;
    }

    let order: Vec<usize> = assembly
        .map(|assembly| assembly.sequence.into_iter().collect())
        .unwrap_or_default();
    debug!("ordered {} points", order.len());
    Ok(order)
}

/// The points of `points` rearranged by [`geodesic_order`].
pub fn order_points(points: &[Point3<f64>]) -> Result<Vec<Point3<f64>>> {
    Ok(geodesic_order(points)?
        .into_iter()
        .map(|i| points[i])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::SmallRng, seq::SliceRandom, Rng, SeedableRng};

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    #[test]
    fn empty_and_single() {
        assert!(matches!(geodesic_order(&[]), Err(Error::InvalidInput(_))));
        assert_eq!(geodesic_order(&[Point3::new(1.0, 2.0, 3.0)]).unwrap(), [0]);
    }

    #[test]
    fn scrambled_line_is_monotonic() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut x = 0.0;
        let mut points: Vec<Point3<f64>> = (0..60)
            .map(|_| {
                x += rng.gen_range(0.005..0.02);
                Point3::new(x, 0.3 * x, -x)
            })
            .collect();
        points.shuffle(&mut rng);

        let ordered = order_points(&points).unwrap();
        assert_eq!(ordered.len(), points.len());
        let increasing = ordered.windows(2).all(|w| w[0].x < w[1].x);
        let decreasing = ordered.windows(2).all(|w| w[0].x > w[1].x);
        assert!(increasing || decreasing);
    }

    #[test]
    fn growth_from_the_middle_switches_ends() {
        let xs = [0.5, 0.6, 0.42, 0.3, 0.75, 0.1, 0.9];
        let points: Vec<_> = xs.iter().map(|&x| Point3::new(x, 0.0, 0.0)).collect();
        let order = geodesic_order(&points).unwrap();
        let ordered: Vec<f64> = order.iter().map(|&i| xs[i]).collect();
        assert_eq!(ordered, [0.9, 0.75, 0.6, 0.5, 0.42, 0.3, 0.1]);
    }

    #[test]
    fn duplicates_stall() {
        let points = [Point3::new(0.5, 0.0, 0.0); 3];
        assert_eq!(
            geodesic_order(&points),
            Err(Error::OrderingStall {
                visited: 1,
                total: 3
            })
        );
    }

    #[test]
    fn ordering_is_a_permutation() {
        proptest!(|(coords in prop::collection::vec((-1.0..1.0f64, -1.0..1.0f64, -1.0..1.0f64), 1..40))| {
            let points: Vec<_> = coords.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect();
            if let Ok(order) = geodesic_order(&points) {
                prop_assert!(is_permutation(&order, points.len()));
            }
        });
    }
}
