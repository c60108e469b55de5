use super::{
    check_inputs, floor_sigma2, initial_sigma2, node_mass, point_matrix, responsibilities,
    squared_distance_matrix, Registration, D, SIGMA2_FLOOR,
};
use dlo_core::{nalgebra::Point3, Error, PointCloud, Result};
use dlo_geom::squared_distance_sum;
use log::*;

/// Gaussian mixture EM registration of `M` nodes to a point cloud.
///
/// Every iteration recomputes the responsibilities, moves each node to the responsibility
/// weighted centroid of the cloud and re-estimates the variance. By default the loop runs for a
/// fixed number of iterations so that the runtime per frame is predictable. A convergence
/// tolerance can be set to stop early.
///
/// ```
/// use dlo_core::{nalgebra::Point3, PointCloud};
/// use dlo_tracking::CoherentRegistration;
///
/// let cloud: PointCloud = (0..50)
///     .map(|i| Point3::new(0.0, 0.01 * i as f64, 0.5))
///     .collect();
/// let registration = CoherentRegistration::new()
///     .max_iterations(50)
///     .register(&cloud, 10)
///     .unwrap();
/// assert_eq!(registration.nodes.len(), 10);
/// assert!(registration.sigma2 > 0.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoherentRegistration {
    mu: f64,
    max_iterations: usize,
    tolerance: Option<f64>,
    seed_length: f64,
}

impl CoherentRegistration {
    /// Creates a `CoherentRegistration` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the weight of the uniform outlier component, in `[0, 1)`.
    ///
    /// Default is `0.05`.
    #[must_use]
    pub fn mu(self, mu: f64) -> Self {
        Self { mu, ..self }
    }

    /// Set the number of EM iterations.
    ///
    /// Default is `100`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Stop early once the summed squared node displacement of an iteration drops below
    /// `tolerance`.
    ///
    /// Default is `None`, which always runs every iteration.
    #[must_use]
    pub fn tolerance(self, tolerance: Option<f64>) -> Self {
        Self { tolerance, ..self }
    }

    /// Set the length of the straight line along `+y` on which nodes are seeded when no prior
    /// is available.
    ///
    /// Default is `0.1`.
    #[must_use]
    pub fn seed_length(self, seed_length: f64) -> Self {
        Self {
            seed_length,
            ..self
        }
    }

    /// The nodes that [`CoherentRegistration::register`] starts from.
    pub fn seed(&self, num_nodes: usize) -> Vec<Point3<f64>> {
        let spacing = self.seed_length / num_nodes as f64;
        (0..num_nodes)
            .map(|i| Point3::new(0.0, spacing * i as f64, 0.0))
            .collect()
    }

    /// Registers `num_nodes` nodes seeded along a short straight line.
    ///
    /// The output nodes are not ordered along the observed object; see
    /// [`geodesic_order`](crate::geodesic_order).
    pub fn register(&self, cloud: &PointCloud, num_nodes: usize) -> Result<Registration> {
        check_inputs(cloud, num_nodes, self.mu)?;
        self.run(cloud, self.seed(num_nodes), None)
    }

    /// Registers starting from `prior` nodes, such as the previous frame's shape.
    ///
    /// If `sigma2` is `None` the variance is initialized from the distances between the prior
    /// and the cloud, otherwise the given variance is reused.
    pub fn register_from(
        &self,
        cloud: &PointCloud,
        prior: &[Point3<f64>],
        sigma2: Option<f64>,
    ) -> Result<Registration> {
        check_inputs(cloud, prior.len(), self.mu)?;
        self.run(cloud, prior.to_vec(), sigma2)
    }

    fn run(
        &self,
        cloud: &PointCloud,
        mut nodes: Vec<Point3<f64>>,
        sigma2: Option<f64>,
    ) -> Result<Registration> {
        let points = cloud.points();
        let x = point_matrix(points);

        let mut distances = squared_distance_matrix(&nodes, points);
        let mut sigma2 = match sigma2 {
            Some(sigma2) => floor_sigma2(sigma2),
            None => initial_sigma2(&distances),
        };

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            if iterations > 1 {
                distances = squared_distance_matrix(&nodes, points);
            }

            let p = responsibilities(&distances, sigma2, self.mu);
            let mass = node_mass(&p);
            let px = &p * &x;

            let updated: Vec<Point3<f64>> = nodes
                .iter()
                .enumerate()
                .map(|(m, previous)| {
                    if mass[m] > 0.0 {
                        Point3::new(px[(m, 0)], px[(m, 1)], px[(m, 2)]) / mass[m]
                    } else {
                        // No point claims this node, so it has nowhere to move.
                        *previous
                    }
                })
                .collect();

            let total_mass: f64 = mass.iter().sum();
            let weighted_residual = p.component_mul(&distances).sum();
            sigma2 = if total_mass > 0.0 {
                floor_sigma2(weighted_residual / (D * total_mass))
            } else {
                SIGMA2_FLOOR
            };

            if updated.iter().any(|node| !node.coords.iter().all(|v| v.is_finite())) {
                return Err(Error::NumericDegeneracy(format!(
                    "registration produced non-finite nodes on iteration {}",
                    iterations
                )));
            }

            let displacement = squared_distance_sum(&nodes, &updated)?;
            nodes = updated;
            trace!(
                "registration iteration {} sigma2 {} displacement {}",
                iterations,
                sigma2,
                displacement
            );

            if self.tolerance.map_or(false, |tolerance| displacement < tolerance) {
                break;
            }
        }

        debug!(
            "registered {} nodes to {} points in {} iterations, sigma2 {}",
            nodes.len(),
            points.len(),
            iterations,
            sigma2
        );
        Ok(Registration {
            nodes,
            sigma2,
            iterations,
        })
    }
}

impl Default for CoherentRegistration {
    fn default() -> Self {
        Self {
            mu: 0.05,
            max_iterations: 100,
            tolerance: None,
            seed_length: 0.1,
        }
    }
}
