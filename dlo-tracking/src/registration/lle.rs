use super::{
    check_inputs, floor_sigma2, initial_sigma2, node_mass, point_matrix, responsibilities,
    squared_distance_matrix, Registration, D, SIGMA2_FLOOR,
};
use dlo_core::{
    nalgebra::{DMatrix, DVector, Point3},
    Error, PointCloud, Result,
};
use dlo_geom::squared_distance_sum;
use log::*;

/// Ridge added to every local Gram matrix before solving for reconstruction weights.
///
/// The Gram matrix of `k` neighbour offsets in 3D has rank at most 3.
pub const LLE_REGULARIZATION: f64 = 1e-5;

/// Coherent point drift of an ordered prior shape, regularized by locally linear embedding.
///
/// The prior `Y0` is deformed by a displacement field `G W`, where `G` is a gaussian kernel of
/// width `beta` over the prior nodes. The field is penalized for its norm (`alpha`) and for how
/// much it breaks the reconstruction of each node from its chain neighbours (`gamma`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LleRegistration {
    beta: f64,
    alpha: f64,
    gamma: f64,
    neighbors: usize,
    mu: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl LleRegistration {
    /// Creates a `LleRegistration` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Width of the motion coherence kernel.
    ///
    /// Default is `2.0`.
    #[must_use]
    pub fn beta(self, beta: f64) -> Self {
        Self { beta, ..self }
    }

    /// Weight of the displacement field norm penalty.
    ///
    /// Default is `1.0`.
    #[must_use]
    pub fn alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    /// Weight of the local linear structure penalty.
    ///
    /// Default is `3.0`.
    #[must_use]
    pub fn gamma(self, gamma: f64) -> Self {
        Self { gamma, ..self }
    }

    /// Number of chain neighbours each node is reconstructed from.
    ///
    /// Default is `6`.
    #[must_use]
    pub fn neighbors(self, neighbors: usize) -> Self {
        Self { neighbors, ..self }
    }

    /// Weight of the uniform outlier component, in `[0, 1)`.
    ///
    /// Default is `0.05`.
    #[must_use]
    pub fn mu(self, mu: f64) -> Self {
        Self { mu, ..self }
    }

    /// Default is `30`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Stop once the summed squared node displacement of an iteration drops below this.
    ///
    /// Default is `1e-5`.
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Deforms `prior` onto `cloud`.
    ///
    /// If `sigma2` is `None` the variance is initialized from the distances between the prior
    /// and the cloud.
    pub fn register_from(
        &self,
        cloud: &PointCloud,
        prior: &[Point3<f64>],
        sigma2: Option<f64>,
    ) -> Result<Registration> {
        check_inputs(cloud, prior.len(), self.mu)?;
        if !(self.beta > 0.0) {
            return Err(Error::InvalidInput(format!(
                "kernel width must be positive, got {}",
                self.beta
            )));
        }
        if self.alpha < 0.0 || self.gamma < 0.0 {
            return Err(Error::InvalidInput(
                "regularization weights must be non-negative".into(),
            ));
        }

        let points = cloud.points();
        let m = prior.len();
        let x = point_matrix(points);
        let y0 = point_matrix(prior);

        let kernel = coherence_kernel(prior, self.beta);
        let weights = lle_weights(prior, self.neighbors)?;
        let deviation = DMatrix::identity(m, m) - weights;
        let structure = deviation.transpose() * deviation;
        let structure_kernel = &structure * &kernel;

        let mut nodes = prior.to_vec();
        let mut sigma2 = match sigma2 {
            Some(sigma2) => floor_sigma2(sigma2),
            None => initial_sigma2(&squared_distance_matrix(prior, points)),
        };

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;

            let distances = squared_distance_matrix(&nodes, points);
            let p = responsibilities(&distances, sigma2, self.mu);
            let p1 = DVector::from_vec(node_mass(&p));
            let pt1: Vec<f64> = p.column_iter().map(|column| column.sum()).collect();
            let np: f64 = p1.sum();
            let px = &p * &x;

            let mass = DMatrix::from_diagonal(&p1);
            let a = &mass * &kernel
                + DMatrix::identity(m, m) * (self.alpha * sigma2)
                + &structure_kernel * (sigma2 * self.gamma);
            let b = &px - (&mass + &structure * (sigma2 * self.gamma)) * &y0;
            let w = a.lu().solve(&b).ok_or_else(|| {
                Error::NumericDegeneracy(format!(
                    "deformation system is singular on iteration {}",
                    iterations
                ))
            })?;
            let t = &y0 + &kernel * w;

            let observed: f64 = points
                .iter()
                .zip(&pt1)
                .map(|(point, weight)| weight * point.coords.norm_squared())
                .sum();
            let cross = px.component_mul(&t).sum();
            let fitted: f64 = t
                .row_iter()
                .zip(p1.iter())
                .map(|(row, weight)| weight * row.norm_squared())
                .sum();
            sigma2 = if np > 0.0 {
                floor_sigma2((observed - 2.0 * cross + fitted) / (D * np))
            } else {
                SIGMA2_FLOOR
            };

            let updated: Vec<Point3<f64>> = t
                .row_iter()
                .map(|row| Point3::new(row[0], row[1], row[2]))
                .collect();
            if updated.iter().any(|node| !node.coords.iter().all(|v| v.is_finite())) {
                return Err(Error::NumericDegeneracy(format!(
                    "deformation produced non-finite nodes on iteration {}",
                    iterations
                )));
            }

            let displacement = squared_distance_sum(&nodes, &updated)?;
            nodes = updated;
            trace!(
                "lle registration iteration {} sigma2 {} displacement {}",
                iterations,
                sigma2,
                displacement
            );
            if displacement < self.tolerance {
                break;
            }
        }

        debug!(
            "deformed {} nodes onto {} points in {} iterations, sigma2 {}",
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

impl Default for LleRegistration {
    fn default() -> Self {
        Self {
            beta: 2.0,
            alpha: 1.0,
            gamma: 3.0,
            neighbors: 6,
            mu: 0.05,
            max_iterations: 30,
            tolerance: 1e-5,
        }
    }
}

/// `G(i, j) = exp(-|y_i - y_j|^2 / (2 beta^2))`.
fn coherence_kernel(nodes: &[Point3<f64>], beta: f64) -> DMatrix<f64> {
    let width = 2.0 * beta * beta;
    DMatrix::from_fn(nodes.len(), nodes.len(), |i, j| {
        (-(nodes[i] - nodes[j]).norm_squared() / width).exp()
    })
}

/// The chain neighbours of node `i` out of `m`: up to `k / 2` on each side, borrowing from the
/// other side near the ends of the chain.
fn chain_neighbors(i: usize, m: usize, k: usize) -> impl Iterator<Item = usize> {
    let k = k.min(m.saturating_sub(1));
    let after = m - 1 - i;
    let mut left = (k / 2).min(i);
    let right = (k - left).min(after);
    left = (k - right).min(i);
    (i - left..i).chain(i + 1..=i + right)
}

/// Row `i` holds the affine weights that best reconstruct node `i` from its chain neighbours.
///
/// Neighbours are taken along the chain rather than by spatial nearest neighbours, so strands
/// that pass close to each other never share reconstruction weights.
pub(crate) fn lle_weights(nodes: &[Point3<f64>], k: usize) -> Result<DMatrix<f64>> {
    let m = nodes.len();
    let mut weights = DMatrix::zeros(m, m);
    for i in 0..m {
        let neighbors: Vec<usize> = chain_neighbors(i, m, k).collect();
        if neighbors.is_empty() {
            continue;
        }
        let count = neighbors.len();
        let offsets: Vec<_> = neighbors.iter().map(|&j| nodes[i] - nodes[j]).collect();
        let gram = DMatrix::from_fn(count, count, |a, b| offsets[a].dot(&offsets[b]))
            + DMatrix::identity(count, count) * LLE_REGULARIZATION;
        let ones = DVector::repeat(count, 1.0);
        let raw = match gram.clone().cholesky() {
            Some(cholesky) => Some(cholesky.solve(&ones)),
            None => gram.lu().solve(&ones),
        }
        .ok_or_else(|| {
            Error::NumericDegeneracy(format!("local gram matrix of node {} is singular", i))
        })?;
        let total = raw.sum();
        if !total.is_normal() {
            return Err(Error::NumericDegeneracy(format!(
                "reconstruction weights of node {} do not normalize",
                i
            )));
        }
        for (&j, w) in neighbors.iter().zip(raw.iter()) {
            weights[(i, j)] = w / total;
        }
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: usize, spacing: f64) -> Vec<Point3<f64>> {
        (0..count)
            .map(|i| Point3::new(spacing * i as f64, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn neighbours_borrow_at_the_ends() {
        assert_eq!(chain_neighbors(0, 10, 6).collect::<Vec<_>>(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(chain_neighbors(5, 10, 6).collect::<Vec<_>>(), [2, 3, 4, 6, 7, 8]);
        assert_eq!(chain_neighbors(9, 10, 6).collect::<Vec<_>>(), [3, 4, 5, 6, 7, 8]);
        assert_eq!(chain_neighbors(1, 3, 6).collect::<Vec<_>>(), [0, 2]);
        assert_eq!(chain_neighbors(0, 1, 6).count(), 0);
    }

    #[test]
    fn weights_are_affine() {
        let nodes: Vec<_> = (0..12)
            .map(|i| {
                let t = i as f64 * 0.3;
                Point3::new(t.cos(), t.sin(), 0.1 * t)
            })
            .collect();
        let weights = lle_weights(&nodes, 6).unwrap();
        for (i, row) in weights.row_iter().enumerate() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert_eq!(row[i], 0.0);
        }
    }

    #[test]
    fn symmetric_interior_node_is_reconstructed() {
        let nodes = line(10, 0.05);
        let weights = lle_weights(&nodes, 4).unwrap();
        let reconstruction: Point3<f64> = (0..10)
            .map(|j| nodes[j].coords * weights[(5, j)])
            .sum::<dlo_core::nalgebra::Vector3<f64>>()
            .into();
        assert!((reconstruction - nodes[5]).norm() < 1e-9);
    }

    #[test]
    fn translated_cloud_pulls_the_prior_along() {
        let prior = line(10, 0.05);
        let cloud: PointCloud = (0..90)
            .map(|i| Point3::new(0.005 * i as f64, 0.0, 0.02))
            .collect();
        let registration = LleRegistration::new()
            .mu(0.0)
            .tolerance(0.0)
            .max_iterations(50)
            .register_from(&cloud, &prior, None)
            .unwrap();
        let mean_z =
            registration.nodes.iter().map(|node| node.z).sum::<f64>() / prior.len() as f64;
        assert!((mean_z - 0.02).abs() < 5e-3, "mean z {}", mean_z);
        assert_eq!(registration.iterations, 50);
    }

    #[test]
    fn rejects_bad_kernel_width() {
        let cloud = PointCloud::from_rows(&[[0.0, 0.0, 0.0]]);
        let prior = line(3, 0.1);
        assert!(matches!(
            LleRegistration::new().beta(0.0).register_from(&cloud, &prior, None),
            Err(Error::InvalidInput(_))
        ));
    }
}
