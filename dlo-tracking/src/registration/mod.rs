//! Probabilistic non-rigid registration of ordered nodes to an unordered point cloud.
//!
//! Both registrations treat the nodes as centroids of an isotropic gaussian mixture with a shared
//! variance `sigma2`, plus a uniform outlier component weighted by `mu`. The E step computes the
//! posterior responsibility of every node for every observed point:
//!
//! ```text
//!             exp(-|y_m - x_n|^2 / 2 sigma2)
//! P(m, n) = ---------------------------------------------------------------------
//!           sum_k exp(-|y_k - x_n|^2 / 2 sigma2) + (2 pi sigma2)^(3/2) mu/(1-mu) M/N
//! ```
//!
//! They differ in the M step. [`CoherentRegistration`] moves each node to the weighted centroid
//! of the points, with no coupling between nodes. [`LleRegistration`] deforms a prior shape with a
//! smooth displacement field and penalizes changes to its local linear structure.

mod cpd;
mod lle;

pub use cpd::*;
pub use lle::*;

use dlo_core::{
    nalgebra::{DMatrix, Point3},
    Error, PointCloud, Result,
};

/// Lower bound applied to the mixture variance so that the kernel stays well defined.
pub const SIGMA2_FLOOR: f64 = 1e-10;

/// Dimensionality of the registered points.
const D: f64 = 3.0;

/// The outcome of a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// The registered nodes, in the same order as the seed or prior.
    pub nodes: Vec<Point3<f64>>,
    /// The final mixture variance. Small values mean the nodes fit the cloud tightly.
    pub sigma2: f64,
    /// The number of EM iterations that ran.
    pub iterations: usize,
}

pub(crate) fn floor_sigma2(sigma2: f64) -> f64 {
    if sigma2.is_finite() && sigma2 > SIGMA2_FLOOR {
        sigma2
    } else {
        SIGMA2_FLOOR
    }
}

pub(crate) fn check_inputs(cloud: &PointCloud, num_nodes: usize, mu: f64) -> Result<()> {
    if cloud.is_empty() {
        return Err(Error::InvalidInput("point cloud is empty".into()));
    }
    if num_nodes == 0 {
        return Err(Error::InvalidInput("node count must be positive".into()));
    }
    if !(0.0..1.0).contains(&mu) {
        return Err(Error::InvalidInput(format!(
            "outlier weight must lie in [0, 1), got {}",
            mu
        )));
    }
    Ok(())
}

/// The `M x N` matrix of squared distances between every node and every point.
pub(crate) fn squared_distance_matrix(
    nodes: &[Point3<f64>],
    points: &[Point3<f64>],
) -> DMatrix<f64> {
    DMatrix::from_fn(nodes.len(), points.len(), |m, n| {
        (nodes[m] - points[n]).norm_squared()
    })
}

/// The initial variance: the mean squared node-to-point distance divided by the dimensionality.
pub(crate) fn initial_sigma2(distances: &DMatrix<f64>) -> f64 {
    floor_sigma2(distances.sum() / (D * distances.len() as f64))
}

/// The `N x 3` matrix whose rows are the points.
pub(crate) fn point_matrix(points: &[Point3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), 3, |n, k| points[n][k])
}

/// The E step: posterior responsibilities of each node (rows) for each point (columns).
pub(crate) fn responsibilities(distances: &DMatrix<f64>, sigma2: f64, mu: f64) -> DMatrix<f64> {
    let (m, n) = distances.shape();
    let outlier = (2.0 * core::f64::consts::PI * sigma2).powf(D / 2.0) * mu / (1.0 - mu)
        * m as f64
        / n as f64;

    let mut p = distances.map(|d| (-d / (2.0 * sigma2)).exp());
    for mut column in p.column_iter_mut() {
        let mut denominator = column.sum();
        if denominator == 0.0 {
            denominator = f64::EPSILON;
        }
        column /= denominator + outlier;
    }
    p
}

/// Per node, the total responsibility mass (`P 1`).
pub(crate) fn node_mass(p: &DMatrix<f64>) -> Vec<f64> {
    p.row_iter().map(|row| row.sum()).collect()
}
