use crate::{CoherentRegistration, LleRegistration, SelfIntersectionResolver};
use dlo_core::{Error, Result};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Which registration deforms the previous shape onto each new frame.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegistrationMethod {
    /// Gaussian mixture EM without coupling between nodes.
    Coherent,
    /// Coherent point drift regularized by the local linear structure of the previous shape.
    Lle,
}

/// The settings for a tracking session.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackerSettings {
    /// The total number of tracked nodes
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_num_nodes"))]
    pub num_nodes: usize,
    /// The number of nodes of each DLO; `num_nodes` must be a multiple of it
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_nodes_per_dlo"))]
    pub nodes_per_dlo: usize,
    /// The weight of the uniform outlier component in registration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_mu"))]
    pub mu: f64,
    /// The length of the straight line the nodes are seeded on before initialization
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_seed_length"))]
    pub seed_length: f64,
    /// The EM iterations used to initialize from the seed line
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_initialization_iterations")
    )]
    pub initialization_iterations: usize,
    /// The registration used on every tracked frame
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_registration"))]
    pub registration: RegistrationMethod,
    /// The EM iterations per tracked frame
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_max_iterations"))]
    pub max_iterations: usize,
    /// Stop registration once nodes move less than this (summed squared displacement)
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub tolerance: Option<f64>,
    /// Start each frame's registration from the previous frame's variance
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub reuse_sigma2: bool,
    /// The width of the motion coherence kernel of LLE registration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_beta"))]
    pub beta: f64,
    /// The weight of the displacement penalty of LLE registration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_alpha"))]
    pub alpha: f64,
    /// The weight of the local structure penalty of LLE registration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_gamma"))]
    pub gamma: f64,
    /// The number of chain neighbours each node is reconstructed from in LLE registration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_lle_neighbors"))]
    pub lle_neighbors: usize,
    /// The clearance kept between non-adjacent edges
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_dlo_diameter"))]
    pub dlo_diameter: f64,
    /// Edge pairs farther apart than this are not checked for self intersection
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_check_distance"))]
    pub check_distance: f64,
    /// Whether previous closest points are restricted to the edges
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_clamp"))]
    pub clamp: bool,
    /// A node is visible if an observed point lies within this distance; `None` reports no set
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub visibility_threshold: Option<f64>,
}

impl TrackerSettings {
    /// Checks the node layout and the parameters shared by every registration.
    pub fn validate(&self) -> Result<()> {
        if self.num_nodes == 0 || self.nodes_per_dlo == 0 {
            return Err(Error::InvalidInput("node counts must be positive".into()));
        }
        if self.num_nodes % self.nodes_per_dlo != 0 {
            return Err(Error::InvalidInput(format!(
                "{} nodes do not split into DLOs of {} nodes",
                self.num_nodes, self.nodes_per_dlo
            )));
        }
        if !(0.0..1.0).contains(&self.mu) {
            return Err(Error::InvalidInput(format!(
                "outlier weight must lie in [0, 1), got {}",
                self.mu
            )));
        }
        if self.dlo_diameter < 0.0 || self.check_distance < 0.0 {
            return Err(Error::InvalidInput(
                "self intersection distances must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// The registration used by [`DloTracker::initialize`](crate::DloTracker::initialize).
    pub fn initial_registration(&self) -> CoherentRegistration {
        CoherentRegistration::new()
            .mu(self.mu)
            .max_iterations(self.initialization_iterations)
            .seed_length(self.seed_length)
    }

    /// The plain EM registration used on tracked frames.
    pub fn coherent_registration(&self) -> CoherentRegistration {
        CoherentRegistration::new()
            .mu(self.mu)
            .max_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .seed_length(self.seed_length)
    }

    /// The LLE regularized registration used on tracked frames.
    ///
    /// Without a tolerance every iteration runs.
    pub fn lle_registration(&self) -> LleRegistration {
        LleRegistration::new()
            .mu(self.mu)
            .max_iterations(self.max_iterations)
            .tolerance(self.tolerance.unwrap_or(0.0))
            .beta(self.beta)
            .alpha(self.alpha)
            .gamma(self.gamma)
            .neighbors(self.lle_neighbors)
    }

    pub fn resolver(&self) -> SelfIntersectionResolver {
        SelfIntersectionResolver::new()
            .dlo_diameter(self.dlo_diameter)
            .check_distance(self.check_distance)
            .clamp(self.clamp)
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            num_nodes: default_num_nodes(),
            nodes_per_dlo: default_nodes_per_dlo(),
            mu: default_mu(),
            seed_length: default_seed_length(),
            initialization_iterations: default_initialization_iterations(),
            registration: default_registration(),
            max_iterations: default_max_iterations(),
            tolerance: None,
            reuse_sigma2: false,
            beta: default_beta(),
            alpha: default_alpha(),
            gamma: default_gamma(),
            lle_neighbors: default_lle_neighbors(),
            dlo_diameter: default_dlo_diameter(),
            check_distance: default_check_distance(),
            clamp: default_clamp(),
            visibility_threshold: None,
        }
    }
}

fn default_num_nodes() -> usize {
    35
}

fn default_nodes_per_dlo() -> usize {
    35
}

fn default_mu() -> f64 {
    0.05
}

fn default_seed_length() -> f64 {
    0.1
}

fn default_initialization_iterations() -> usize {
    100
}

fn default_registration() -> RegistrationMethod {
    RegistrationMethod::Coherent
}

fn default_max_iterations() -> usize {
    30
}

fn default_beta() -> f64 {
    2.0
}

fn default_alpha() -> f64 {
    1.0
}

fn default_gamma() -> f64 {
    3.0
}

fn default_lle_neighbors() -> usize {
    6
}

fn default_dlo_diameter() -> f64 {
    0.015
}

fn default_check_distance() -> f64 {
    0.04
}

fn default_clamp() -> bool {
    true
}
