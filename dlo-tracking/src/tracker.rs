use crate::{order_points, Registration, RegistrationMethod, TrackerSettings, SIGMA2_FLOOR};
use dlo_core::{nalgebra::Point3, Edge, Error, PointCloud, Result, TrackedShape};
use dlo_optimize::QpSolver;
use float_ord::FloatOrd;
use log::*;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Whether a frame was tracked or fell back to the previous shape.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingQuality {
    Nominal,
    /// The frame could not be tracked and the previous shape was reported instead.
    Degraded(String),
}

/// The tracked state reported for one frame.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingFrame {
    /// The ordered nodes of every DLO, concatenated.
    pub nodes: Vec<Point3<f64>>,
    pub edges: Vec<Edge>,
    /// Indices of nodes with an observed point nearby, if a visibility threshold is set.
    pub visible: Option<Vec<usize>>,
    pub sigma2: f64,
    /// The number of separation constraints enforced on this frame.
    pub constraints: usize,
    pub quality: TrackingQuality,
}

impl TrackingFrame {
    pub fn is_degraded(&self) -> bool {
        matches!(self.quality, TrackingQuality::Degraded(_))
    }
}

/// A tracking session: the shape of the previous frame, and the solver used to keep it free of
/// self intersections.
///
/// Frames are tracked in order with [`DloTracker::track`]. The session must first be started
/// from an observation with [`DloTracker::initialize`] or from a known shape with
/// [`DloTracker::seed`].
pub struct DloTracker<S> {
    settings: TrackerSettings,
    solver: S,
    shape: Option<TrackedShape>,
    sigma2: Option<f64>,
}

impl<S> DloTracker<S>
where
    S: QpSolver,
{
    pub fn new(settings: TrackerSettings, solver: S) -> Self {
        Self {
            settings,
            solver,
            shape: None,
            sigma2: None,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// The shape of the last tracked frame.
    pub fn shape(&self) -> Option<&TrackedShape> {
        self.shape.as_ref()
    }

    /// The registration variance of the last tracked frame.
    pub fn sigma2(&self) -> Option<f64> {
        self.sigma2
    }

    /// Starts the session by registering a seed line to `cloud` and ordering the result.
    ///
    /// Only a single DLO can be found this way; use [`DloTracker::seed`] for several.
    ///
    /// The seed line lies along `+y`. A noise-free cloud whose points all share one `y` and `z`
    /// gives every seed node the same responsibilities, so the nodes collapse onto one point and
    /// ordering fails with [`Error::OrderingStall`].
    pub fn initialize(&mut self, cloud: &PointCloud) -> Result<TrackingFrame> {
        self.settings.validate()?;
        if self.settings.nodes_per_dlo != self.settings.num_nodes {
            return Err(Error::InvalidInput(
                "initialization finds a single DLO; seed sessions with several".into(),
            ));
        }

        let Registration { nodes, sigma2, .. } = self
            .settings
            .initial_registration()
            .register(cloud, self.settings.num_nodes)?;
        let shape = TrackedShape::new(order_points(&nodes)?, self.settings.nodes_per_dlo)?;
        info!(
            "initialized {} nodes from {} points, sigma2 {}",
            shape.len(),
            cloud.len(),
            sigma2
        );

        let frame = self.frame(&shape, cloud, sigma2, 0, TrackingQuality::Nominal);
        self.shape = Some(shape);
        self.sigma2 = Some(sigma2);
        Ok(frame)
    }

    /// Starts the session from a known shape.
    pub fn seed(&mut self, shape: TrackedShape) -> Result<()> {
        self.settings.validate()?;
        if shape.len() != self.settings.num_nodes
            || shape.nodes_per_dlo() != self.settings.nodes_per_dlo
        {
            return Err(Error::InvalidInput(format!(
                "seed has {} nodes in DLOs of {}, expected {} in DLOs of {}",
                shape.len(),
                shape.nodes_per_dlo(),
                self.settings.num_nodes,
                self.settings.nodes_per_dlo
            )));
        }
        info!("seeded {} DLOs", shape.num_of_dlos());
        self.shape = Some(shape);
        self.sigma2 = None;
        Ok(())
    }

    /// Drops the tracked shape. The next frame needs a new initialization or seed.
    pub fn reset(&mut self) {
        info!("tracking session reset");
        self.shape = None;
        self.sigma2 = None;
    }

    /// Tracks the shape into `cloud`.
    ///
    /// Recoverable failures keep the previous shape and report a degraded frame. Only invalid
    /// input is returned as an error.
    pub fn track(&mut self, cloud: &PointCloud) -> Result<TrackingFrame> {
        let previous = self.shape.take().ok_or_else(|| {
            Error::InvalidInput("tracking needs an initialized or seeded session".into())
        })?;

        let result = self.step(&previous, cloud);
        match result {
            Ok((shape, sigma2, constraints)) => {
                let frame = self.frame(&shape, cloud, sigma2, constraints, TrackingQuality::Nominal);
                self.shape = Some(shape);
                self.sigma2 = Some(sigma2);
                Ok(frame)
            }
            Err(error) if error.is_recoverable() => {
                warn!("keeping the previous shape: {}", error);
                // A seeded session has not estimated a variance yet.
                let sigma2 = self.sigma2.unwrap_or(SIGMA2_FLOOR);
                let frame = self.frame(
                    &previous,
                    cloud,
                    sigma2,
                    0,
                    TrackingQuality::Degraded(error.to_string()),
                );
                self.shape = Some(previous);
                Ok(frame)
            }
            Err(error) => {
                self.shape = Some(previous);
                Err(error)
            }
        }
    }

    fn step(
        &mut self,
        previous: &TrackedShape,
        cloud: &PointCloud,
    ) -> Result<(TrackedShape, f64, usize)> {
        let sigma2 = if self.settings.reuse_sigma2 {
            self.sigma2
        } else {
            None
        };
        let registration = match self.settings.registration {
            RegistrationMethod::Coherent => self
                .settings
                .coherent_registration()
                .register_from(cloud, previous.nodes(), sigma2)?,
            RegistrationMethod::Lle => self
                .settings
                .lle_registration()
                .register_from(cloud, previous.nodes(), sigma2)?,
        };

        let resolution =
            self.settings
                .resolver()
                .resolve(previous, &registration.nodes, &mut self.solver)?;

        let mut shape = previous.clone();
        shape.set_nodes(resolution.nodes)?;
        Ok((shape, registration.sigma2, resolution.constraints.len()))
    }

    fn frame(
        &self,
        shape: &TrackedShape,
        cloud: &PointCloud,
        sigma2: f64,
        constraints: usize,
        quality: TrackingQuality,
    ) -> TrackingFrame {
        let visible = self
            .settings
            .visibility_threshold
            .map(|threshold| visible_nodes(shape.nodes(), cloud, threshold));
        TrackingFrame {
            nodes: shape.nodes().to_vec(),
            edges: shape.edges(),
            visible,
            sigma2,
            constraints,
            quality,
        }
    }
}

/// Indices of `nodes` with at least one point of `cloud` within `threshold`.
pub fn visible_nodes(nodes: &[Point3<f64>], cloud: &PointCloud, threshold: f64) -> Vec<usize> {
    let threshold_squared = threshold * threshold;
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| {
            cloud
                .iter()
                .map(|point| FloatOrd((point - *node).norm_squared()))
                .min()
                .map_or(false, |FloatOrd(nearest)| nearest <= threshold_squared)
        })
        .map(|(i, _)| i)
        .collect()
}
