//! Frame to frame tracking of deformable linear objects.
//!
//! Each frame brings an unordered [`PointCloud`](dlo_core::PointCloud) sampled from the surface
//! or centerline of the tracked objects. The tracker keeps an ordered node chain and updates it
//! per frame in two steps:
//!
//! 1. Registration deforms the previous nodes onto the new cloud, with either
//!    [`CoherentRegistration`] or [`LleRegistration`].
//! 2. The [`SelfIntersectionResolver`] pushes apart edges that registration pulled through each
//!    other, by solving a quadratic program with any [`QpSolver`](dlo_optimize::QpSolver).
//!
//! Registration never reorders nodes. Ordering is only needed once, when the session is
//! initialized from a seed line, and is done by [`geodesic_order`].
//!
//! [`DloTracker`] ties the steps together and owns the solver and the state carried between
//! frames, configured by [`TrackerSettings`].

mod ordering;
mod registration;
mod self_intersection;
mod settings;
mod tracker;

pub use ordering::*;
pub use registration::*;
pub use self_intersection::*;
pub use settings::*;
pub use tracker::*;
