//! This crate contains the computational geometry used when tracking deformable linear objects.
//!
//! ## Distance sums
//!
//! [`squared_distance_sum`] and [`distance_sum`] compare two equally sized point sets row by
//! row. They are used as a scalar metric (for instance to test registration convergence) and,
//! through [`squared_distances`] and [`distances`], as a per-row distance field.
//!
//! ## Segments
//!
//! Nodes of a DLO are joined by straight edges. Keeping non-adjacent edges apart requires the
//! closest points between two segments, computed by [`shortest_distance_between_segments`]:
//!
//! ```text
//!        a0 o
//!            \
//!             \  pA
//!   b0 o-------x---------o b1
//!               \   pB
//!                \
//!                 o a1
//! ```
//!
//! ## Spheres
//!
//! [`line_sphere_intersection`] intersects a segment with a sphere, for instance to walk a fixed
//! arc length along a chain of nodes.

pub mod distance;
pub mod segment;
pub mod sphere;

pub use distance::*;
pub use segment::*;
pub use sphere::*;

/// Direction vectors shorter than this are treated as zero length.
pub const DEGENERATE_LENGTH: f64 = 1e-12;
