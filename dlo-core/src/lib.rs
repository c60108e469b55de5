//! # DLO Core
//!
//! Common types shared by every crate that tracks deformable linear objects (DLOs), such as
//! cables and ropes, from unordered point clouds. The tracking pipeline is split across several
//! crates (geometry, optimization, tracking) which all speak in the types declared here:
//!
//! * [`PointCloud`], the unordered observation of one frame
//! * [`TrackedShape`], the ordered node chain(s) being tracked
//! * [`Edge`], a pair of adjacent nodes inside one DLO
//! * [`Error`], the error type of the whole pipeline
//!
//! A [`TrackedShape`] may hold several DLOs of equal node count concatenated end to end:
//!
//! ```text
//!   DLO 0                       DLO 1
//!   o---o---o---o---o           o---o---o---o---o
//!   0   1   2   3   4           5   6   7   8   9
//! ```
//!
//! Node `4` and node `5` are not joined by an edge.
//!
//! `nalgebra` is re-exported so that downstream crates agree on its version.

mod cloud;
mod error;
mod shape;

pub use cloud::*;
pub use error::*;
pub use nalgebra;
pub use shape::*;
