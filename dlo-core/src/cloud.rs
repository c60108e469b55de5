use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An unordered set of 3d points observed in a single frame.
///
/// Points have no identity across frames. The cloud is assumed to already be segmented so that
/// (apart from outliers) it only contains points on the DLO surface.
#[derive(Debug, Clone, Default, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PointCloud(pub Vec<Point3<f64>>);

impl PointCloud {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self(points)
    }

    /// Builds a cloud from `[x, y, z]` rows.
    pub fn from_rows(rows: &[[f64; 3]]) -> Self {
        Self(rows.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect())
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.0
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
