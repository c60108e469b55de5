use dlo_core::{nalgebra::Point3, Error, Result};

fn check_shapes(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "point sets must have the same number of rows, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// The squared euclidean distance between each pair of corresponding rows.
pub fn squared_distances(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<Vec<f64>> {
    check_shapes(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(a, b)| (a - b).norm_squared())
        .collect())
}

/// The euclidean distance between each pair of corresponding rows.
pub fn distances(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<Vec<f64>> {
    check_shapes(a, b)?;
    Ok(a.iter().zip(b).map(|(a, b)| (a - b).norm()).collect())
}

/// Sum over rows of the squared euclidean distance between `a` and `b`.
///
/// This is zero exactly when both sets are identical.
///
/// ```
/// use dlo_core::nalgebra::Point3;
/// use dlo_geom::squared_distance_sum;
///
/// let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
/// let b = [Point3::new(0.0, 2.0, 0.0), Point3::new(1.0, 0.0, 3.0)];
/// assert_eq!(squared_distance_sum(&a, &b).unwrap(), 13.0);
/// ```
pub fn squared_distance_sum(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<f64> {
    Ok(squared_distances(a, b)?.into_iter().sum())
}

/// Sum over rows of the euclidean distance between `a` and `b`.
///
/// Note that this is not the square root of [`squared_distance_sum`].
pub fn distance_sum(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<f64> {
    Ok(distances(a, b)?.into_iter().sum())
}
