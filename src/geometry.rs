//! Fixed-dimension point types.

use nalgebra::SVector;

/// A point in a `D`-dimensional space.
///
/// The dimension is part of the type, so arithmetic between points can never
/// change it.
pub type PointND<const D: usize> = SVector<f64, D>;
pub type Point2D = PointND<2>;
pub type Point3D = PointND<3>;

/// Arithmetic mean of a set of points.
///
/// Returns `None` if `points` is empty.
///
/// # Example
///
/// ```rust
/// use canopy::Point2D;
///
/// let points = [Point2D::new(0.0, 0.0), Point2D::new(2.0, 4.0)];
/// assert_eq!(canopy::centroid(&points), Some(Point2D::new(1.0, 2.0)));
/// ```
pub fn centroid<const D: usize>(points: &[PointND<D>]) -> Option<PointND<D>> {
    if points.is_empty() {
        return None;
    }
    let total: PointND<D> = points.iter().sum();
    Some(total / points.len() as f64)
}
