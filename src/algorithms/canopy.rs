//! Canopy clustering, after "Efficient Clustering of High-Dimensional Data
//! Sets with Application to Reference Matching" by Andrew McCallum, Kamal
//! Nigam and Lyle H. Ungar (2000).
//!
//! Canopies are built in a single pass over the points with two distance
//! thresholds `t1 > t2`.  A point is picked from the list and becomes the
//! center of a new canopy.  All the points within `t1` of it join the canopy,
//! and the ones within `t2` are removed from the list.  This is repeated until
//! the list is empty.
//!
//! Points that are between `t2` and `t1` away from a center stay in the list,
//! so they may join several canopies.  Canopies overlap; only the removal of
//! points is exclusive.

use super::Error;
use crate::cluster;
use crate::DistanceMeasure;
use crate::PointND;
use itertools::Itertools as _;
use std::collections::VecDeque;
use std::fmt;

/// A loosely bounded, possibly overlapping group of points.
///
/// The center of a canopy is the point that seeded it and never moves.
#[derive(Clone, Debug, PartialEq)]
pub struct Canopy<const D: usize> {
    id: usize,
    center: PointND<D>,
    point_count: usize,
    point_total: PointND<D>,
}

impl<const D: usize> Canopy<D> {
    /// A canopy seeded by `center`, which counts as its first point.
    pub fn new(id: usize, center: PointND<D>) -> Self {
        Self {
            id,
            center,
            point_count: 1,
            point_total: center,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn center(&self) -> &PointND<D> {
        &self.center
    }

    /// Number of points in the canopy, seed included.  Always at least one.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Mean of the points of the canopy.
    ///
    /// Unlike [`center`](Canopy::center), this moves as points are added.
    pub fn centroid(&self) -> PointND<D> {
        self.point_total / self.point_count as f64
    }

    pub fn add_point(&mut self, point: &PointND<D>) {
        self.point_count += 1;
        self.point_total += point;
    }

    /// Whether `point` lies strictly within `t1` of the center of the canopy.
    pub fn contains<M>(&self, point: &PointND<D>, measure: &M, t1: f64) -> bool
    where
        M: DistanceMeasure<D>,
    {
        measure.distance(&self.center, point) < t1
    }
}

impl<const D: usize> fmt::Display for Canopy<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}: [{}]", self.id, self.center.iter().join(", "))
    }
}

/// The canopy whose center is the closest to `point`.
///
/// Ties go to the canopy that comes first.  Returns `None` if `canopies` is
/// empty.
pub fn nearest_canopy<'a, M, const D: usize>(
    canopies: &'a [Canopy<D>],
    point: &PointND<D>,
    measure: &M,
) -> Option<&'a Canopy<D>>
where
    M: DistanceMeasure<D>,
{
    let centers = canopies.iter().map(Canopy::center);
    let (idx, _distance) = cluster::nearest(centers, point, measure)?;
    Some(&canopies[idx])
}

/// Single-pass canopy builder.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), canopy::Error> {
/// use canopy::Point2D;
///
/// let points = vec![
///     Point2D::new(0.0, 0.0),
///     Point2D::new(0.0, 1.0),
///     Point2D::new(10.0, 10.0),
///     Point2D::new(10.0, 11.0),
/// ];
///
/// let canopies = canopy::CanopyBuilder { t1: 3.0, t2: 1.5, measure: canopy::Manhattan }
///     .build(points)?;
///
/// assert_eq!(canopies.len(), 2);
/// assert_eq!(canopies[1].center(), &Point2D::new(10.0, 10.0));
/// assert_eq!(canopies[1].point_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CanopyBuilder<M> {
    /// Points closer than `t1` to a center join its canopy.
    pub t1: f64,
    /// Points closer than `t2` to a center cannot seed nor join any later
    /// canopy.
    pub t2: f64,
    pub measure: M,
}

impl<M> Default for CanopyBuilder<M>
where
    M: Default,
{
    fn default() -> Self {
        Self {
            t1: 3.0,
            t2: 1.5,
            measure: M::default(),
        }
    }
}

impl<M> CanopyBuilder<M> {
    /// Check that `t1 > t2 >= 0`.
    pub fn check_thresholds(&self) -> Result<(), Error> {
        if self.t2 >= 0.0 && self.t1 > self.t2 {
            Ok(())
        } else {
            Err(Error::InvalidThresholds {
                t1: self.t1,
                t2: self.t2,
            })
        }
    }

    /// Group `points` into canopies.
    ///
    /// Canopies are returned in creation order, their IDs starting from zero.
    /// Points are seeded in iteration order, which makes the result
    /// deterministic.  Pass a copy of your points to keep them.
    pub fn build<I, const D: usize>(&self, points: I) -> Result<Vec<Canopy<D>>, Error>
    where
        I: IntoIterator<Item = PointND<D>>,
        M: DistanceMeasure<D>,
    {
        self.check_thresholds()?;
        let mut remaining: VecDeque<PointND<D>> = points.into_iter().collect();
        if remaining.is_empty() {
            return Err(Error::EmptyInput);
        }

        let span = tracing::info_span!("build canopies", point_count = remaining.len());
        let _enter = span.enter();

        let mut canopies = Vec::new();
        while let Some(seed) = remaining.pop_front() {
            let mut canopy = Canopy::new(canopies.len(), seed);
            remaining.retain(|point| {
                let distance = self.measure.distance(&seed, point);
                if distance < self.t1 {
                    canopy.add_point(point);
                }
                self.t2 <= distance
            });
            tracing::trace!(
                id = canopy.id(),
                point_count = canopy.point_count(),
                remaining = remaining.len(),
                "new canopy"
            );
            canopies.push(canopy);
        }

        tracing::info!(canopy_count = canopies.len(), "built canopies");
        Ok(canopies)
    }
}
