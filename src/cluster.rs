use crate::DistanceMeasure;
use crate::PointND;
use itertools::Itertools as _;
use std::fmt;

/// A refinable centroid.
///
/// Between two refinement passes, [`center`](Cluster::center) is the only
/// authoritative value.  During a pass, points are accumulated into the
/// running sum and point count, which are then consumed to move the center.
/// The accumulators of the last pass are kept for inspection, e.g. through
/// [`num_points`](Cluster::num_points) and [`std`](Cluster::std).
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster<const D: usize> {
    id: usize,
    center: PointND<D>,
    previous_center: PointND<D>,
    running_sum: PointND<D>,
    num_points: usize,
    squared_distance_total: f64,
}

impl<const D: usize> Cluster<D> {
    pub fn new(id: usize, center: PointND<D>) -> Self {
        Self {
            id,
            center,
            previous_center: center,
            running_sum: PointND::zeros(),
            num_points: 0,
            squared_distance_total: 0.0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn center(&self) -> &PointND<D> {
        &self.center
    }

    /// The center before the last update, or the current center if it has
    /// never been updated.
    pub fn previous_center(&self) -> &PointND<D> {
        &self.previous_center
    }

    pub fn running_sum(&self) -> &PointND<D> {
        &self.running_sum
    }

    /// Number of points assigned to this cluster during the last pass.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Spread of the points of the last pass around the center, measured with
    /// the distance measure of that pass.
    ///
    /// This is the root mean square of the point-to-center distances, or zero
    /// if the cluster is empty.  [`add_point`](Cluster::add_point) measures
    /// against the current center, so after
    /// [`recompute_center`](Cluster::recompute_center) the value is stale
    /// until the refinement loop measures it again.  It is informational only and never takes part
    /// in assignment or convergence.
    pub fn std(&self) -> f64 {
        if self.num_points == 0 {
            return 0.0;
        }
        f64::sqrt(self.squared_distance_total / self.num_points as f64)
    }

    /// Add a point to the accumulators, without moving the center.
    pub fn add_point<M>(&mut self, point: &PointND<D>, measure: &M)
    where
        M: DistanceMeasure<D>,
    {
        let distance = measure.distance(&self.center, point);
        self.absorb(Accumulator {
            sum: *point,
            count: 1,
            squared_distance_total: distance * distance,
        });
    }

    /// The center this cluster would move to if updated now.
    ///
    /// A cluster that received no point stays where it is.
    pub fn pending_center(&self) -> PointND<D> {
        if self.num_points == 0 {
            self.center
        } else {
            self.running_sum / self.num_points as f64
        }
    }

    /// Whether updating the center would move it by at most `epsilon`.
    pub fn compute_convergence<M>(&self, measure: &M, epsilon: f64) -> bool
    where
        M: DistanceMeasure<D>,
    {
        measure.distance(&self.pending_center(), &self.center) <= epsilon
    }

    /// Move the center to the mean of the accumulated points, remembering the
    /// old one.
    pub fn recompute_center(&mut self) {
        self.previous_center = self.center;
        self.center = self.pending_center();
    }

    /// Empty the accumulators.
    pub fn reset(&mut self) {
        self.running_sum = PointND::zeros();
        self.num_points = 0;
        self.squared_distance_total = 0.0;
    }

    /// A copy of this cluster with the same id and center and fresh
    /// accumulators, to be refined as the next generation.
    pub fn next_generation(&self) -> Self {
        Self::new(self.id, self.center)
    }

    pub(crate) fn set_squared_distance_total(&mut self, total: f64) {
        self.squared_distance_total = total;
    }

    pub(crate) fn absorb(&mut self, acc: Accumulator<D>) {
        self.running_sum += acc.sum;
        self.num_points += acc.count;
        self.squared_distance_total += acc.squared_distance_total;
    }
}

impl<const D: usize> fmt::Display for Cluster<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CL-{}: [{}] n={} std={}",
            self.id,
            self.center.iter().join(", "),
            self.num_points,
            self.std(),
        )
    }
}

/// Partial sums of one assignment pass.
///
/// Merging is a plain sum, so the result does not depend on how points were
/// split among threads.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Accumulator<const D: usize> {
    sum: PointND<D>,
    count: usize,
    squared_distance_total: f64,
}

impl<const D: usize> Accumulator<D> {
    pub fn new() -> Self {
        Self {
            sum: PointND::zeros(),
            count: 0,
            squared_distance_total: 0.0,
        }
    }

    pub fn add(&mut self, point: &PointND<D>, distance: f64) {
        self.sum += point;
        self.count += 1;
        self.squared_distance_total += distance * distance;
    }

    pub fn merge(&mut self, other: &Self) {
        self.sum += other.sum;
        self.count += other.count;
        self.squared_distance_total += other.squared_distance_total;
    }
}

/// Index of and distance to the center closest to `point`.
///
/// Ties go to the first center.  Returns `None` if `centers` is empty.
pub(crate) fn nearest<'a, M, const D: usize>(
    centers: impl IntoIterator<Item = &'a PointND<D>>,
    point: &PointND<D>,
    measure: &M,
) -> Option<(usize, f64)>
where
    M: DistanceMeasure<D>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, center) in centers.into_iter().enumerate() {
        let distance = measure.distance(center, point);
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best
}
