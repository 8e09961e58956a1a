//! Reference k-means refinement.
//!
//! Given a set of points and initial clusters, points are assigned to their
//! nearest cluster center, then centers are moved to the mean of their points.
//! This is repeated until no center moves by more than a tolerance, or until
//! an iteration budget is exhausted.
//!
//! Each pass works on a fresh copy of the previous clusters, called a
//! generation, so that the whole history of the refinement can be kept.

use super::Error;
use crate::cluster;
use crate::cluster::Accumulator;
use crate::Cluster;
use crate::DistanceMeasure;
use crate::PointND;
use rayon::iter::IndexedParallelIterator as _;
use rayon::iter::IntoParallelRefIterator as _;
use rayon::iter::ParallelIterator as _;

/// Default convergence tolerance.
pub const DEFAULT_EPSILON: f64 = 0.001;

/// Assignment and update steps, given at least one cluster.
fn assign_and_update<M, const D: usize>(
    points: &[PointND<D>],
    clusters: &mut [Cluster<D>],
    measure: &M,
    epsilon: f64,
) -> bool
where
    M: DistanceMeasure<D> + Sync,
{
    // Centers are frozen for the whole assignment step.
    let centers: Vec<PointND<D>> = clusters.iter().map(|c| *c.center()).collect();
    let assignments: Vec<Option<(usize, f64)>> = points
        .par_iter()
        .map(|point| cluster::nearest(&centers, point, measure))
        .collect();

    let empty = vec![Accumulator::new(); centers.len()];
    let accumulators = points
        .par_iter()
        .zip(&assignments)
        .fold(
            || empty.clone(),
            |mut acc, (point, assignment)| {
                if let Some((idx, distance)) = assignment {
                    acc[*idx].add(point, *distance);
                }
                acc
            },
        )
        .reduce(
            || empty.clone(),
            |mut acc, partial| {
                for (a, p) in acc.iter_mut().zip(&partial) {
                    a.merge(p);
                }
                acc
            },
        );

    for (cluster, acc) in clusters.iter_mut().zip(accumulators) {
        cluster.reset();
        cluster.absorb(acc);
        if cluster.num_points() == 0 {
            tracing::debug!(cluster = cluster.id(), "empty cluster keeps its center");
        }
    }

    let converged = clusters
        .iter()
        .all(|cluster| cluster.compute_convergence(measure, epsilon));
    if converged {
        return true;
    }

    for cluster in &mut *clusters {
        cluster.recompute_center();
    }

    // Measure the spread again, around the centers that moved.
    let centers: Vec<PointND<D>> = clusters.iter().map(|c| *c.center()).collect();
    let zeros = vec![0.0; centers.len()];
    let squared_distance_totals = points
        .par_iter()
        .zip(&assignments)
        .fold(
            || zeros.clone(),
            |mut totals, (point, assignment)| {
                if let Some((idx, _)) = assignment {
                    let distance = measure.distance(&centers[*idx], point);
                    totals[*idx] += distance * distance;
                }
                totals
            },
        )
        .reduce(
            || zeros.clone(),
            |mut totals, partial| {
                for (t, p) in totals.iter_mut().zip(&partial) {
                    *t += p;
                }
                totals
            },
        );
    for (cluster, total) in clusters.iter_mut().zip(squared_distance_totals) {
        cluster.set_squared_distance_total(total);
    }

    false
}

/// Run a single refinement pass over `clusters`, in place.
///
/// Every point is added to its nearest cluster (ties go to the first one).
/// Then, unless all clusters would move by at most `epsilon`, every center is
/// moved to the mean of its points.  Clusters that received no point keep
/// their center.
///
/// Accumulators are emptied before assignment, so after the call they hold
/// the points of this pass, and [`Cluster::std`] describes their spread
/// around the center the cluster ends up with.  Returns whether all clusters
/// had converged.
pub fn iterate_once<M, const D: usize>(
    points: &[PointND<D>],
    clusters: &mut [Cluster<D>],
    measure: &M,
    epsilon: f64,
) -> Result<bool, Error>
where
    M: DistanceMeasure<D> + Sync,
{
    check_epsilon(epsilon)?;
    if clusters.is_empty() && !points.is_empty() {
        return Err(Error::NoClusters);
    }
    Ok(assign_and_update(points, clusters, measure, epsilon))
}

pub(super) fn check_epsilon(epsilon: f64) -> Result<(), Error> {
    if epsilon >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidEpsilon(epsilon))
    }
}

/// The k-means refinement loop.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), canopy::Error> {
/// use canopy::Cluster;
/// use canopy::Point2D;
///
/// let points = [
///     Point2D::new(0.0, 0.0),
///     Point2D::new(0.0, 1.0),
///     Point2D::new(10.0, 10.0),
///     Point2D::new(10.0, 11.0),
/// ];
/// let seeds = vec![
///     Cluster::new(0, Point2D::new(0.0, 0.0)),
///     Cluster::new(1, Point2D::new(10.0, 10.0)),
/// ];
///
/// let refinement = canopy::KMeans { measure: canopy::Manhattan, ..Default::default() }
///     .refine(&points, seeds)?;
///
/// assert!(refinement.converged);
/// assert_eq!(refinement.last()[0].center(), &Point2D::new(0.0, 0.5));
/// assert_eq!(refinement.last()[1].center(), &Point2D::new(10.0, 10.5));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct KMeans<M> {
    pub measure: M,
    /// Maximum number of generations to produce after the seed.
    pub max_iter: usize,
    /// Clusters whose center would move by at most this distance are
    /// considered converged.
    pub epsilon: f64,
}

impl<M> Default for KMeans<M>
where
    M: Default,
{
    fn default() -> Self {
        Self {
            measure: M::default(),
            max_iter: 10,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl<M> KMeans<M> {
    /// Lazily refine `seeds`, yielding each generation as it is produced.
    ///
    /// The seed generation itself is not yielded.  Fails if `epsilon` is
    /// invalid or if there are points but no seed.
    pub fn generations<'a, const D: usize>(
        &'a self,
        points: &'a [PointND<D>],
        seeds: Vec<Cluster<D>>,
    ) -> Result<Generations<'a, M, D>, Error>
    where
        M: DistanceMeasure<D> + Sync,
    {
        check_epsilon(self.epsilon)?;
        if seeds.is_empty() && !points.is_empty() {
            return Err(Error::NoClusters);
        }
        Ok(Generations {
            points,
            measure: &self.measure,
            epsilon: self.epsilon,
            current: seeds,
            remaining: self.max_iter,
            iteration: 0,
            converged: false,
        })
    }

    /// Refine `seeds` and keep every generation.
    ///
    /// The first generation of the result is `seeds`, the `k`-th is the state
    /// after `k` passes.  At most `max_iter + 1` generations are returned.
    pub fn refine<const D: usize>(
        &self,
        points: &[PointND<D>],
        seeds: Vec<Cluster<D>>,
    ) -> Result<Refinement<D>, Error>
    where
        M: DistanceMeasure<D> + Sync,
    {
        let span = tracing::info_span!(
            "k-means",
            point_count = points.len(),
            cluster_count = seeds.len(),
        );
        let _enter = span.enter();

        let mut generations = self.generations(points, seeds)?;
        let mut history = vec![generations.current().to_vec()];
        history.extend(&mut generations);
        let converged = generations.converged();

        tracing::info!(iterations = history.len() - 1, converged, "refinement done");
        Ok(Refinement {
            generations: history,
            converged,
        })
    }
}

/// Iterator over the generations of a refinement, see [`KMeans::generations`].
#[derive(Debug)]
pub struct Generations<'a, M, const D: usize> {
    points: &'a [PointND<D>],
    measure: &'a M,
    epsilon: f64,
    current: Vec<Cluster<D>>,
    remaining: usize,
    iteration: usize,
    converged: bool,
}

impl<'a, M, const D: usize> Generations<'a, M, D> {
    /// The last generation produced, or the seeds if none was.
    pub fn current(&self) -> &[Cluster<D>] {
        &self.current
    }

    /// Whether the last generation produced has converged.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Number of generations produced so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl<'a, M, const D: usize> Iterator for Generations<'a, M, D>
where
    M: DistanceMeasure<D> + Sync,
{
    type Item = Vec<Cluster<D>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.converged || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.iteration += 1;

        let span = tracing::info_span!("generation", iteration = self.iteration);
        let _enter = span.enter();

        let mut next: Vec<Cluster<D>> = self.current.iter().map(Cluster::next_generation).collect();
        self.converged = assign_and_update(self.points, &mut next, self.measure, self.epsilon);
        tracing::debug!(converged = self.converged);

        self.current = next.clone();
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.converged {
            (0, Some(0))
        } else {
            (usize::min(1, self.remaining), Some(self.remaining))
        }
    }
}

/// The history of a refinement, see [`KMeans::refine`].
#[derive(Clone, Debug, PartialEq)]
pub struct Refinement<const D: usize> {
    /// Every generation, starting with the seeds.  Never empty.
    pub generations: Vec<Vec<Cluster<D>>>,
    /// Whether the last generation has converged.  `false` means the
    /// iteration budget ran out first.
    pub converged: bool,
}

impl<const D: usize> Refinement<D> {
    /// The final clusters.
    pub fn last(&self) -> &[Cluster<D>] {
        self.generations
            .last()
            .map_or(&[][..], |generation| generation.as_slice())
    }

    /// Number of passes that were run.
    pub fn iteration_count(&self) -> usize {
        self.generations.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manhattan;
    use crate::Point2D;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn two_groups() -> (Vec<Point2D>, Vec<Cluster<2>>) {
        let points = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, 11.0),
        ];
        let seeds = vec![
            Cluster::new(0, Point2D::new(0.0, 0.0)),
            Cluster::new(1, Point2D::new(10.0, 10.0)),
        ];
        (points, seeds)
    }

    fn k_means(max_iter: usize, epsilon: f64) -> KMeans<Manhattan> {
        KMeans {
            measure: Manhattan,
            max_iter,
            epsilon,
        }
    }

    #[test]
    fn test_two_groups() {
        let (points, seeds) = two_groups();
        let refinement = k_means(10, DEFAULT_EPSILON).refine(&points, seeds).unwrap();

        // The first pass moves both centers by 0.5, the second one does not
        // move them.
        assert!(refinement.converged);
        assert_eq!(refinement.iteration_count(), 2);

        let first = &refinement.generations[1];
        assert_eq!(first[0].previous_center(), &Point2D::new(0.0, 0.0));
        assert_eq!(first[0].center(), &Point2D::new(0.0, 0.5));

        let last = refinement.last();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].id(), 0);
        assert_eq!(last[0].center(), &Point2D::new(0.0, 0.5));
        assert_eq!(last[0].num_points(), 2);
        assert_eq!(last[1].center(), &Point2D::new(10.0, 10.5));
        assert_eq!(last[1].num_points(), 2);
        assert_relative_eq!(last[1].std(), 0.5);
    }

    #[test]
    fn test_large_epsilon_converges_at_once() {
        let (points, seeds) = two_groups();
        let refinement = k_means(10, 1.0).refine(&points, seeds).unwrap();

        assert!(refinement.converged);
        assert_eq!(refinement.iteration_count(), 1);
        let last = refinement.last();
        assert_eq!(last[0].center(), &Point2D::new(0.0, 0.0));
        assert_eq!(last[1].center(), &Point2D::new(10.0, 10.0));
        assert_eq!(last[0].num_points(), 2);
    }

    #[test]
    fn test_empty_cluster_keeps_center() {
        let points = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(0.0, 2.0),
        ];
        let seeds = vec![
            Cluster::new(0, Point2D::new(1.0, 1.0)),
            Cluster::new(1, Point2D::new(100.0, 100.0)),
        ];
        let refinement = k_means(10, DEFAULT_EPSILON).refine(&points, seeds).unwrap();

        assert!(refinement.converged);
        for generation in &refinement.generations[1..] {
            assert_eq!(generation[1].num_points(), 0);
            assert_eq!(generation[1].center(), &Point2D::new(100.0, 100.0));
            assert_eq!(generation[0].num_points(), 3);
        }
    }

    #[test]
    fn test_ties_go_to_first_cluster() {
        let points = vec![Point2D::new(0.0, 0.0)];
        let mut clusters = vec![
            Cluster::new(0, Point2D::new(-1.0, 0.0)),
            Cluster::new(1, Point2D::new(1.0, 0.0)),
        ];
        let converged = iterate_once(&points, &mut clusters, &Manhattan, 0.0).unwrap();
        assert!(!converged);
        assert_eq!(clusters[0].num_points(), 1);
        assert_eq!(clusters[0].center(), &Point2D::new(0.0, 0.0));
        assert_eq!(clusters[1].num_points(), 0);
        assert_eq!(clusters[1].center(), &Point2D::new(1.0, 0.0));
    }

    #[test]
    fn test_duplicate_points() {
        let points = vec![Point2D::new(3.0, -2.0); 10];
        let seeds = vec![
            Cluster::new(0, Point2D::new(3.0, -2.0)),
            Cluster::new(1, Point2D::new(3.0, -2.0)),
        ];
        let refinement = k_means(10, DEFAULT_EPSILON).refine(&points, seeds).unwrap();

        assert!(refinement.converged);
        let non_empty: Vec<&Cluster<2>> = refinement
            .last()
            .iter()
            .filter(|c| c.num_points() > 0)
            .collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].num_points(), 10);
        assert_eq!(non_empty[0].std(), 0.0);
    }

    #[test]
    fn test_zero_iterations() {
        let (points, seeds) = two_groups();
        let refinement = k_means(0, DEFAULT_EPSILON)
            .refine(&points, seeds.clone())
            .unwrap();
        assert!(!refinement.converged);
        assert_eq!(refinement.generations, vec![seeds]);
    }

    #[test]
    fn test_budget_exhausted() {
        let (points, seeds) = two_groups();
        let refinement = k_means(1, DEFAULT_EPSILON).refine(&points, seeds).unwrap();
        assert!(!refinement.converged);
        assert_eq!(refinement.iteration_count(), 1);
    }

    #[test]
    fn test_std_follows_moved_center() {
        let points = vec![Point2D::new(0.0, 0.0), Point2D::new(0.0, 1.0)];
        let seeds = vec![Cluster::new(0, Point2D::new(0.0, 0.0))];
        let refinement = k_means(1, DEFAULT_EPSILON).refine(&points, seeds).unwrap();

        assert!(!refinement.converged);
        let cluster = &refinement.last()[0];
        assert_eq!(cluster.center(), &Point2D::new(0.0, 0.5));
        assert_relative_eq!(cluster.std(), 0.5);
    }

    #[test]
    fn test_std_of_every_generation() {
        let (points, seeds) = two_groups();
        let refinement = k_means(10, DEFAULT_EPSILON).refine(&points, seeds).unwrap();

        for generation in &refinement.generations[1..] {
            for cluster in generation {
                let expected: f64 = points
                    .iter()
                    .filter(|p| Manhattan.distance(*p, cluster.center()) < 5.0)
                    .map(|p| Manhattan.distance(p, cluster.center()).powi(2))
                    .sum::<f64>()
                    / cluster.num_points() as f64;
                assert_relative_eq!(cluster.std(), expected.sqrt());
            }
        }
    }

    #[test]
    fn test_lazy_generations() {
        let (points, seeds) = two_groups();
        let algo = k_means(10, DEFAULT_EPSILON);
        let mut generations = algo.generations(&points, seeds).unwrap();
        assert_eq!(generations.iteration(), 0);

        let first = generations.next().unwrap();
        assert_eq!(first[1].center(), &Point2D::new(10.0, 10.5));
        assert!(!generations.converged());

        assert!(generations.next().is_some());
        assert!(generations.converged());
        assert!(generations.next().is_none());
        assert_eq!(generations.iteration(), 2);
    }

    #[test]
    fn test_invalid_input() {
        let (points, seeds) = two_groups();
        assert_eq!(
            k_means(10, DEFAULT_EPSILON).refine(&points, Vec::new()),
            Err(Error::NoClusters)
        );
        assert!(matches!(
            k_means(10, -1.0).refine(&points, seeds.clone()),
            Err(Error::InvalidEpsilon(_))
        ));
        assert!(matches!(
            k_means(10, f64::NAN).refine(&points, seeds),
            Err(Error::InvalidEpsilon(_))
        ));

        let refinement = k_means(10, DEFAULT_EPSILON)
            .refine::<2>(&[], Vec::new())
            .unwrap();
        assert!(refinement.converged);
    }

    #[test]
    fn test_thread_count_does_not_matter() {
        let points: Vec<Point2D> = (0..1000)
            .map(|i| Point2D::new((i % 37) as f64, (i % 53) as f64 * 0.5))
            .collect();
        let seeds = vec![
            Cluster::new(0, Point2D::new(0.0, 0.0)),
            Cluster::new(1, Point2D::new(36.0, 0.0)),
            Cluster::new(2, Point2D::new(18.0, 26.0)),
        ];
        let run = |thread_count| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(thread_count)
                .build()
                .unwrap()
                .install(|| k_means(50, DEFAULT_EPSILON).refine(&points, seeds.clone()))
                .unwrap()
        };
        let sequential = run(1);
        let parallel = run(4);
        assert_eq!(sequential.iteration_count(), parallel.iteration_count());
        for (s, p) in sequential.last().iter().zip(parallel.last()) {
            assert_eq!(s.num_points(), p.num_points());
            assert_relative_eq!(*s.center(), *p.center(), max_relative = 1e-12);
        }
    }

    fn points_strategy() -> impl Strategy<Value = Vec<Point2D>> {
        prop::collection::vec(
            (-100.0..100.0_f64, -100.0..100.0_f64).prop_map(|(x, y)| Point2D::new(x, y)),
            1..100,
        )
    }

    proptest!(
        #[test]
        fn refinement_respects_budget(
            points in points_strategy(),
            seed_count in 1..6_usize,
            max_iter in 0..8_usize,
        ) {
            let seeds: Vec<Cluster<2>> = points
                .iter()
                .take(seed_count)
                .enumerate()
                .map(|(id, p)| Cluster::new(id, *p))
                .collect();
            let refinement = k_means(max_iter, DEFAULT_EPSILON).refine(&points, seeds).unwrap();
            prop_assert!(refinement.generations.len() <= max_iter + 1);
            if !refinement.converged {
                prop_assert_eq!(refinement.generations.len(), max_iter + 1);
            }
            let assigned: usize = refinement.last().iter().map(Cluster::num_points).sum();
            if refinement.iteration_count() > 0 {
                prop_assert_eq!(assigned, points.len());
            }
        }

        /// With a tolerance wider than the point set, the first pass converges.
        #[test]
        fn wide_epsilon_converges_in_one_generation(
            points in points_strategy(),
            seed_count in 1..6_usize,
        ) {
            let mut diameter: f64 = 0.0;
            for a in &points {
                for b in &points {
                    diameter = diameter.max(Manhattan.distance(a, b));
                }
            }
            let seeds: Vec<Cluster<2>> = points
                .iter()
                .take(seed_count)
                .enumerate()
                .map(|(id, p)| Cluster::new(id, *p))
                .collect();
            let refinement = k_means(10, diameter + 1.0).refine(&points, seeds).unwrap();
            prop_assert!(refinement.converged);
            prop_assert_eq!(refinement.iteration_count(), 1);
        }
    );
}
