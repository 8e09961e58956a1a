use super::k_means::check_epsilon;
use super::seed_clusters;
use super::Canopy;
use super::CanopyBuilder;
use super::Error;
use super::KMeans;
use super::Refinement;
use super::DEFAULT_EPSILON;
use super::DEFAULT_POPULATION_FRACTION;
use crate::cluster;
use crate::Cluster;
use crate::DistanceMeasure;
use crate::PointND;
use rayon::iter::IndexedParallelIterator as _;
use rayon::iter::IntoParallelRefIterator as _;
use rayon::iter::IntoParallelRefMutIterator as _;
use rayon::iter::ParallelIterator as _;

/// Diagnostic data of a [`CanopyKMeans`] run.
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering<const D: usize> {
    /// Canopies the clusters were seeded from, in creation order.
    pub canopies: Vec<Canopy<D>>,
    /// Every generation of clusters, from the seeds to the final clusters.
    pub refinement: Refinement<D>,
}

impl<const D: usize> Clustering<D> {
    /// The final clusters.  Cluster `i` is the one labeled `i`.
    pub fn clusters(&self) -> &[Cluster<D>] {
        self.refinement.last()
    }
}

/// # Canopy-seeded k-means
///
/// Groups points into canopies with a [`CanopyBuilder`], seeds one cluster per
/// canopy that holds more than `population_fraction` of the points, refines
/// the clusters with [`KMeans`], and finally labels each point with the index
/// of its nearest cluster.
///
/// Should no canopy be large enough, every canopy seeds a cluster instead, so
/// that a non-empty input always gets at least one cluster.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), canopy::Error> {
/// use canopy::Partition as _;
/// use canopy::Point2D;
///
/// let points: Vec<Point2D> = (0..40)
///     .map(|i| {
///         let offset = if i % 2 == 0 { 0.0 } else { 50.0 };
///         Point2D::new(offset + (i % 5) as f64 * 0.1, offset)
///     })
///     .collect();
/// let mut labels = vec![0; points.len()];
///
/// let clustering = canopy::CanopyKMeans {
///     t1: 3.0,
///     t2: 1.5,
///     measure: canopy::Euclidean,
///     ..Default::default()
/// }
/// .partition(&mut labels, &points[..])?;
///
/// assert_eq!(clustering.clusters().len(), 2);
/// assert!(clustering.refinement.converged);
/// assert!(labels.iter().step_by(2).all(|label| *label == 0));
/// assert!(labels.iter().skip(1).step_by(2).all(|label| *label == 1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CanopyKMeans<M> {
    pub t1: f64,
    pub t2: f64,
    pub population_fraction: f64,
    pub max_iter: usize,
    pub epsilon: f64,
    pub measure: M,
}

impl<M> Default for CanopyKMeans<M>
where
    M: Default,
{
    fn default() -> Self {
        Self {
            t1: 3.0,
            t2: 1.5,
            population_fraction: DEFAULT_POPULATION_FRACTION,
            max_iter: 10,
            epsilon: DEFAULT_EPSILON,
            measure: M::default(),
        }
    }
}

impl<M> CanopyKMeans<M> {
    /// Validate the settings, so that no stage fails halfway.
    pub fn check(&self) -> Result<(), Error> {
        CanopyBuilder {
            t1: self.t1,
            t2: self.t2,
            measure: (),
        }
        .check_thresholds()?;
        if !(0.0..=1.0).contains(&self.population_fraction) {
            return Err(Error::InvalidFraction(self.population_fraction));
        }
        check_epsilon(self.epsilon)
    }

    /// Run the canopy, seeding and refinement stages, without labeling.
    pub fn cluster<const D: usize>(&self, points: &[PointND<D>]) -> Result<Clustering<D>, Error>
    where
        M: DistanceMeasure<D> + Sync,
    {
        self.check()?;

        let measure = |a: &PointND<D>, b: &PointND<D>| self.measure.distance(a, b);
        let builder = CanopyBuilder {
            t1: self.t1,
            t2: self.t2,
            measure,
        };
        let k_means = KMeans {
            measure,
            max_iter: self.max_iter,
            epsilon: self.epsilon,
        };

        let canopies = builder.build(points.iter().copied())?;
        let mut seeds = seed_clusters(&canopies, points.len(), self.population_fraction)?;
        if seeds.is_empty() {
            tracing::info!("no canopy is large enough, seeding from all canopies");
            seeds = seed_clusters(&canopies, points.len(), 0.0)?;
        }
        let refinement = k_means.refine(points, seeds)?;

        Ok(Clustering {
            canopies,
            refinement,
        })
    }
}

impl<'a, M, const D: usize> crate::Partition<&'a [PointND<D>]> for CanopyKMeans<M>
where
    M: DistanceMeasure<D> + Sync,
{
    type Metadata = Clustering<D>;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        points: &'a [PointND<D>],
    ) -> Result<Self::Metadata, Self::Error> {
        if part_ids.len() != points.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: points.len(),
            });
        }

        let clustering = self.cluster(points)?;

        let span = tracing::info_span!("label points");
        let _enter = span.enter();
        let centers: Vec<PointND<D>> = clustering
            .clusters()
            .iter()
            .map(|cluster| *cluster.center())
            .collect();
        part_ids
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(part_id, point)| {
                if let Some((idx, _distance)) = cluster::nearest(&centers, point, &self.measure) {
                    *part_id = idx;
                }
            });

        Ok(clustering)
    }
}
