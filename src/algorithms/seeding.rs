use super::Canopy;
use super::Error;
use crate::Cluster;

/// Default share of the population a canopy must exceed to seed a cluster.
pub const DEFAULT_POPULATION_FRACTION: f64 = 0.05;

/// Seed one cluster per canopy holding strictly more than
/// `population_fraction * point_count` points.
///
/// `point_count` is the size of the original point set.  Clusters are
/// numbered from zero in canopy order, and their centers are copies of the
/// canopy centers.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), canopy::Error> {
/// use canopy::Canopy;
/// use canopy::Point2D;
///
/// let mut big = Canopy::new(0, Point2D::new(0.0, 0.0));
/// big.add_point(&Point2D::new(0.0, 1.0));
/// let small = Canopy::new(1, Point2D::new(9.0, 9.0));
///
/// let clusters = canopy::seed_clusters(&[big, small], 3, 0.4)?;
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].center(), &Point2D::new(0.0, 0.0));
/// # Ok(())
/// # }
/// ```
pub fn seed_clusters<const D: usize>(
    canopies: &[Canopy<D>],
    point_count: usize,
    population_fraction: f64,
) -> Result<Vec<Cluster<D>>, Error> {
    if !(0.0..=1.0).contains(&population_fraction) {
        return Err(Error::InvalidFraction(population_fraction));
    }
    let min_point_count = population_fraction * point_count as f64;

    let clusters: Vec<Cluster<D>> = canopies
        .iter()
        .filter(|canopy| canopy.point_count() as f64 > min_point_count)
        .enumerate()
        .map(|(id, canopy)| Cluster::new(id, *canopy.center()))
        .collect();

    tracing::info!(
        canopy_count = canopies.len(),
        cluster_count = clusters.len(),
        min_point_count,
        "seeded clusters"
    );
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanopyBuilder;
    use crate::Manhattan;
    use crate::Point2D;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_is_strict() {
        // 5% of 40 points is 2, so a canopy of 2 points does not qualify.
        let mut two = Canopy::new(0, Point2D::new(0.0, 0.0));
        two.add_point(&Point2D::new(1.0, 0.0));
        let mut three = Canopy::new(1, Point2D::new(5.0, 5.0));
        three.add_point(&Point2D::new(5.0, 6.0));
        three.add_point(&Point2D::new(6.0, 5.0));

        let clusters =
            seed_clusters(&[two, three], 40, DEFAULT_POPULATION_FRACTION).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id(), 0);
        assert_eq!(clusters[0].center(), &Point2D::new(5.0, 5.0));
    }

    #[test]
    fn test_canopies_are_untouched() {
        let canopies = vec![Canopy::new(0, Point2D::new(1.0, 2.0))];
        let mut clusters = seed_clusters(&canopies, 1, 0.0).unwrap();
        clusters[0].add_point(&Point2D::new(3.0, 4.0), &Manhattan);
        clusters[0].recompute_center();
        assert_eq!(canopies[0].center(), &Point2D::new(1.0, 2.0));
        assert_eq!(clusters[0].center(), &Point2D::new(3.0, 4.0));
    }

    #[test]
    fn test_invalid_fraction() {
        let canopies = vec![Canopy::new(0, Point2D::new(1.0, 2.0))];
        for fraction in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                seed_clusters(&canopies, 1, fraction),
                Err(Error::InvalidFraction(_))
            ));
        }
    }

    proptest!(
        #[test]
        fn seeding_is_idempotent(
            points in prop::collection::vec(
                (0.0..30.0_f64, 0.0..30.0_f64).prop_map(|(x, y)| Point2D::new(x, y)),
                1..150,
            ),
            fraction in 0.0..0.2_f64,
        ) {
            let canopies = CanopyBuilder { t1: 6.0, t2: 3.0, measure: Manhattan }
                .build(points.iter().copied())
                .unwrap();
            let first = seed_clusters(&canopies, points.len(), fraction).unwrap();
            let second = seed_clusters(&canopies, points.len(), fraction).unwrap();
            prop_assert_eq!(first, second);
        }
    );
}
