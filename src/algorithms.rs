use std::fmt;

mod canopy;
mod canopy_k_means;
mod k_means;
mod seeding;

pub use canopy::nearest_canopy;
pub use canopy::Canopy;
pub use canopy::CanopyBuilder;
pub use canopy_k_means::CanopyKMeans;
pub use canopy_k_means::Clustering;
pub use k_means::iterate_once;
pub use k_means::Generations;
pub use k_means::KMeans;
pub use k_means::Refinement;
pub use k_means::DEFAULT_EPSILON;
pub use seeding::seed_clusters;
pub use seeding::DEFAULT_POPULATION_FRACTION;

/// Common errors thrown by algorithms.
///
/// All of them are detected before any work is done, so no partial result is
/// ever produced.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Canopy thresholds must satisfy `t1 > t2 >= 0`.
    InvalidThresholds { t1: f64, t2: f64 },

    /// At least one point is required.
    EmptyInput,

    /// The population fraction must lie in `[0, 1]`.
    InvalidFraction(f64),

    /// The convergence tolerance must be non-negative.
    InvalidEpsilon(f64),

    /// Points cannot be assigned when there is no cluster.
    NoClusters,

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidThresholds { t1, t2 } => write!(
                f,
                "invalid canopy thresholds (expected t1 > t2 >= 0, got t1={t1}, t2={t2})",
            ),
            Error::EmptyInput => write!(f, "input contains no point"),
            Error::InvalidFraction(fraction) => {
                write!(f, "population fraction {fraction} is not within [0, 1]")
            }
            Error::InvalidEpsilon(epsilon) => {
                write!(f, "convergence tolerance {epsilon} is not a non-negative number")
            }
            Error::NoClusters => write!(f, "no cluster to assign points to"),
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
        }
    }
}

impl std::error::Error for Error {}
