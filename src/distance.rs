//! Distance measures between points.
//!
//! Every algorithm of this crate is generic over a [`DistanceMeasure`].
//! Measures must return non-negative, finite values; what happens otherwise is
//! unspecified (threshold comparisons stop making sense) and is not checked.

use crate::PointND;
use std::fmt;
use std::str::FromStr;

/// A function from two points of the same dimension to a non-negative scalar.
///
/// Implemented by the unit structs of this module, by [`Measure`], and by any
/// closure with the right signature:
///
/// ```rust
/// use canopy::DistanceMeasure as _;
/// use canopy::Point2D;
///
/// let x_only = |a: &Point2D, b: &Point2D| f64::abs(a.x - b.x);
/// let d = x_only.distance(&Point2D::new(1.0, 5.0), &Point2D::new(4.0, -5.0));
/// assert_eq!(d, 3.0);
/// ```
pub trait DistanceMeasure<const D: usize> {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64;
}

impl<F, const D: usize> DistanceMeasure<D> for F
where
    F: Fn(&PointND<D>, &PointND<D>) -> f64,
{
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        self(a, b)
    }
}

/// Sum of the absolute coordinate differences (L1 norm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Manhattan;

impl<const D: usize> DistanceMeasure<D> for Manhattan {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        (a - b).lp_norm(1)
    }
}

/// Straight-line distance (L2 norm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Euclidean;

impl<const D: usize> DistanceMeasure<D> for Euclidean {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        (a - b).norm()
    }
}

/// Square of the euclidean distance.
///
/// Cheaper than [`Euclidean`] and preserves its ordering, but thresholds and
/// tolerances must be squared accordingly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SquaredEuclidean;

impl<const D: usize> DistanceMeasure<D> for SquaredEuclidean {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        (a - b).norm_squared()
    }
}

/// Largest absolute coordinate difference (L∞ norm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chebyshev;

impl<const D: usize> DistanceMeasure<D> for Chebyshev {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        (a - b).amax()
    }
}

/// One minus the cosine of the angle between the two points, in `[0, 2]`.
///
/// A null vector has no direction, so it is at distance zero from every point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cosine;

impl<const D: usize> DistanceMeasure<D> for Cosine {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        let dot = a.dot(b);
        let mut denominator = a.norm() * b.norm();
        // Rounding errors can push the cosine above one.
        if denominator < dot {
            denominator = dot;
        }
        if denominator == 0.0 && dot == 0.0 {
            return 0.0;
        }
        1.0 - dot / denominator
    }
}

/// Tanimoto (extended Jaccard) distance, in `[0, 1]` for non-negative
/// coordinates.
///
/// Two null vectors are at distance zero from each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tanimoto;

impl<const D: usize> DistanceMeasure<D> for Tanimoto {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        let dot = a.dot(b);
        let mut denominator = a.norm_squared() + b.norm_squared() - dot;
        if denominator < dot {
            denominator = dot;
        }
        if denominator == 0.0 && dot == 0.0 {
            return 0.0;
        }
        1.0 - dot / denominator
    }
}

/// A distance measure picked at runtime, e.g. from a command-line argument.
///
/// # Example
///
/// ```rust
/// use canopy::DistanceMeasure as _;
/// use canopy::Point2D;
///
/// let measure: canopy::Measure = "euclidean".parse().unwrap();
/// let d = measure.distance(&Point2D::new(0.0, 0.0), &Point2D::new(3.0, 4.0));
/// assert_eq!(d, 5.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Measure {
    #[default]
    Manhattan,
    Euclidean,
    SquaredEuclidean,
    Chebyshev,
    Cosine,
    Tanimoto,
}

impl Measure {
    pub const ALL: [Measure; 6] = [
        Measure::Manhattan,
        Measure::Euclidean,
        Measure::SquaredEuclidean,
        Measure::Chebyshev,
        Measure::Cosine,
        Measure::Tanimoto,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Measure::Manhattan => "manhattan",
            Measure::Euclidean => "euclidean",
            Measure::SquaredEuclidean => "squared-euclidean",
            Measure::Chebyshev => "chebyshev",
            Measure::Cosine => "cosine",
            Measure::Tanimoto => "tanimoto",
        }
    }
}

impl<const D: usize> DistanceMeasure<D> for Measure {
    fn distance(&self, a: &PointND<D>, b: &PointND<D>) -> f64 {
        match self {
            Measure::Manhattan => Manhattan.distance(a, b),
            Measure::Euclidean => Euclidean.distance(a, b),
            Measure::SquaredEuclidean => SquaredEuclidean.distance(a, b),
            Measure::Chebyshev => Chebyshev.distance(a, b),
            Measure::Cosine => Cosine.distance(a, b),
            Measure::Tanimoto => Tanimoto.distance(a, b),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing an unknown [`Measure`] name.
#[derive(Clone, Copy, Debug)]
pub struct UnknownMeasure;

impl fmt::Display for UnknownMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown distance measure, expected one of: ")?;
        for (i, measure) in Measure::ALL.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{measure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnknownMeasure {}

impl FromStr for Measure {
    type Err = UnknownMeasure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "manhattan" | "l1" => Measure::Manhattan,
            "euclidean" | "l2" => Measure::Euclidean,
            "squared-euclidean" | "sqeuclidean" => Measure::SquaredEuclidean,
            "chebyshev" | "linf" => Measure::Chebyshev,
            "cosine" => Measure::Cosine,
            "tanimoto" => Measure::Tanimoto,
            _ => return Err(UnknownMeasure),
        })
    }
}
