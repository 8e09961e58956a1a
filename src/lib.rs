//! A point clustering library that seeds k-means with canopies.
//!
//! # Crate Layout
//!
//! Canopy exposes a [`Partition`] trait, which is implemented by the
//! end-to-end [`CanopyKMeans`] pipeline.  Each stage of the pipeline is also
//! available on its own:
//!
//! 1. [`CanopyBuilder`] groups points into overlapping [`Canopy`]s in a
//!    single pass, using two distance thresholds `t1 > t2`,
//! 2. [`seed_clusters`] turns the canopies that hold a large enough share of
//!    the population into initial [`Cluster`]s,
//! 3. [`KMeans`] refines those clusters until their centers stop moving.
//!
//! All stages are generic over a [`DistanceMeasure`].  Unit structs such as
//! [`Manhattan`] or [`Euclidean`] are provided, and any closure of the form
//! `Fn(&PointND<D>, &PointND<D>) -> f64` is accepted as well.
//!
//! # Example
//!
//! ```rust
//! # fn main() -> Result<(), canopy::Error> {
//! use canopy::Partition as _;
//! use canopy::Point2D;
//!
//! let points = [
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(0.0, 1.0),
//!     Point2D::new(10.0, 10.0),
//!     Point2D::new(10.0, 11.0),
//! ];
//! let mut labels = [0; 4];
//!
//! let clustering = canopy::CanopyKMeans {
//!     t1: 3.0,
//!     t2: 1.5,
//!     measure: canopy::Manhattan,
//!     ..Default::default()
//! }
//! .partition(&mut labels, &points[..])?;
//!
//! assert_eq!(clustering.canopies.len(), 2);
//! assert_eq!(labels, [0, 0, 1, 1]);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    rust_2018_idioms
)]

mod algorithms;
mod cluster;
mod distance;
mod geometry;

pub use crate::algorithms::*;
pub use crate::cluster::Cluster;
pub use crate::distance::*;
pub use crate::geometry::{centroid, Point2D, Point3D, PointND};

pub use nalgebra;
pub use rayon;

/// The `Partition` trait allows for partitioning data.
///
/// Clustering algorithms implement this trait.
///
/// The generic argument `M` defines the input of the algorithms (e.g. a set
/// of 2D points).
///
/// The input partition must be of the correct size and its contents may or may
/// not be used by the algorithms.
pub trait Partition<M> {
    /// Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    /// Error details, should the algorithm fail to run.
    type Error;

    /// Partition the given data and output the cluster index of each element
    /// in `part_ids`.
    ///
    /// Labels are indices into the final list of clusters.  A cluster that
    /// ends up with no element keeps its index, which then appears nowhere in
    /// `part_ids`.
    fn partition(&mut self, part_ids: &mut [usize], data: M)
        -> Result<Self::Metadata, Self::Error>;
}
