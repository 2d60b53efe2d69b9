//! Indexed uniform spatial hash grid for fixed-radius and k-nearest-neighbor
//! queries over 3-D point clouds.
//!
//! Build once from a point cloud with [`GridIndex::build`], then run any
//! number of read-only [`GridIndex::radius_search`]/[`GridIndex::knn_search`]
//! calls, or fan a batch of query points out across worker threads with
//! [`GridIndex::par_radius_search`]/[`GridIndex::par_knn_search`].
//!
//! ```
//! use hashgrid3d::{BuildOptions, GridIndex, Point, RadiusQueryOptions};
//!
//! let points = vec![
//!     Point::new(0.0, 0.0, 0.0),
//!     Point::new(1.0, 0.0, 0.0),
//!     Point::new(10.0, 10.0, 10.0),
//! ];
//! let index = GridIndex::build(&points, BuildOptions::with_radius(1.0));
//!
//! let mut dists_sq = [0.0f32; 8];
//! let mut indices = [0i32; 8];
//! let n = index
//!     .radius_search(
//!         Point::ZERO,
//!         RadiusQueryOptions::new(1.5, 8).sorted(),
//!         &mut dists_sq,
//!         &mut indices,
//!     )
//!     .unwrap();
//! assert_eq!(n, 2);
//! ```

mod batch;
mod bin_map;
mod cell;
mod error;
mod index;
mod options;
mod point;
mod sort;
mod storage;

pub use error::{GridError, Result};
pub use index::GridIndex;
pub use options::{BuildOptions, KnnQueryOptions, RadiusQueryOptions};
pub use point::{IndexedPoint, Point};
