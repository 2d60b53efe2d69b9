//! The index itself: grid parameters, the builder (§4.4), and the
//! single-query radius/kNN cores (§4.5, §4.6) that both the direct methods
//! here and the batched driver in [`crate::batch`] share.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use log::{debug, trace, warn};
use rustc_hash::FxHasher;

use crate::bin_map::{new_bin_map, BinInfo, BinMap};
use crate::cell::{axis_lower_bound, pack_cell};
use crate::error::{GridError, Result};
use crate::options::{BuildOptions, KnnQueryOptions, RadiusQueryOptions};
use crate::point::{IndexedPoint, Point};
use crate::sort::sort_by_key;
use crate::storage::BoundedStorage;

/// An immutable, indexed uniform grid over a 3-D point cloud.
///
/// Built once from a point slice via [`GridIndex::build`]; every field is
/// read-only afterward, so shared references may be queried concurrently
/// from any number of threads without locking (§5) — [`GridIndex`] is
/// `Send + Sync` because every field it owns is.
pub struct GridIndex {
    min_pt: Point,
    max_pt: Point,
    cell_size: f32,
    width: u32,
    height: u32,
    depth: u32,
    slab_size: u64,
    inv_cell_size: f32,
    bin_map: BinMap,
    bins: Vec<BinInfo>,
    payload: Vec<IndexedPoint>,
}

/// Per-worker scratch reused across a batch of radius queries: a candidate
/// cell list plus the parallel arrays the shared sort utility needs.
#[derive(Default)]
pub struct RadiusScratch {
    cell_keys: Vec<u64>,
    cell_lbs: Vec<f32>,
    order: Vec<i32>,
}

impl RadiusScratch {
    pub fn new() -> Self {
        Self {
            cell_keys: Vec::with_capacity(128),
            cell_lbs: Vec::with_capacity(128),
            order: Vec::with_capacity(128),
        }
    }

    fn clear(&mut self) {
        self.cell_keys.clear();
        self.cell_lbs.clear();
        self.order.clear();
    }
}

/// Per-worker scratch reused across a batch of kNN queries.
#[derive(Default)]
pub struct KnnScratch {
    shell_keys: Vec<u64>,
}

impl KnnScratch {
    pub fn new() -> Self {
        Self {
            shell_keys: Vec::with_capacity(128),
        }
    }
}

impl GridIndex {
    /// Buckets `points` into a uniform grid (§4.4).
    ///
    /// A zero-length `points` slice produces a valid, empty index whose
    /// every query returns zero results.
    pub fn build(points: &[Point], options: BuildOptions) -> GridIndex {
        if points.is_empty() {
            debug!("building grid index over 0 points; producing empty index");
            return GridIndex {
                min_pt: Point::ZERO,
                max_pt: Point::ZERO,
                cell_size: 1.0,
                width: 1,
                height: 1,
                depth: 1,
                slab_size: 1,
                inv_cell_size: 1.0,
                bin_map: new_bin_map(),
                bins: Vec::new(),
                payload: Vec::new(),
            };
        }

        // Step 1: bounding box.
        let mut min_pt = points[0];
        let mut max_pt = points[0];
        for p in &points[1..] {
            min_pt = min_pt.min(*p);
            max_pt = max_pt.max(*p);
        }

        // Step 2: cell sizing.
        let extent = max_pt - min_pt;
        let dim = extent.x.max(extent.y).max(extent.z);
        let mut cell_size = if options.suggested_radius > 0.0 {
            2.0 * options.suggested_radius
        } else {
            dim / (32.0 * 3.0f32.sqrt())
        };
        if !(cell_size > 0.0) {
            // Degenerate extent: a single point, or every point coincident,
            // with no suggested radius to fall back on. Not addressed by
            // the original source (it silently divides by zero there); we
            // pick an arbitrary nonzero cell size instead of propagating
            // NaN/inf through the rest of construction.
            warn!(
                "degenerate point cloud extent ({dim}) with no positive suggested_radius; \
                 falling back to cell_size = 1.0"
            );
            cell_size = 1.0;
        }

        // Step 3: dimensions.
        let inv_cell_size = 1.0 / cell_size;
        let width = (extent.x / cell_size) as u32 + 1;
        let height = (extent.y / cell_size) as u32 + 1;
        let depth = (extent.z / cell_size) as u32 + 1;
        let slab_size = width as u64 * height as u64;
        trace!(
            "grid dims {width}x{height}x{depth}, cell_size={cell_size}, n_points={}",
            points.len()
        );

        // Step 4: per-cell bucketing into scratch lists.
        let mut scratch: HashMap<u64, Vec<IndexedPoint>, BuildHasherDefault<FxHasher>> =
            Default::default();
        for (i, p) in points.iter().enumerate() {
            let rel = *p - min_pt;
            let ix = (rel.x * inv_cell_size) as i64;
            let iy = (rel.y * inv_cell_size) as i64;
            let iz = (rel.z * inv_cell_size) as i64;
            debug_assert!(
                ix >= 0 && (ix as u32) < width && iy >= 0 && (iy as u32) < height && iz >= 0 && (iz as u32) < depth,
                "point cell coordinate out of grid bounds"
            );
            let key = pack_cell(ix, iy, iz, width as i64, slab_size as i64);
            scratch
                .entry(key)
                .or_default()
                .push(IndexedPoint { point: *p, index: i as i32 });
        }

        // Step 5: compaction in ascending packed-key order.
        let mut keys: Vec<u64> = scratch.keys().copied().collect();
        keys.sort_unstable();

        let mut bin_map = new_bin_map();
        let mut bins = Vec::with_capacity(keys.len());
        let mut payload = Vec::with_capacity(points.len());
        for key in keys {
            let pts = scratch.remove(&key).expect("key came from this map's own keys()");
            let offset = payload.len() as u32;
            let length = pts.len() as u32;
            payload.extend(pts);
            bin_map.insert(key, bins.len() as u32);
            bins.push(BinInfo { offset, length });
        }

        debug!(
            "built grid index: {} points, {} occupied cells of {}",
            payload.len(),
            bins.len(),
            width as u64 * height as u64 * depth as u64
        );

        GridIndex {
            min_pt,
            max_pt,
            cell_size,
            width,
            height,
            depth,
            slab_size,
            inv_cell_size,
            bin_map,
            bins,
            payload,
        }
    }

    /// Explicit, consuming no-op provided for parity with the C API's
    /// explicit `msh_hash_grid_term` call. Equivalent to letting the index
    /// drop: every owned allocation (`bin_map`, `bins`, `payload`) is freed
    /// by ordinary `Drop`.
    pub fn teardown(self) {}

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn min_pt(&self) -> Point {
        self.min_pt
    }

    pub fn max_pt(&self) -> Point {
        self.max_pt
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn dims(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.depth)
    }

    #[inline]
    fn bin_contents(&self, key: u64) -> Option<&[IndexedPoint]> {
        let pos = *self.bin_map.get(&key)?;
        let bi = self.bins[pos as usize];
        Some(&self.payload[bi.offset as usize..(bi.offset + bi.length) as usize])
    }

    /// Fixed-radius search for a single query point (§4.5).
    ///
    /// `dists_sq`/`indices` must each be at least `options.max_n_neigh`
    /// long. Returns the number of neighbors found (and written).
    pub fn radius_search(
        &self,
        query: Point,
        options: RadiusQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
    ) -> Result<usize> {
        self.validate_radius_query(&options, dists_sq, indices)?;
        let mut scratch = RadiusScratch::new();
        Ok(self.radius_search_into(query, options, dists_sq, indices, &mut scratch))
    }

    fn validate_radius_query(
        &self,
        options: &RadiusQueryOptions,
        dists_sq: &[f32],
        indices: &[i32],
    ) -> Result<()> {
        if options.radius <= 0.0 {
            return Err(GridError::NonPositiveRadius(options.radius));
        }
        if options.max_n_neigh == 0 {
            return Err(GridError::ZeroCapacity);
        }
        if dists_sq.len() < options.max_n_neigh || indices.len() < options.max_n_neigh {
            return Err(GridError::OutputBufferTooSmall {
                needed: options.max_n_neigh,
                got: dists_sq.len().min(indices.len()),
            });
        }
        Ok(())
    }

    /// Core used by both the direct call above and the batched driver,
    /// which supplies its own per-worker `scratch` to avoid reallocating
    /// it for every query point.
    pub(crate) fn radius_search_into(
        &self,
        query: Point,
        options: RadiusQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
        scratch: &mut RadiusScratch,
    ) -> usize {
        let radius = options.radius;
        let radius_sq = radius * radius;
        let mut storage = BoundedStorage::new(options.max_n_neigh, dists_sq, indices);

        let rel = query - self.min_pt;
        let ix = (rel.x * self.inv_cell_size) as i64;
        let iy = (rel.y * self.inv_cell_size) as i64;
        let iz = (rel.z * self.inv_cell_size) as i64;

        let opx = ((rel.x + radius) * self.inv_cell_size) as i64 - ix;
        let onx = ((rel.x - radius) * self.inv_cell_size) as i64 - ix;
        let opy = ((rel.y + radius) * self.inv_cell_size) as i64 - iy;
        let ony = ((rel.y - radius) * self.inv_cell_size) as i64 - iy;
        let opz = ((rel.z + radius) * self.inv_cell_size) as i64 - iz;
        let onz = ((rel.z - radius) * self.inv_cell_size) as i64 - iz;

        scratch.clear();
        for oz in onz..=opz {
            let cz = iz + oz;
            if cz < 0 || cz >= self.depth as i64 {
                continue;
            }
            for oy in ony..=opy {
                let cy = iy + oy;
                if cy < 0 || cy >= self.height as i64 {
                    continue;
                }
                for ox in onx..=opx {
                    let cx = ix + ox;
                    if cx < 0 || cx >= self.width as i64 {
                        continue;
                    }
                    let dx = axis_lower_bound(ox, cx, rel.x, self.cell_size);
                    let dy = axis_lower_bound(oy, cy, rel.y, self.cell_size);
                    let dz = axis_lower_bound(oz, cz, rel.z, self.cell_size);
                    let lb = dx * dx + dy * dy + dz * dz;
                    let key = pack_cell(cx, cy, cz, self.width as i64, self.slab_size as i64);
                    scratch.cell_keys.push(key);
                    scratch.cell_lbs.push(lb);
                }
            }
        }
        let n = scratch.cell_keys.len();
        scratch.order.clear();
        scratch.order.extend(0..n as i32);
        sort_by_key(&mut scratch.cell_lbs, &mut scratch.order);

        for pos in 0..n {
            let key = scratch.cell_keys[scratch.order[pos] as usize];
            if let Some(pts) = self.bin_contents(key) {
                for ip in pts {
                    let d = (ip.point - query).length_squared();
                    if d < radius_sq {
                        storage.push(d, ip.index);
                    }
                }
            }
            if storage.is_full() {
                let lb = scratch.cell_lbs[pos];
                if storage.worst_dist_sq().unwrap() <= lb {
                    break;
                }
            }
        }

        if options.sort {
            storage.sort();
        }
        storage.len()
    }

    /// k-nearest-neighbor search for a single query point (§4.6).
    ///
    /// `dists_sq`/`indices` must each be at least `options.k` long. Returns
    /// `min(k, total collected)`.
    pub fn knn_search(
        &self,
        query: Point,
        options: KnnQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
    ) -> Result<usize> {
        if options.k == 0 {
            return Err(GridError::ZeroCapacity);
        }
        if dists_sq.len() < options.k || indices.len() < options.k {
            return Err(GridError::OutputBufferTooSmall {
                needed: options.k,
                got: dists_sq.len().min(indices.len()),
            });
        }
        let mut scratch = KnnScratch::new();
        Ok(self.knn_search_into(query, options, dists_sq, indices, &mut scratch))
    }

    /// Minimal possible lower-bound squared distance achievable by any
    /// cell at Chebyshev cell-distance exactly `layer` from the base cell
    /// `(ix, iy, iz)`. Used to decide whether shell expansion may safely
    /// stop (§4.6's "Open question": the tight, rather than the "one extra
    /// shell" heuristic, termination rule — see SPEC_FULL.md / DESIGN.md).
    fn min_shell_lower_bound(&self, layer: i64, ix: i64, iy: i64, iz: i64, rel: Point) -> f32 {
        let mut best = f32::INFINITY;
        for &(base_i, coord) in &[(ix, rel.x), (iy, rel.y), (iz, rel.z)] {
            for &off in &[layer, -layer] {
                let d = axis_lower_bound(off, base_i + off, coord, self.cell_size);
                let d_sq = d * d;
                if d_sq < best {
                    best = d_sq;
                }
            }
        }
        best
    }

    pub(crate) fn knn_search_into(
        &self,
        query: Point,
        options: KnnQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
        scratch: &mut KnnScratch,
    ) -> usize {
        let mut storage = BoundedStorage::new(options.k, dists_sq, indices);

        let rel = query - self.min_pt;
        let ix = (rel.x * self.inv_cell_size) as i64;
        let iy = (rel.y * self.inv_cell_size) as i64;
        let iz = (rel.z * self.inv_cell_size) as i64;

        // Bails out once the explored cube exceeds the grid on every axis;
        // guards against spinning forever when k exceeds the point count.
        let max_layer = self.width as i64 + self.height as i64 + self.depth as i64 + 2;

        let mut layer = 0i64;
        loop {
            scratch.shell_keys.clear();
            for oz in -layer..=layer {
                let cz = iz + oz;
                if cz < 0 || cz >= self.depth as i64 {
                    continue;
                }
                for oy in -layer..=layer {
                    let cy = iy + oy;
                    if cy < 0 || cy >= self.height as i64 {
                        continue;
                    }
                    let inc_x = if oy.abs() != layer && oz.abs() != layer {
                        (2 * layer).max(1)
                    } else {
                        1
                    };
                    let mut ox = -layer;
                    while ox <= layer {
                        let cx = ix + ox;
                        if cx >= 0 && cx < self.width as i64 {
                            let dx = axis_lower_bound(ox, cx, rel.x, self.cell_size);
                            let dy = axis_lower_bound(oy, cy, rel.y, self.cell_size);
                            let dz = axis_lower_bound(oz, cz, rel.z, self.cell_size);
                            let lb = dx * dx + dy * dy + dz * dz;
                            let prune = storage.is_full() && lb > storage.worst_dist_sq().unwrap();
                            if !prune {
                                let key = pack_cell(cx, cy, cz, self.width as i64, self.slab_size as i64);
                                scratch.shell_keys.push(key);
                            }
                        }
                        ox += inc_x;
                    }
                }
            }

            for &key in &scratch.shell_keys {
                if let Some(pts) = self.bin_contents(key) {
                    for ip in pts {
                        let d = (ip.point - query).length_squared();
                        storage.push(d, ip.index);
                    }
                }
            }

            if storage.len() >= options.k {
                let worst = storage.worst_dist_sq().unwrap();
                if self.min_shell_lower_bound(layer + 1, ix, iy, iz, rel) > worst {
                    break;
                }
            }

            layer += 1;
            if layer > max_layer {
                break;
            }
        }

        if options.sort {
            storage.sort();
        }
        storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_corners() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
            Point::new(10.0, 10.0, 10.0),
        ]
    }

    // Scenario S1.
    #[test]
    fn radius_search_s1() {
        let idx = GridIndex::build(&cube_corners(), BuildOptions::with_radius(1.0));
        let mut d = [0.0f32; 5];
        let mut i = [0i32; 5];
        let n = idx
            .radius_search(
                Point::ZERO,
                RadiusQueryOptions::new(1.1, 5).sorted(),
                &mut d,
                &mut i,
            )
            .unwrap();
        assert_eq!(n, 4);
        let mut got: Vec<i32> = i[..n].to_vec();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
        let mut dists = d[..n].to_vec();
        dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(dists, vec![0.0, 1.0, 1.0, 1.0]);
    }

    // Scenario S2.
    #[test]
    fn knn_search_s2() {
        let idx = GridIndex::build(&cube_corners(), BuildOptions::with_radius(1.0));
        let mut d = [0.0f32; 2];
        let mut i = [0i32; 2];
        let n = idx
            .knn_search(Point::ZERO, KnnQueryOptions::new(2).sorted(), &mut d, &mut i)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(i[0], 0);
        assert!([1, 2, 3].contains(&i[1]));
        assert_eq!(d, [0.0, 1.0]);
    }

    // Scenario S4.
    #[test]
    fn knn_single_point_cloud() {
        let idx = GridIndex::build(&[Point::new(5.0, 5.0, 5.0)], BuildOptions::default());
        let mut d = [0.0f32; 10];
        let mut i = [0i32; 10];
        let n = idx
            .knn_search(Point::new(5.0, 5.0, 5.0), KnnQueryOptions::new(10), &mut d, &mut i)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(i[0], 0);
        assert_eq!(d[0], 0.0);
    }

    // Scenario S6.
    #[test]
    fn radius_search_far_outside_bbox_returns_nothing() {
        let idx = GridIndex::build(&cube_corners(), BuildOptions::with_radius(1.0));
        let mut d = [0.0f32; 5];
        let mut i = [0i32; 5];
        let n = idx
            .radius_search(
                Point::new(1000.0, 1000.0, 1000.0),
                RadiusQueryOptions::new(0.1, 5),
                &mut d,
                &mut i,
            )
            .unwrap();
        assert_eq!(n, 0);
    }

    // Scenario S7 (empty index).
    #[test]
    fn empty_index_returns_zero_neighbors() {
        let idx = GridIndex::build(&[], BuildOptions::default());
        assert!(idx.is_empty());
        let mut d = [0.0f32; 4];
        let mut i = [0i32; 4];
        assert_eq!(
            idx.radius_search(Point::ZERO, RadiusQueryOptions::new(1.0, 4), &mut d, &mut i)
                .unwrap(),
            0
        );
        assert_eq!(
            idx.knn_search(Point::ZERO, KnnQueryOptions::new(4), &mut d, &mut i)
                .unwrap(),
            0
        );
    }

    #[test]
    fn radius_search_rejects_non_positive_radius() {
        let idx = GridIndex::build(&cube_corners(), BuildOptions::with_radius(1.0));
        let mut d = [0.0f32; 4];
        let mut i = [0i32; 4];
        let err = idx
            .radius_search(Point::ZERO, RadiusQueryOptions::new(0.0, 4), &mut d, &mut i)
            .unwrap_err();
        assert_eq!(err, GridError::NonPositiveRadius(0.0));
    }

    #[test]
    fn rejects_output_buffers_smaller_than_capacity() {
        let idx = GridIndex::build(&cube_corners(), BuildOptions::with_radius(1.0));
        let mut d = [0.0f32; 2];
        let mut i = [0i32; 2];
        let err = idx
            .radius_search(Point::ZERO, RadiusQueryOptions::new(1.1, 5), &mut d, &mut i)
            .unwrap_err();
        assert!(matches!(err, GridError::OutputBufferTooSmall { .. }));
    }

    // Testable Property 8: build-radius cap.
    #[test]
    fn scratch_never_exceeds_27_cells_under_build_radius_cap() {
        let mut points = Vec::new();
        for x in 0..20 {
            for y in 0..20 {
                for z in 0..20 {
                    points.push(Point::new(x as f32, y as f32, z as f32));
                }
            }
        }
        let build_radius = 1.0;
        let idx = GridIndex::build(&points, BuildOptions::with_radius(build_radius));
        let mut scratch = RadiusScratch::new();
        let mut d = [0.0f32; 64];
        let mut i = [0i32; 64];
        for q in [
            Point::new(10.0, 10.0, 10.0),
            Point::new(0.5, 0.5, 0.5),
            Point::new(19.0, 1.0, 5.0),
        ] {
            idx.radius_search_into(
                q,
                RadiusQueryOptions::new(build_radius, 64),
                &mut d,
                &mut i,
                &mut scratch,
            );
            assert!(
                scratch.cell_keys.len() <= 27,
                "scratch grew to {} cells for query radius == build radius",
                scratch.cell_keys.len()
            );
        }
    }

    #[test]
    fn knn_exact_k_nearest_on_uniform_grid() {
        // A small uniform lattice where brute force is easy to check against.
        let mut points = Vec::new();
        for x in 0..5 {
            for y in 0..5 {
                for z in 0..5 {
                    points.push(Point::new(x as f32, y as f32, z as f32));
                }
            }
        }
        let idx = GridIndex::build(&points, BuildOptions::with_radius(0.5));
        let query = Point::new(2.0, 2.0, 2.0);
        let k = 7;
        let mut d = vec![0.0f32; k];
        let mut i = vec![0i32; k];
        let n = idx
            .knn_search(query, KnnQueryOptions::new(k).sorted(), &mut d, &mut i)
            .unwrap();
        assert_eq!(n, k);

        let mut brute: Vec<(f32, i32)> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| ((*p - query).length_squared(), idx as i32))
            .collect();
        brute.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let expected_dists: Vec<f32> = brute[..k].iter().map(|p| p.0).collect();
        assert_eq!(d, expected_dists);
    }
}
