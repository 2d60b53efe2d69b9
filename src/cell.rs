//! Cell coordinates, packed cell keys, and the per-axis lower-bound distance
//! shared by radius search (§4.5) and kNN shell expansion (§4.6).

/// Packs a 3-D cell coordinate into a single row-major key.
///
/// `ix`, `iy`, `iz` are taken as `i64` so callers can pack coordinates that
/// fall outside the grid bounds (used only for bounds checks before
/// packing); the key itself is only ever looked up for coordinates already
/// known to be in range.
#[inline]
pub fn pack_cell(ix: i64, iy: i64, iz: i64, width: i64, slab_size: i64) -> u64 {
    (iz * slab_size + iy * width + ix) as u64
}

/// Lower-bound squared distance contributed by a single axis, given the
/// cell offset `offset` (in cells, relative to the query's base cell),
/// the query's coordinate within its own base cell expressed directly
/// (`coord`), the neighboring cell's coordinate along this axis (`cell_idx`)
/// and the cell size.
///
/// Mirrors the original's per-axis case split exactly:
/// - `offset == 0`: the query's own cell, contributes 0.
/// - `offset < 0`:  the cell lies behind the query; the gap is measured from
///   the query back to the *far* edge of that cell.
/// - `offset > 0`:  the cell lies ahead of the query; the gap is measured
///   from the *near* edge of that cell forward to the query.
#[inline]
pub fn axis_lower_bound(offset: i64, cell_idx: i64, coord: f32, cell_size: f32) -> f32 {
    use std::cmp::Ordering::*;
    match offset.cmp(&0) {
        Equal => 0.0,
        Less => coord - (cell_idx + 1) as f32 * cell_size,
        Greater => cell_idx as f32 * cell_size - coord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_cell_is_injective_within_bounds() {
        let width = 4i64;
        let slab = width * 5;
        let mut seen = std::collections::HashSet::new();
        for iz in 0..3 {
            for iy in 0..5 {
                for ix in 0..4 {
                    let k = pack_cell(ix, iy, iz, width, slab);
                    assert!(seen.insert(k), "duplicate key for ({ix},{iy},{iz})");
                }
            }
        }
    }

    #[test]
    fn axis_lower_bound_is_zero_for_own_cell() {
        assert_eq!(axis_lower_bound(0, 7, 12.3, 2.0), 0.0);
    }

    #[test]
    fn axis_lower_bound_positive_offset_measures_gap_to_near_edge() {
        // cell_size 2.0, neighbor cell at index 5 => near edge at x=10.0
        let coord = 8.0;
        let d = axis_lower_bound(1, 5, coord, 2.0);
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn axis_lower_bound_negative_offset_measures_gap_to_far_edge() {
        // cell_size 2.0, neighbor cell at index 2 => far edge at x=6.0
        let coord = 8.0;
        let d = axis_lower_bound(-1, 2, coord, 2.0);
        assert!((d - 2.0).abs() < 1e-6);
    }
}
