//! Batched/parallel driver (§4.7): fans a query-point batch out across
//! worker threads and calls the single-query cores in [`crate::index`].
//!
//! Grounded on `engine/src/physics/spatial.rs`'s `ParallelBroadPhase`, the
//! teacher's own `rayon`-backed parallel pass over per-object work — same
//! shape here, over query points instead of collision objects.

use rayon::prelude::*;

use crate::error::{GridError, Result};
use crate::index::{GridIndex, KnnScratch, RadiusScratch};
use crate::options::{KnnQueryOptions, RadiusQueryOptions};
use crate::point::Point;

fn validate_batch(n_query: usize, stride: usize, dists_sq_len: usize, indices_len: usize) -> Result<()> {
    if n_query == 0 {
        return Err(GridError::EmptyQueryBatch);
    }
    if stride == 0 {
        return Err(GridError::ZeroCapacity);
    }
    let needed = n_query * stride;
    if dists_sq_len < needed || indices_len < needed {
        return Err(GridError::OutputBufferTooSmall {
            needed,
            got: dists_sq_len.min(indices_len),
        });
    }
    Ok(())
}

impl GridIndex {
    /// Runs a fixed-radius search for every point in `queries`, one worker
    /// per contiguous chunk of the batch (§4.7). `dists_sq`/`indices` are
    /// `queries.len() * options.max_n_neigh` long, laid out as
    /// `queries.len()` contiguous per-query slots — each query writes only
    /// to its own slot, so no synchronization is needed across workers.
    ///
    /// `n_neighbors`, if present, receives the per-query neighbor count.
    /// Returns the sum of per-query counts.
    pub fn par_radius_search(
        &self,
        queries: &[Point],
        options: RadiusQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
        n_neighbors: Option<&mut [usize]>,
    ) -> Result<usize> {
        let stride = options.max_n_neigh;
        validate_batch(queries.len(), stride, dists_sq.len(), indices.len())?;
        if options.radius <= 0.0 {
            return Err(GridError::NonPositiveRadius(options.radius));
        }
        if let Some(ref nn) = n_neighbors {
            if nn.len() != queries.len() {
                return Err(GridError::NeighborCountBufferMismatch {
                    needed: queries.len(),
                    got: nn.len(),
                });
            }
        }

        let counts: Vec<usize> = queries
            .par_iter()
            .zip(dists_sq.par_chunks_mut(stride))
            .zip(indices.par_chunks_mut(stride))
            .map_init(RadiusScratch::new, |scratch, ((q, d_chunk), i_chunk)| {
                self.radius_search_into(*q, options, d_chunk, i_chunk, scratch)
            })
            .collect();

        if let Some(nn) = n_neighbors {
            nn.copy_from_slice(&counts);
        }
        Ok(counts.into_iter().sum())
    }

    /// Runs a kNN search for every point in `queries` (§4.7), same
    /// chunked-output layout and per-query isolation as
    /// [`par_radius_search`](Self::par_radius_search).
    pub fn par_knn_search(
        &self,
        queries: &[Point],
        options: KnnQueryOptions,
        dists_sq: &mut [f32],
        indices: &mut [i32],
        n_neighbors: Option<&mut [usize]>,
    ) -> Result<usize> {
        let stride = options.k;
        validate_batch(queries.len(), stride, dists_sq.len(), indices.len())?;
        if let Some(ref nn) = n_neighbors {
            if nn.len() != queries.len() {
                return Err(GridError::NeighborCountBufferMismatch {
                    needed: queries.len(),
                    got: nn.len(),
                });
            }
        }

        let counts: Vec<usize> = queries
            .par_iter()
            .zip(dists_sq.par_chunks_mut(stride))
            .zip(indices.par_chunks_mut(stride))
            .map_init(KnnScratch::new, |scratch, ((q, d_chunk), i_chunk)| {
                self.knn_search_into(*q, options, d_chunk, i_chunk, scratch)
            })
            .collect();

        if let Some(nn) = n_neighbors {
            nn.copy_from_slice(&counts);
        }
        Ok(counts.into_iter().sum())
    }
}
