use thiserror::Error;

/// Programmer-error contract violations the public API refuses to act on.
///
/// Construction failures are not represented here: allocation failure is
/// fatal and unrecoverable in Rust (`Vec`/`HashMap` abort the process
/// themselves), matching the "fatal, non-recoverable" classification the
/// original C implementation gives allocation failure during construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("query batch is empty (n_query_pts == 0)")]
    EmptyQueryBatch,

    #[error("max_n_neigh must be greater than zero")]
    ZeroCapacity,

    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f32),

    #[error("output buffer too small: need at least {needed} slots, got {got}")]
    OutputBufferTooSmall { needed: usize, got: usize },

    #[error("n_neighbors buffer length {got} does not match query count {needed}")]
    NeighborCountBufferMismatch { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, GridError>;
