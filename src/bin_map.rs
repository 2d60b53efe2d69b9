//! Sparse mapping from packed cell key to the position of that cell's
//! [`BinInfo`] in the dense bin array.
//!
//! The original C source hand-rolls an open-addressing `u64 -> u64` table
//! (`msh_hg_map`) with a `+1` key offset to free up `0` as an empty-slot
//! sentinel, multiply-xor-shift hashing, and manual doubling at 50% load.
//! spec.md §1 explicitly treats that hash-map utility as an external
//! collaborator ("treated as generic containers with the contracts given in
//! §6") rather than something this index needs to reimplement — the
//! contract in §4.3 is what must hold, not a specific probing scheme. A
//! `std::collections::HashMap` keyed by a fast integer hasher satisfies it
//! directly: replace-on-duplicate, O(1) amortized lookup, and automatic
//! growth are all built in. `rustc_hash`'s `FxHasher` plays the same role
//! the spec's "multiply-xor-shift" hash does — fast mixing for the small,
//! densely clustered integer keys a uniform grid produces — the same
//! family of hasher this pack's `daemontus-rs-binary-decision-diagrams`
//! reaches for (`fxhash`) and `ChainSafe-forest` reaches for (`ahash`) in
//! their own performance-sensitive integer-keyed tables.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

/// The half-open interval `[offset, offset + length)` inside the packed
/// payload where a cell's [`crate::point::IndexedPoint`]s reside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinInfo {
    pub offset: u32,
    pub length: u32,
}

pub type BinMap = HashMap<u64, u32, BuildHasherDefault<FxHasher>>;

pub fn new_bin_map() -> BinMap {
    BinMap::default()
}
