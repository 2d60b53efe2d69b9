use glam::Vec3;

/// A 3-D coordinate, single precision.
///
/// Aliased to `glam::Vec3` rather than a hand-rolled `(f32, f32, f32)`
/// struct — `glam` is already the vector-math dependency this index's
/// cell-arithmetic is grounded on.
pub type Point = Vec3;

/// A [`Point`] tagged with the index it held in the caller's original input
/// slice. This is the only representation the grid keeps after
/// construction; the caller's input slice need not outlive the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPoint {
    pub point: Point,
    pub index: i32,
}
