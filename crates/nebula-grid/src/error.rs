//! Error types for the node pool and the grid.

use thiserror::Error;

/// Errors raised by [`crate::Pool`] operations and pool deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A slot index beyond the allocated storage was accessed.
    #[error("pool index {index} out of bounds (capacity {len})")]
    OutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of allocated slots.
        len: usize,
    },
    /// Allocating another bucket would exceed the pool's maximum size.
    #[error("pool capacity exceeded (max {max} items)")]
    CapacityExceeded {
        /// The pool's compile-time maximum.
        max: usize,
    },
    /// Bucket counters disagree with the item storage.
    #[error("pool counters are inconsistent: {0}")]
    MalformedCounters(&'static str),
    /// A serialized blob has the wrong length for its element type.
    #[error("pool data blob has invalid length {len} for element size {elem}")]
    MalformedData {
        /// Length of the blob in bytes.
        len: usize,
        /// Size of one element in bytes.
        elem: usize,
    },
    /// The reference passed to `index_of` does not point into this pool.
    #[error("item does not belong to this pool")]
    ForeignItem,
}

/// Errors raised by [`crate::Grid`] and mesh generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Node storage failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// A palette index has no entry in the type table.
    #[error("unknown block type index: {0}")]
    UnknownType(u16),
    /// The palette already holds the maximum number of distinct blocks.
    #[error("block palette is full (max {0} types)")]
    PaletteFull(usize),
    /// Rotation index outside `0..24`.
    #[error("bad rotation number: {0}, must be between [0, 23]")]
    BadRotation(u8),
    /// Shape index with no known shape.
    #[error("unknown voxel shape: {0}")]
    UnknownShape(u8),
    /// A multi-material block has no material for a visible face.
    #[error("block '{block}' has no material for face {face}")]
    MissingMaterial {
        /// Block name.
        block: String,
        /// Face index (0..6).
        face: usize,
    },
    /// A block name could not be resolved through the registry.
    #[error("unknown block: '{0}'")]
    UnknownBlock(String),
    /// The block does not list the requested shape.
    #[error("block '{block}' cannot be placed as a {shape}")]
    UnsupportedShape {
        /// Block name.
        block: String,
        /// Shape name.
        shape: &'static str,
    },
    /// A block with the same name is already registered.
    #[error("duplicate block name: '{0}'")]
    DuplicateBlock(String),
    /// Prebuilt shape geometry is not made of whole triangles.
    #[error("shape geometry has {0} indices, must be divisible by 3")]
    MalformedGeometry(usize),
    /// The position lies beyond the deepest tree the pool can address.
    #[error("position [{x}, {y}, {z}] is out of the addressable range")]
    PositionOutOfRange {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
        /// Z coordinate.
        z: i32,
    },
    /// Persisted octree data violates a structural invariant.
    #[error("corrupted octree: {0}")]
    CorruptedTree(&'static str),
}
