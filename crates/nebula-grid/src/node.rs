//! Bit-packed octree nodes.
//!
//! Every slot of the octree pool is a single `u64`. The same word is read either
//! as a [`Voxel`] (leaf) or a [`Branch`] (interior node); which view applies is
//! determined by the node's level in the tree, not by a tag stored in the word.
//!
//! ## Bit layout
//!
//! | View   | Field      | Bits   |
//! |--------|------------|--------|
//! | Voxel  | next       | 0..24  |
//! | Voxel  | color      | 24..32 |
//! | Voxel  | type       | 32..42 |
//! | Voxel  | rotation   | 42..47 |
//! | Voxel  | index      | 47..50 |
//! | Voxel  | shape      | 50..55 |
//! | Branch | next       | 0..24  |
//! | Branch | child      | 24..48 |
//! | Branch | compressed | 48     |
//! | Branch | index      | 49..52 |
//!
//! The layout is persisted verbatim, so these offsets must never move.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Sentinel index terminating sibling chains and marking "no child".
pub const BAD_INDEX: u32 = 0x00FF_FFFF;

macro_rules! bitfield {
    ($(#[$meta:meta])* $get:ident, $set:ident, $ty:ty, $shift:expr, $width:expr) => {
        $(#[$meta])*
        #[inline]
        pub fn $get(self) -> $ty {
            ((self.0 >> $shift) & ((1u64 << $width) - 1)) as $ty
        }

        #[inline]
        pub fn $set(&mut self, value: $ty) {
            let mask = ((1u64 << $width) - 1) << $shift;
            self.0 = (self.0 & !mask) | (((value as u64) << $shift) & mask);
        }
    };
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Raw 64-bit pool slot. An all-zero node is an unallocated slot.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Node(u64);

static_assertions::assert_eq_size!(Node, u64);

impl Node {
    /// The empty (unallocated) node.
    pub const EMPTY: Self = Self(0);

    /// Wraps raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` for an unallocated slot.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Reads the node as a leaf.
    pub const fn voxel(self) -> Voxel {
        Voxel(self.0)
    }

    /// Reads the node as an interior node.
    pub const fn branch(self) -> Branch {
        Branch(self.0)
    }

    /// Sibling link, shared by both views.
    pub fn next(self) -> u32 {
        (self.0 & BAD_INDEX as u64) as u32
    }

    pub fn set_next(&mut self, next: u32) {
        self.0 = (self.0 & !(BAD_INDEX as u64)) | (next as u64 & BAD_INDEX as u64);
    }

    /// Octant of this node inside its parent. Both views store it, at different offsets.
    pub fn octant(self, is_voxel: bool) -> u8 {
        if is_voxel {
            self.voxel().index()
        } else {
            self.branch().index()
        }
    }
}

impl From<Voxel> for Node {
    fn from(voxel: Voxel) -> Self {
        Self(voxel.0)
    }
}

impl From<Branch> for Node {
    fn from(branch: Branch) -> Self {
        Self(branch.0)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:#018x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Voxel
// ---------------------------------------------------------------------------

/// Leaf view of a node: one solid cell of the grid.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Voxel(u64);

impl Voxel {
    /// Creates a detached voxel payload (`next` set to [`BAD_INDEX`], octant 0).
    pub fn new(ty: u16, rotation: u8, color: u8, shape: u8) -> Self {
        let mut voxel = Self(0);
        voxel.set_next(BAD_INDEX);
        voxel.set_ty(ty);
        voxel.set_rotation(rotation);
        voxel.set_color(color);
        voxel.set_shape(shape);
        voxel
    }

    bitfield!(
        /// Index of the next sibling, or [`BAD_INDEX`].
        next, set_next, u32, 0, 24
    );
    bitfield!(
        /// Tint index.
        color, set_color, u8, 24, 8
    );
    bitfield!(
        /// Palette index into the owning grid's type table.
        ty, set_ty, u16, 32, 10
    );
    bitfield!(
        /// One of 24 axis-aligned orientations.
        rotation, set_rotation, u8, 42, 5
    );
    bitfield!(
        /// Octant inside the parent branch.
        index, set_index, u8, 47, 3
    );
    bitfield!(
        /// Shape identifier (see [`crate::ShapeType`]).
        shape, set_shape, u8, 50, 5
    );

    /// Returns `true` when type, color, rotation and shape match, ignoring links.
    pub fn same_payload(self, other: Voxel) -> bool {
        self.ty() == other.ty()
            && self.color() == other.color()
            && self.rotation() == other.rotation()
            && self.shape() == other.shape()
    }

    /// Copies type, color, rotation and shape from `other`, keeping links.
    pub fn set_payload(&mut self, other: Voxel) {
        self.set_ty(other.ty());
        self.set_color(other.color());
        self.set_rotation(other.rotation());
        self.set_shape(other.shape());
    }
}

impl fmt::Debug for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Voxel{{ next: {:#x}, color: {}, type: {}, rotation: {}, index: {}, shape: {} }}",
            self.next(),
            self.color(),
            self.ty(),
            self.rotation(),
            self.index(),
            self.shape()
        )
    }
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// Interior view of a node.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Branch(u64);

impl Branch {
    /// A branch with no siblings and no children.
    pub fn new(index: u8) -> Self {
        let mut branch = Self(0);
        branch.set_next(BAD_INDEX);
        branch.set_child(BAD_INDEX);
        branch.set_index(index);
        branch
    }

    bitfield!(
        /// Index of the next sibling, or [`BAD_INDEX`].
        next, set_next, u32, 0, 24
    );
    bitfield!(
        /// Index of the first child, or [`BAD_INDEX`].
        child, set_child, u32, 24, 24
    );
    bitfield!(
        /// Reserved for uniformly filled regions.
        compressed_bits, set_compressed_bits, u8, 48, 1
    );
    bitfield!(
        /// Octant inside the parent branch.
        index, set_index, u8, 49, 3
    );

    pub fn compressed(self) -> bool {
        self.compressed_bits() != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        self.set_compressed_bits(compressed as u8);
    }

    /// Returns `true` when the branch has at least one child.
    pub fn has_children(self) -> bool {
        self.child() != BAD_INDEX
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Branch{{ next: {:#x}, child: {:#x}, compressed: {}, index: {} }}",
            self.next(),
            self.child(),
            self.compressed(),
            self.index()
        )
    }
}
