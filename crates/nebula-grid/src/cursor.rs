//! Depth-first cursor over an [`Octree`].
//!
//! A cursor points at one node of a sibling group. [`Cursor::advance`] walks the
//! intrusive `next` chain of that group and [`Cursor::children`] descends one
//! level, so a sparse branch costs O(children) to visit rather than O(8).

use glam::IVec3;

use crate::node::{BAD_INDEX, Node, Voxel};
use crate::octree::{Octree, octant_offset, voxel_offset, width_for_level};

/// Position inside an octree: a node index, its level, and its parent's origin.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    octree: &'a Octree,
    index: u32,
    level: usize,
    origin: IVec3,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(octree: &'a Octree, index: u32, level: usize, origin: IVec3) -> Self {
        Self {
            octree,
            index,
            level,
            origin,
        }
    }

    /// Returns `true` while the cursor points at a live node.
    pub fn is_valid(&self) -> bool {
        self.index != BAD_INDEX
            && self
                .octree
                .pool()
                .at(self.index as usize)
                .is_ok_and(|node| !node.is_empty())
    }

    /// Returns `true` when the node is a leaf.
    pub fn is_voxel(&self) -> bool {
        self.octree.depth() == self.level
    }

    /// Moves to the next sibling. The cursor becomes invalid at the end of the group.
    pub fn advance(&mut self) {
        self.index = if self.is_valid() {
            self.value().next()
        } else {
            BAD_INDEX
        };
    }

    /// Cursor at the first child of this branch, or an invalid cursor for leaves.
    pub fn children(&self) -> Cursor<'a> {
        let child = if self.is_valid() && !self.is_voxel() {
            self.value().branch().child()
        } else {
            BAD_INDEX
        };
        Cursor::new(self.octree, child, self.level + 1, self.pos())
    }

    /// Depth of the node; the root is level 0.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Origin of the parent branch.
    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    /// Raw node, or [`Node::EMPTY`] when invalid.
    pub fn value(&self) -> Node {
        self.octree
            .pool()
            .at(self.index as usize)
            .copied()
            .unwrap_or(Node::EMPTY)
    }

    /// Leaf payload, when the cursor points at a voxel.
    pub fn voxel(&self) -> Option<Voxel> {
        (self.is_valid() && self.is_voxel()).then(|| self.value().voxel())
    }

    /// Pool index of the node.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Edge length of the cube covered by this branch.
    pub fn branch_width(&self) -> i32 {
        width_for_level((self.octree.depth() + 1).saturating_sub(self.level))
    }

    /// Reconstructed position: the branch origin, or the cell of a voxel.
    pub fn pos(&self) -> IVec3 {
        if self.level == 0 {
            return self.origin;
        }
        let node = self.value();
        if self.is_voxel() {
            voxel_offset(node.voxel().index(), self.origin)
        } else {
            octant_offset(node.branch().index(), self.branch_width() / 2, self.origin)
        }
    }
}

/// Depth-first iterator over every voxel of an octree.
pub struct Voxels<'a> {
    stack: Vec<Cursor<'a>>,
}

impl<'a> Voxels<'a> {
    pub(crate) fn new(root: Cursor<'a>) -> Self {
        Self { stack: vec![root] }
    }

    /// Voxels below a single branch, leaving its siblings alone.
    pub(crate) fn within(branch: Cursor<'a>) -> Self {
        Self {
            stack: vec![branch.children()],
        }
    }
}

impl Iterator for Voxels<'_> {
    type Item = (IVec3, Voxel);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(cursor) = self.stack.pop() {
            if !cursor.is_valid() {
                continue;
            }
            let mut sibling = cursor;
            sibling.advance();
            self.stack.push(sibling);

            if cursor.is_voxel() {
                return Some((cursor.pos(), cursor.value().voxel()));
            }
            self.stack.push(cursor.children());
        }
        None
    }
}
