//! Sparse octree of bit-packed nodes stored in a [`Pool`].
//!
//! The root branch lives in slot 0. A branch links to its first child through
//! `child`; siblings are chained through `next` and each records its octant, so
//! only populated octants consume slots. All leaves sit at the same level,
//! `depth`, and the tree covers the cube `(-width, width)` on every axis where
//! `width == 2^depth / 2`. Inserting outside that cube grows the tree by adding
//! a new root level ([`Octree::expand`]).
//!
//! ## Octant numbering
//!
//! Octants are picked by comparing a position against the branch origin, with
//! `>=` counting as the positive side:
//!
//! | Octant | x | y | z |
//! |--------|---|---|---|
//! | 0      | + | + | + |
//! | 1      | - | + | + |
//! | 2      | - | + | - |
//! | 3      | + | + | - |
//! | 4      | + | - | + |
//! | 5      | - | - | + |
//! | 6      | - | - | - |
//! | 7      | + | - | - |

use std::fmt::Write as _;

use glam::{IVec3, Vec3};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

use crate::cursor::{Cursor, Voxels};
use crate::error::GridError;
use crate::node::{BAD_INDEX, Branch, Node, Voxel};
use crate::pool::Pool;
use crate::raycast::{RayCastResult, face_normal, intersect_box};

/// Maximum number of nodes a single octree can hold.
pub const MAX_NODES: usize = 256 * 256 * 256;

/// Deepest tree supported. Node links are 24 bits wide, so deeper trees could
/// never be populated anyway.
pub const MAX_DEPTH: usize = 24;

/// Node storage of an octree.
pub type NodePool = Pool<Node, MAX_NODES>;

// ---------------------------------------------------------------------------
// Octant math
// ---------------------------------------------------------------------------

const OCTANT_SIGNS: [IVec3; 8] = [
    IVec3::new(1, 1, 1),
    IVec3::new(-1, 1, 1),
    IVec3::new(-1, 1, -1),
    IVec3::new(1, 1, -1),
    IVec3::new(1, -1, 1),
    IVec3::new(-1, -1, 1),
    IVec3::new(-1, -1, -1),
    IVec3::new(1, -1, -1),
];

const OPPOSITE_OCTANT: [u8; 8] = [6, 7, 4, 5, 2, 3, 0, 1];

/// Half-extent of the cube covered at `level` counted from the leaves.
pub fn width_for_level(level: usize) -> i32 {
    (1i32 << level) / 2
}

/// Octant of `pos` relative to `origin`.
pub fn octant_of(pos: IVec3, origin: IVec3) -> u8 {
    let top = pos.y >= origin.y;
    let pos_x = pos.x >= origin.x;
    let pos_z = pos.z >= origin.z;
    let layer = match (pos_x, pos_z) {
        (true, true) => 0,
        (false, true) => 1,
        (false, false) => 2,
        (true, false) => 3,
    };
    if top { layer } else { layer + 4 }
}

/// Origin of a child branch in `octant`, `half` units away from `origin` on each axis.
pub fn octant_offset(octant: u8, half: i32, origin: IVec3) -> IVec3 {
    origin + OCTANT_SIGNS[(octant & 7) as usize] * half
}

/// Cell of a leaf in `octant` around `origin`.
pub fn voxel_offset(octant: u8, origin: IVec3) -> IVec3 {
    origin + OCTANT_SIGNS[(octant & 7) as usize].min(IVec3::ZERO)
}

/// Octant diagonally across the center.
pub fn opposite_octant(octant: u8) -> u8 {
    OPPOSITE_OCTANT[(octant & 7) as usize]
}

// ---------------------------------------------------------------------------
// Octree
// ---------------------------------------------------------------------------

/// Sparse voxel octree.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "OctreeParts")]
pub struct Octree {
    nodes: NodePool,
    depth: usize,
}

/// One step of a root-to-leaf path: the node, its parent and its predecessor
/// in the parent's sibling chain.
#[derive(Clone, Copy, Debug)]
struct PathStep {
    index: usize,
    parent: usize,
    prev: Option<usize>,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new()
    }
}

impl Octree {
    /// Creates a depth-1 tree holding only the root branch.
    pub fn new() -> Self {
        Self {
            nodes: NodePool::with_root(Branch::new(0).into()),
            depth: 1,
        }
    }

    /// Number of levels below the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Half-extent of the addressable cube.
    pub fn width(&self) -> i32 {
        width_for_level(self.depth)
    }

    /// Number of live nodes, root included.
    pub fn size(&self) -> usize {
        self.nodes.size()
    }

    /// Underlying node storage.
    pub fn pool(&self) -> &NodePool {
        &self.nodes
    }

    /// Returns `true` if `pos` cannot be stored without expanding.
    pub fn is_outside(&self, pos: IVec3) -> bool {
        let w = self.width();
        pos.cmpge(IVec3::splat(w)).any() || pos.cmple(IVec3::splat(-w)).any()
    }

    /// Stores `voxel`'s payload at `pos`, expanding the tree as needed.
    ///
    /// Returns the voxel previously stored at `pos`, if any.
    pub fn insert(&mut self, pos: IVec3, voxel: Voxel) -> Result<Option<Voxel>, GridError> {
        while self.is_outside(pos) {
            if self.depth >= MAX_DEPTH {
                return Err(GridError::PositionOutOfRange {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                });
            }
            self.expand()?;
        }

        let mut parent = 0usize;
        let mut origin = IVec3::ZERO;
        let mut level = 1;
        loop {
            let is_leaf = level == self.depth;
            let octant = octant_of(pos, origin);
            let (found, last) = self.find_child(parent, octant, is_leaf)?;

            let index = match found {
                Some(index) if is_leaf => {
                    let slot = self.nodes.at_mut(index)?;
                    let previous = slot.voxel();
                    let mut updated = previous;
                    updated.set_payload(voxel);
                    *slot = updated.into();
                    return Ok(Some(previous));
                }
                Some(index) => index,
                None => {
                    let node = if is_leaf {
                        let mut leaf = Voxel::new(0, 0, 0, 0);
                        leaf.set_payload(voxel);
                        leaf.set_index(octant);
                        Node::from(leaf)
                    } else {
                        Node::from(Branch::new(octant))
                    };
                    let index = self.alloc(node)?;
                    self.link_child(parent, last, index)?;
                    if is_leaf {
                        return Ok(None);
                    }
                    index
                }
            };

            origin = octant_offset(octant, width_for_level(self.depth - level + 1) / 2, origin);
            parent = index;
            level += 1;
        }
    }

    /// Removes the voxel at `pos`, returning it.
    ///
    /// Branches left without children are released as well, up to (but never
    /// including) the root. The depth of the tree is left unchanged.
    pub fn remove(&mut self, pos: IVec3) -> Result<Option<Voxel>, GridError> {
        let Some(path) = self.locate(pos)? else {
            return Ok(None);
        };
        let Some((leaf, branches)) = path.split_last() else {
            return Ok(None);
        };

        let removed = self.nodes.at(leaf.index)?.voxel();
        self.unlink(leaf)?;

        for step in branches.iter().rev() {
            if self.nodes.at(step.index)?.branch().has_children() {
                break;
            }
            self.unlink(step)?;
        }

        Ok(Some(removed))
    }

    /// Looks up the voxel at `pos`.
    pub fn find(&self, pos: IVec3) -> Option<Voxel> {
        if self.is_outside(pos) {
            return None;
        }

        let mut parent = 0usize;
        let mut origin = IVec3::ZERO;
        let mut level = 1;
        loop {
            let is_leaf = level == self.depth;
            let octant = octant_of(pos, origin);
            let (found, _) = self.find_child(parent, octant, is_leaf).ok()?;
            let index = found?;
            if is_leaf {
                return self.nodes.at(index).ok().map(|node| node.voxel());
            }
            origin = octant_offset(octant, width_for_level(self.depth - level + 1) / 2, origin);
            parent = index;
            level += 1;
        }
    }

    /// Adds a root level, doubling the addressable width.
    ///
    /// Each existing root child is wrapped in a new branch occupying the same
    /// octant, and moves to the opposite octant inside that wrapper, so every
    /// stored voxel keeps its coordinates.
    pub fn expand(&mut self) -> Result<(), GridError> {
        let leaves = self.depth == 1;
        let mut root = self.nodes.at(0)?.branch();

        let mut children = Vec::with_capacity(8);
        let mut child = root.child();
        while child != BAD_INDEX {
            if children.len() >= 8 {
                return Err(GridError::CorruptedTree("root has more than 8 children"));
            }
            children.push(child as usize);
            child = self.nodes.at(child as usize)?.next();
        }
        if self.nodes.size() + children.len() > MAX_NODES {
            return Err(crate::PoolError::CapacityExceeded { max: MAX_NODES }.into());
        }

        let mut first = BAD_INDEX;
        let mut last: Option<usize> = None;
        for index in children {
            let mut node = *self.nodes.at(index)?;
            let octant = node.octant(leaves);
            node.set_next(BAD_INDEX);
            if leaves {
                let mut voxel = node.voxel();
                voxel.set_index(opposite_octant(octant));
                node = voxel.into();
            } else {
                let mut branch = node.branch();
                branch.set_index(opposite_octant(octant));
                node = branch.into();
            }
            self.nodes[index] = node;

            let mut wrapper = Branch::new(octant);
            wrapper.set_child(index as u32);
            let wrapper_index = self.alloc(wrapper.into())?;

            match last {
                None => first = wrapper_index as u32,
                Some(prev) => self.nodes[prev].set_next(wrapper_index as u32),
            }
            last = Some(wrapper_index);
        }

        root.set_child(first);
        self.nodes[0] = root.into();
        self.depth += 1;
        tracing::trace!(depth = self.depth, width = self.width(), "octree expanded");
        Ok(())
    }

    /// Casts the segment `from..to` through the tree and returns the nearest hit.
    pub fn ray_cast(&self, from: Vec3, to: Vec3) -> Option<RayCastResult> {
        let mut best = None;
        self.ray_cast_children(0, IVec3::ZERO, 1, from, to, &mut best);
        best
    }

    fn ray_cast_children(
        &self,
        parent: usize,
        origin: IVec3,
        level: usize,
        from: Vec3,
        to: Vec3,
        best: &mut Option<RayCastResult>,
    ) {
        let is_leaf = level == self.depth;
        let width = width_for_level(self.depth - level + 1);
        let half = width as f32 / 2.0;

        let Ok(parent_node) = self.nodes.at(parent) else {
            return;
        };
        let mut child = parent_node.branch().child();
        let mut visited = 0;
        while child != BAD_INDEX && visited < 8 {
            visited += 1;
            let Ok(node) = self.nodes.at(child as usize).copied() else {
                return;
            };
            let octant = node.octant(is_leaf);
            let center = origin.as_vec3() + OCTANT_SIGNS[octant as usize].as_vec3() * half;
            let min = center - Vec3::splat(half + 0.5);
            let max = center + Vec3::splat(half - 0.5);

            if let Some(hit) = intersect_box(min, max, from, to) {
                if is_leaf {
                    let closer = best
                        .as_ref()
                        .is_none_or(|b| b.hit_pos.distance(from) > hit.distance(from));
                    if closer {
                        let world_pos = (min + max) / 2.0;
                        let normal = face_normal(hit - world_pos);
                        *best = Some(RayCastResult {
                            voxel: node.voxel(),
                            normal,
                            hit_pos: hit,
                            pos: voxel_offset(octant, origin),
                            world_pos,
                            orientation: normal.as_ivec3(),
                        });
                    }
                } else {
                    let child_origin = octant_offset(octant, width / 2, origin);
                    self.ray_cast_children(child as usize, child_origin, level + 1, from, to, best);
                }
            }

            child = node.next();
        }
    }

    /// Cursor at the root branch.
    pub fn iterate(&self) -> Cursor<'_> {
        Cursor::new(self, 0, 0, IVec3::ZERO)
    }

    /// Iterates every stored voxel with its position, depth-first.
    pub fn voxels(&self) -> Voxels<'_> {
        Voxels::new(self.iterate())
    }

    /// Logs every node at `debug` level.
    pub fn dump(&self) {
        for line in self.dump_to_string().lines() {
            tracing::debug!("{line}");
        }
    }

    /// Renders the tree, one node per line, indented by level.
    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Octree depth: {} width: {} size: {}",
            self.depth,
            self.width(),
            self.size()
        );
        let mut stack = vec![self.iterate()];
        while let Some(mut cursor) = stack.pop() {
            if !cursor.is_valid() {
                continue;
            }
            let indent = "  ".repeat(cursor.level());
            let node = cursor.value();
            if cursor.is_voxel() {
                let _ = writeln!(
                    out,
                    "{indent}[{}] pos: {} {}",
                    cursor.index(),
                    cursor.pos(),
                    node.voxel()
                );
            } else {
                let _ = writeln!(
                    out,
                    "{indent}[{}] pos: {} {}",
                    cursor.index(),
                    cursor.pos(),
                    node.branch()
                );
            }
            let children = cursor.children();
            cursor.advance();
            stack.push(cursor);
            stack.push(children);
        }
        out
    }

    /// Checks link structure and node accounting.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return Err(GridError::CorruptedTree("depth out of range"));
        }
        let root = self.nodes.at(0)?;
        if root.is_empty() {
            return Err(GridError::CorruptedTree("missing root"));
        }

        let live = self.nodes.size();
        let mut visited = 1usize;
        let mut stack = vec![(root.branch().child(), 1usize)];
        while let Some((first, level)) = stack.pop() {
            let mut child = first;
            let mut siblings = 0;
            while child != BAD_INDEX {
                let node = *self.nodes.at(child as usize)?;
                if node.is_empty() {
                    return Err(GridError::CorruptedTree("link to an empty slot"));
                }
                siblings += 1;
                visited += 1;
                if siblings > 8 || visited > live {
                    return Err(GridError::CorruptedTree("sibling chain loops"));
                }
                if level < self.depth {
                    stack.push((node.branch().child(), level + 1));
                }
                child = node.next();
            }
        }

        if visited != live {
            return Err(GridError::CorruptedTree("unreachable live nodes"));
        }
        Ok(())
    }

    // -- internals --

    /// Stores `node` in a free slot. Slot indices must stay below the link sentinel.
    fn alloc(&mut self, node: Node) -> Result<usize, GridError> {
        let (index, slot) = self.nodes.insert()?;
        *slot = node;
        if index >= BAD_INDEX as usize {
            self.nodes.erase(index)?;
            self.nodes[index] = Node::EMPTY;
            return Err(crate::PoolError::CapacityExceeded { max: MAX_NODES }.into());
        }
        Ok(index)
    }

    /// Scans `parent`'s children for `octant`. Also returns the last sibling seen.
    fn find_child(
        &self,
        parent: usize,
        octant: u8,
        is_leaf: bool,
    ) -> Result<(Option<usize>, Option<usize>), GridError> {
        let mut child = self.nodes.at(parent)?.branch().child();
        let mut last = None;
        let mut visited = 0;
        while child != BAD_INDEX {
            visited += 1;
            if visited > 8 {
                return Err(GridError::CorruptedTree("branch has more than 8 children"));
            }
            let node = *self.nodes.at(child as usize)?;
            if node.octant(is_leaf) == octant {
                return Ok((Some(child as usize), last));
            }
            last = Some(child as usize);
            child = node.next();
        }
        Ok((None, last))
    }

    fn link_child(
        &mut self,
        parent: usize,
        last: Option<usize>,
        index: usize,
    ) -> Result<(), GridError> {
        match last {
            Some(prev) => self.nodes.at_mut(prev)?.set_next(index as u32),
            None => {
                let mut branch = self.nodes.at(parent)?.branch();
                branch.set_child(index as u32);
                *self.nodes.at_mut(parent)? = branch.into();
            }
        }
        Ok(())
    }

    /// Root-to-leaf path to the voxel at `pos`, or `None` if it is absent.
    fn locate(&self, pos: IVec3) -> Result<Option<Vec<PathStep>>, GridError> {
        if self.is_outside(pos) {
            return Ok(None);
        }

        let mut path = Vec::with_capacity(self.depth);
        let mut parent = 0usize;
        let mut origin = IVec3::ZERO;
        for level in 1..=self.depth {
            let is_leaf = level == self.depth;
            let octant = octant_of(pos, origin);
            let mut child = self.nodes.at(parent)?.branch().child();
            let mut prev = None;
            let mut found = None;
            let mut visited = 0;
            while child != BAD_INDEX && visited < 8 {
                visited += 1;
                let node = *self.nodes.at(child as usize)?;
                if node.octant(is_leaf) == octant {
                    found = Some(child as usize);
                    break;
                }
                prev = Some(child as usize);
                child = node.next();
            }
            let Some(index) = found else {
                return Ok(None);
            };
            path.push(PathStep {
                index,
                parent,
                prev,
            });
            origin = octant_offset(octant, width_for_level(self.depth - level + 1) / 2, origin);
            parent = index;
        }
        Ok(Some(path))
    }

    /// Detaches a node from its sibling chain, releases its slot and zeroes it.
    fn unlink(&mut self, step: &PathStep) -> Result<(), GridError> {
        let next = self.nodes.at(step.index)?.next();
        match step.prev {
            Some(prev) => self.nodes.at_mut(prev)?.set_next(next),
            None => {
                let mut branch = self.nodes.at(step.parent)?.branch();
                branch.set_child(next);
                *self.nodes.at_mut(step.parent)? = branch.into();
            }
        }
        self.nodes.erase(step.index)?;
        *self.nodes.at_mut(step.index)? = Node::EMPTY;
        Ok(())
    }
}

impl std::fmt::Debug for Octree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Octree")
            .field("depth", &self.depth)
            .field("size", &self.size())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Persisted form: `(pool, depth)`.
#[derive(Deserialize)]
struct OctreeParts(NodePool, u32);

impl TryFrom<OctreeParts> for Octree {
    type Error = GridError;

    fn try_from(parts: OctreeParts) -> Result<Self, Self::Error> {
        let octree = Octree {
            nodes: parts.0,
            depth: parts.1 as usize,
        };
        octree.validate()?;
        Ok(octree)
    }
}

impl Serialize for Octree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.nodes)?;
        tuple.serialize_element(&(self.depth as u32))?;
        tuple.end()
    }
}
