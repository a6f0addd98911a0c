//! A voxel grid: an [`Octree`] of voxels plus the palette of blocks they use.
//!
//! Voxels store a 10-bit palette index instead of a block reference. The
//! palette keeps a live count per entry so unused entries can be recycled and
//! the persisted form only lists blocks that are still referenced by name.

use std::sync::Arc;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::{BlockRef, BlockRegistry};
use crate::cursor::{Cursor, Voxels};
use crate::error::GridError;
use crate::node::Voxel;
use crate::octree::{NodePool, Octree};
use crate::raycast::RayCastResult;
use crate::shape::ShapeType;
use crate::shape_cache::ROTATION_COUNT;

/// Maximum number of palette entries addressable by a voxel's type field.
pub const MAX_TYPES: usize = 1 << 10;

/// Half the diagonal of a unit cube.
const VOXEL_RADIUS: f32 = 0.866_025_4;

/// A palette entry.
#[derive(Clone, Debug)]
pub struct Type {
    pub block: BlockRef,
    /// Number of voxels referencing this entry.
    pub count: u32,
}

/// Sparse voxel grid with a block palette.
#[derive(Clone, Debug, Default)]
pub struct Grid {
    voxels: Octree,
    types: Vec<Type>,
    bb_radius: f32,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Editing ------------------------------------------------------------

    /// Places `block` at `pos`, replacing whatever voxel was there.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BadRotation`] when `rotation >= 24`,
    /// [`GridError::UnsupportedShape`] when `block` does not list `shape`,
    /// [`GridError::PaletteFull`] when `block` would need a 1025th palette
    /// entry, or a pool error if the tree cannot grow.
    pub fn insert(
        &mut self,
        pos: IVec3,
        block: &BlockRef,
        rotation: u8,
        color: u8,
        shape: ShapeType,
    ) -> Result<(), GridError> {
        check_rotation(rotation)?;
        block.check_shape(shape)?;
        let ty = self.insert_block(block)?;
        self.insert_voxel(pos, Voxel::new(ty, rotation, color, shape.id()))
    }

    /// Places an existing palette entry at `pos`.
    pub fn insert_type(
        &mut self,
        pos: IVec3,
        ty: u16,
        rotation: u8,
        color: u8,
        shape: ShapeType,
    ) -> Result<(), GridError> {
        check_rotation(rotation)?;
        let entry = self
            .types
            .get_mut(ty as usize)
            .ok_or(GridError::UnknownType(ty))?;
        entry.block.check_shape(shape)?;
        entry.count += 1;
        self.insert_voxel(pos, Voxel::new(ty, rotation, color, shape.id()))
    }

    /// Removes the voxel at `pos`. Returns `false` if the cell was empty.
    pub fn remove(&mut self, pos: IVec3) -> Result<bool, GridError> {
        let Some(removed) = self.voxels.remove(pos)? else {
            return Ok(false);
        };
        self.release_type(removed.ty());
        self.update_bounds();
        Ok(true)
    }

    /// Inserts a voxel whose palette count was already taken.
    fn insert_voxel(&mut self, pos: IVec3, voxel: Voxel) -> Result<(), GridError> {
        match self.voxels.insert(pos, voxel) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    self.release_type(previous.ty());
                }
                self.bb_radius = self.bb_radius.max(voxel_radius(pos));
                Ok(())
            }
            Err(err) => {
                self.release_type(voxel.ty());
                Err(err)
            }
        }
    }

    /// Finds or allocates the palette entry for `block` and takes one count on it.
    fn insert_block(&mut self, block: &BlockRef) -> Result<u16, GridError> {
        if let Some(index) = self.get_type_index(block) {
            self.types[index as usize].count += 1;
            return Ok(index);
        }

        let entry = Type {
            block: Arc::clone(block),
            count: 1,
        };
        if let Some(index) = self.types.iter().position(|t| t.count == 0) {
            self.types[index] = entry;
            return Ok(index as u16);
        }
        if self.types.len() >= MAX_TYPES {
            return Err(GridError::PaletteFull(MAX_TYPES));
        }
        self.types.push(entry);
        Ok((self.types.len() - 1) as u16)
    }

    fn release_type(&mut self, ty: u16) {
        if let Some(entry) = self.types.get_mut(ty as usize) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    // -- Queries ------------------------------------------------------------

    /// Voxel stored at `pos`.
    pub fn find(&self, pos: IVec3) -> Option<Voxel> {
        self.voxels.find(pos)
    }

    /// Nearest voxel hit by the segment `from..to`.
    pub fn ray_cast(&self, from: Vec3, to: Vec3) -> Option<RayCastResult> {
        self.voxels.ray_cast(from, to)
    }

    /// Cursor at the root of the voxel tree.
    pub fn iterate(&self) -> Cursor<'_> {
        self.voxels.iterate()
    }

    /// Every voxel with its position.
    pub fn voxels(&self) -> Voxels<'_> {
        self.voxels.voxels()
    }

    /// Positions of all voxels, for building collision shapes.
    pub fn occupancy(&self) -> Vec<IVec3> {
        self.voxels.voxels().map(|(pos, _)| pos).collect()
    }

    pub fn octree(&self) -> &Octree {
        &self.voxels
    }

    /// Node storage of the voxel tree.
    pub fn pool(&self) -> &NodePool {
        self.voxels.pool()
    }

    /// The palette. Entries with a zero count are free for reuse.
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Block behind palette entry `ty`.
    pub fn get_type(&self, ty: u16) -> Result<&BlockRef, GridError> {
        self.types
            .get(ty as usize)
            .map(|t| &t.block)
            .ok_or(GridError::UnknownType(ty))
    }

    /// Palette index of `block`, if it is in use.
    pub fn get_type_index(&self, block: &BlockRef) -> Option<u16> {
        self.types
            .iter()
            .position(|t| t.count > 0 && (Arc::ptr_eq(&t.block, block) || t.block.name == block.name))
            .map(|index| index as u16)
    }

    /// Number of voxels using palette entry `ty`.
    pub fn get_type_count(&self, ty: u16) -> Result<u32, GridError> {
        self.types
            .get(ty as usize)
            .map(|t| t.count)
            .ok_or(GridError::UnknownType(ty))
    }

    /// Number of palette entries, including free ones.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Radius of the sphere around the origin enclosing every voxel.
    pub fn radius(&self) -> f32 {
        self.bb_radius
    }

    /// Logs the tree and palette at `debug` level.
    pub fn dump(&self) {
        self.voxels.dump();
        for (index, entry) in self.types.iter().enumerate() {
            debug!(index, block = %entry.block.name, count = entry.count, "palette entry");
        }
    }

    /// Recomputes the bounding radius with a full walk.
    pub fn update_bounds(&mut self) {
        self.bb_radius = self
            .voxels
            .voxels()
            .map(|(pos, _)| voxel_radius(pos))
            .fold(0.0, f32::max);
    }

    // -- Persistence --------------------------------------------------------

    /// Rebuilds a grid from its persisted form, resolving block names through
    /// `registry`.
    ///
    /// Palette counts are recomputed from the voxels; stored counts that
    /// disagree are logged and corrected.
    pub fn from_snapshot(
        snapshot: GridSnapshot,
        registry: &BlockRegistry,
    ) -> Result<Self, GridError> {
        let mut types = snapshot
            .types
            .into_iter()
            .map(|record| {
                Ok(Type {
                    block: registry.lookup(&record.block)?,
                    count: record.count,
                })
            })
            .collect::<Result<Vec<_>, GridError>>()?;
        if types.len() > MAX_TYPES {
            return Err(GridError::PaletteFull(MAX_TYPES));
        }

        let mut counts = vec![0u32; types.len()];
        for (_, voxel) in snapshot.voxels.voxels() {
            let ty = voxel.ty();
            let count = counts
                .get_mut(ty as usize)
                .ok_or(GridError::UnknownType(ty))?;
            *count += 1;
            check_rotation(voxel.rotation())?;
            types[ty as usize]
                .block
                .check_shape(ShapeType::from_id(voxel.shape())?)?;
        }
        for (index, (entry, actual)) in types.iter_mut().zip(counts).enumerate() {
            if entry.count != actual {
                warn!(
                    index,
                    block = %entry.block.name,
                    stored = entry.count,
                    actual,
                    "palette count mismatch, repairing"
                );
                entry.count = actual;
            }
        }

        let mut grid = Self {
            voxels: snapshot.voxels,
            types,
            bb_radius: 0.0,
        };
        grid.update_bounds();
        Ok(grid)
    }
}

fn check_rotation(rotation: u8) -> Result<(), GridError> {
    if rotation as usize >= ROTATION_COUNT {
        return Err(GridError::BadRotation(rotation));
    }
    Ok(())
}

fn voxel_radius(pos: IVec3) -> f32 {
    pos.as_vec3().length() + VOXEL_RADIUS
}

// ---------------------------------------------------------------------------
// Persisted form
// ---------------------------------------------------------------------------

/// Persisted palette entry: the block is stored by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub block: String,
    pub count: u32,
}

/// Owned persisted form of a [`Grid`], before block names are resolved.
#[derive(Clone, Debug, Deserialize)]
pub struct GridSnapshot {
    pub voxels: Octree,
    pub types: Vec<TypeRecord>,
}

#[derive(Serialize)]
struct GridRecord<'a> {
    voxels: &'a Octree,
    types: Vec<TypeRecord>,
}

impl Serialize for Grid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GridRecord {
            voxels: &self.voxels,
            types: self
                .types
                .iter()
                .map(|t| TypeRecord {
                    block: t.block.name.clone(),
                    count: t.count,
                })
                .collect(),
        }
        .serialize(serializer)
    }
}
