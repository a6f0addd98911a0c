//! Block definitions and the name → block registry.
//!
//! A [`Block`] describes what a palette entry looks like: its materials, the
//! shapes it may take and, for engines, the exhaust particles. Grids hold
//! shared [`BlockRef`]s; the registry resolves names when a grid is loaded.

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::error::GridError;
use crate::face::{Face, FaceMask};
use crate::shape::ShapeType;

/// Shared handle to a registered block.
pub type BlockRef = Arc<Block>;

/// Functional category of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Structural block with no behaviour.
    #[default]
    Hull,
    /// Thruster; emits exhaust particles through its +Z face.
    Engine,
}

/// A material and the faces it is applied to.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockMaterial {
    /// Index into the renderer's material table.
    pub material: u32,
    /// Faces using this material, in the block's own frame.
    pub faces: FaceMask,
}

/// Exhaust description for engine blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticlesInfo {
    /// Emitter offset from the voxel center, in the block's own frame.
    pub offset: Vec3,
    /// Particle effect name.
    pub effect: String,
}

/// Definition of a placeable block.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub name: String,
    pub label: String,
    pub category: String,
    pub kind: BlockKind,
    /// Shapes this block may be placed as.
    pub shapes: Vec<ShapeType>,
    pub materials: Vec<BlockMaterial>,
    pub particles: Option<ParticlesInfo>,
}

impl Block {
    /// A single-material hull block available in every shape.
    pub fn hull(name: impl Into<String>, material: u32) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            category: "hull".to_string(),
            kind: BlockKind::Hull,
            shapes: ShapeType::ALL.to_vec(),
            materials: vec![BlockMaterial {
                material,
                faces: FaceMask::ALL,
            }],
            particles: None,
        }
    }

    /// Returns `true` when one material covers the whole block.
    pub fn is_singular(&self) -> bool {
        self.materials.len() == 1
    }

    /// Material used by every face of a singular block.
    pub fn material(&self) -> Option<u32> {
        self.is_singular().then(|| self.materials[0].material)
    }

    /// Material applied to `face` (in the block's own frame).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MissingMaterial`] if no material lists `face`.
    pub fn material_for_face(&self, face: Face) -> Result<u32, GridError> {
        if let Some(material) = self.material() {
            return Ok(material);
        }
        self.materials
            .iter()
            .find(|m| m.faces.contains(face))
            .map(|m| m.material)
            .ok_or_else(|| GridError::MissingMaterial {
                block: self.name.clone(),
                face: face.index(),
            })
    }

    /// Returns `true` if the block may be placed as `shape`.
    pub fn supports_shape(&self, shape: ShapeType) -> bool {
        self.shapes.contains(&shape)
    }

    /// Fails with [`GridError::UnsupportedShape`] unless the block lists `shape`.
    pub fn check_shape(&self, shape: ShapeType) -> Result<(), GridError> {
        if self.supports_shape(shape) {
            return Ok(());
        }
        Err(GridError::UnsupportedShape {
            block: self.name.clone(),
            shape: shape.name(),
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name → block lookup used when loading grids.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    blocks: FxHashMap<String, BlockRef>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `block` and returns its shared handle.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DuplicateBlock`] if the name is taken.
    pub fn register(&mut self, block: Block) -> Result<BlockRef, GridError> {
        if self.blocks.contains_key(&block.name) {
            return Err(GridError::DuplicateBlock(block.name));
        }
        let block = Arc::new(block);
        self.blocks.insert(block.name.clone(), Arc::clone(&block));
        Ok(block)
    }

    /// Returns the block registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<BlockRef, GridError> {
        self.blocks
            .get(name)
            .cloned()
            .ok_or_else(|| GridError::UnknownBlock(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
