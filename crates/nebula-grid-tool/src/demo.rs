//! Built-in blocks and a procedurally built demo hull.

use glam::{IVec3, Vec3};
use nebula_grid::{
    Block, BlockKind, BlockMaterial, BlockRegistry, Face, FaceMask, Grid, GridError,
    ParticlesInfo, ShapeType,
};

/// Rotation turning a block's +Z outlet towards −Z.
const FACING_BACK: u8 = 12;

/// Registry with the blocks every grid file written by this tool may use.
pub fn builtin_registry() -> Result<BlockRegistry, GridError> {
    let mut registry = BlockRegistry::new();
    registry.register(Block::hull("hull_steel", 1))?;
    registry.register(Block {
        name: "hull_plated".to_string(),
        label: "Plated Hull".to_string(),
        category: "hull".to_string(),
        kind: BlockKind::Hull,
        shapes: ShapeType::ALL.to_vec(),
        materials: vec![
            BlockMaterial {
                material: 2,
                faces: Face::PosY | Face::NegY,
            },
            BlockMaterial {
                material: 1,
                faces: FaceMask::ALL,
            },
        ],
        particles: None,
    })?;
    registry.register(Block {
        name: "engine_ion".to_string(),
        label: "Ion Engine".to_string(),
        category: "propulsion".to_string(),
        kind: BlockKind::Engine,
        shapes: vec![ShapeType::Cube],
        materials: vec![BlockMaterial {
            material: 3,
            faces: FaceMask::ALL,
        }],
        particles: Some(ParticlesInfo {
            offset: Vec3::new(0.0, 0.0, 0.5),
            effect: "ion_trail".to_string(),
        }),
    })?;
    Ok(registry)
}

/// Builds a flat hull of `(2 * size + 1)²` cells with a sloped bow, a plated
/// deck and one engine per stern corner.
pub fn demo_hull(registry: &BlockRegistry, size: u32) -> Result<Grid, GridError> {
    let steel = registry.lookup("hull_steel")?;
    let plated = registry.lookup("hull_plated")?;
    let engine = registry.lookup("engine_ion")?;

    let s = size.min(256) as i32;
    let mut grid = Grid::new();
    for x in -s..=s {
        for z in -s..=s {
            grid.insert(IVec3::new(x, 0, z), &steel, 0, 0, ShapeType::Cube)?;
        }
        grid.insert(IVec3::new(x, 0, s + 1), &steel, 0, 0, ShapeType::Wedge)?;
    }
    for x in -s / 2..=s / 2 {
        for z in -s / 2..=s / 2 {
            grid.insert(IVec3::new(x, 1, z), &plated, 0, 1, ShapeType::Cube)?;
        }
    }
    grid.insert(IVec3::new(-s, 0, -s - 1), &engine, FACING_BACK, 0, ShapeType::Cube)?;
    grid.insert(IVec3::new(s, 0, -s - 1), &engine, FACING_BACK, 0, ShapeType::Cube)?;

    tracing::debug!(size = s, voxels = grid.occupancy().len(), "Built demo hull");
    Ok(grid)
}
