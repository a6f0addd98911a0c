use glam::{IVec3, Vec3};
use nebula_grid::{
    Block, BlockKind, BlockMaterial, BlockRegistry, FaceMask, Grid, ParticlesInfo, SerialOptions,
    ShapeType, VoxelShapeCache, decode_grid, encode_grid,
};

fn registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register(Block::hull("steel", 1)).unwrap();
    registry
        .register(Block {
            name: "engine".to_string(),
            label: "Ion Engine".to_string(),
            category: "propulsion".to_string(),
            kind: BlockKind::Engine,
            shapes: vec![ShapeType::Cube],
            materials: vec![BlockMaterial {
                material: 2,
                faces: FaceMask::ALL,
            }],
            particles: Some(ParticlesInfo {
                offset: Vec3::new(0.0, 0.0, 0.5),
                effect: "ion_trail".to_string(),
            }),
        })
        .unwrap();
    registry
}

/// A 5×1×3 slab with two engines on the back edge.
fn ship(registry: &BlockRegistry) -> Grid {
    let steel = registry.lookup("steel").unwrap();
    let engine = registry.lookup("engine").unwrap();
    let mut grid = Grid::new();
    for x in -2..=2 {
        for z in -1..=1 {
            grid.insert(IVec3::new(x, 0, z), &steel, 0, 0, ShapeType::Cube).unwrap();
        }
    }
    grid.insert(IVec3::new(-2, 0, 2), &engine, 0, 0, ShapeType::Cube).unwrap();
    grid.insert(IVec3::new(2, 0, 2), &engine, 0, 0, ShapeType::Cube).unwrap();
    grid
}

#[test]
fn build_mesh_save_load() {
    let registry = registry();
    let shapes = VoxelShapeCache::new();
    let grid = ship(&registry);

    assert_eq!(grid.occupancy().len(), 17);
    assert_eq!(grid.type_count(), 2);

    let mesh = grid.generate_mesh(&shapes).unwrap();
    assert_eq!(mesh.thrusters.len(), 2);
    assert!(mesh.thrusters.iter().all(|t| t.particles == "ion_trail"));
    assert_eq!(mesh.indices.len() % 3, 0);

    let bytes = encode_grid(&grid, &SerialOptions::default()).unwrap();
    let loaded = decode_grid(&bytes, &registry).unwrap();
    assert_eq!(loaded.octree(), grid.octree());
    assert_eq!(loaded.octree().depth(), grid.octree().depth());
    assert_eq!(loaded.octree().size(), grid.octree().size());
    for (pos, voxel) in grid.voxels() {
        assert_eq!(loaded.find(pos), Some(voxel), "voxel at {pos} lost");
    }

    let reloaded_mesh = loaded.generate_mesh(&shapes).unwrap();
    assert_eq!(reloaded_mesh, mesh);
}

#[test]
fn raycast_then_place_adjacent() {
    let registry = registry();
    let steel = registry.lookup("steel").unwrap();
    let mut grid = ship(&registry);

    let hit = grid
        .ray_cast(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -5.0, 0.0))
        .expect("ray straight down hits the slab");
    assert_eq!(hit.pos, IVec3::ZERO);
    assert_eq!(hit.normal, Vec3::Y);
    assert_eq!(hit.adjacent(), IVec3::Y);

    grid.insert(hit.adjacent(), &steel, 0, 0, ShapeType::Wedge).unwrap();
    let again = grid
        .ray_cast(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -5.0, 0.0))
        .unwrap();
    assert_eq!(again.pos, IVec3::Y);
}

#[test]
fn clearing_grid_releases_palette() {
    let registry = registry();
    let mut grid = ship(&registry);
    let positions: Vec<_> = grid.occupancy();
    for pos in positions {
        assert!(grid.remove(pos).unwrap());
    }
    assert_eq!(grid.voxels().count(), 0);
    assert_eq!(grid.octree().size(), 1, "only the root remains");
    assert_eq!(grid.get_type_count(0).unwrap(), 0);
    assert_eq!(grid.get_type_count(1).unwrap(), 0);
    assert_eq!(grid.radius(), 0.0);
    assert!(grid.generate_mesh(&VoxelShapeCache::new()).unwrap().is_empty());
}
