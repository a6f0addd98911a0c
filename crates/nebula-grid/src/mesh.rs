//! Mesh generation for a [`Grid`].
//!
//! The tree is cut into blocks of at most [`MESH_BUILD_WIDTH`]³ cells. Each
//! block is copied into a dense buffer with a one-cell halo so neighbours
//! across block boundaries are visible to face culling, then every voxel emits
//! the prebuilt geometry of its shape for the faces left uncovered.
//!
//! ## Vertex layout
//!
//! | Offset | Field      | Type       |
//! |--------|------------|------------|
//! | 0      | position   | `[f32; 3]` |
//! | 12     | normal     | `[f32; 3]` |
//! | 24     | tex_coords | `[f32; 2]` |
//! | 32     | tangent    | `[f32; 4]` |
//! | 48     | material   | `u32`      |

use glam::{IVec3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::block::BlockKind;
use crate::cursor::{Cursor, Voxels};
use crate::error::GridError;
use crate::face::{Face, FaceMask};
use crate::grid::Grid;
use crate::node::Voxel;
use crate::shape::ShapeType;
use crate::shape_cache::VoxelShapeCache;

/// Largest branch width meshed as one block.
pub const MESH_BUILD_WIDTH: i32 = 16;

/// Edge of the dense block buffer, including the halo.
pub const CACHE_BUILD_WIDTH: i32 = MESH_BUILD_WIDTH + 2;

const CACHE_LEN: usize = (CACHE_BUILD_WIDTH * CACHE_BUILD_WIDTH * CACHE_BUILD_WIDTH) as usize;

/// Final mesh vertex, ready for upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexFinal {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    /// Tangent with handedness in `w`.
    pub tangent: [f32; 4],
    /// Material index taken from the block definition.
    pub material: u32,
}

static_assertions::assert_eq_size!(VertexFinal, [u8; 52]);

/// Exhaust emitter of an engine block whose outlet is not obstructed.
#[derive(Clone, Debug, PartialEq)]
pub struct ThrusterInfo {
    /// Emitter transform in grid space.
    pub mat: Mat4,
    /// Particle effect name.
    pub particles: String,
}

/// Output of a mesh build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlocksData {
    pub vertices: Vec<VertexFinal>,
    pub indices: Vec<u32>,
    pub thrusters: Vec<ThrusterInfo>,
}

impl BlocksData {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.thrusters.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Texture projection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshOptions {
    /// World units to UV units.
    pub uv_scale: f32,
    /// Added to every projected coordinate.
    pub uv_offset: f32,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            uv_scale: 0.25,
            uv_offset: 0.5,
        }
    }
}

/// Projects `position` onto the plane of the dominant axis of `normal`.
pub fn box_projection(normal: Vec3, position: Vec3, options: &MeshOptions) -> Vec2 {
    let abs = normal.abs();
    let project = |u: f32, v: f32| Vec2::new(u, v) * options.uv_scale + options.uv_offset;
    let flip = |uv: Vec2| Vec2::new(uv.x, 1.0 - uv.y);

    if abs.x > abs.y && abs.x > abs.z {
        let uv = project(position.y, position.z);
        if normal.x >= 0.0 { flip(uv) } else { uv }
    } else if abs.y > abs.z {
        if normal.y >= 0.0 {
            flip(project(position.z, position.x))
        } else {
            flip(project(position.x, position.z))
        }
    } else {
        let uv = project(position.y, position.x);
        if normal.z >= 0.0 { uv } else { flip(uv) }
    }
}

impl Grid {
    /// Builds the render mesh with default texture projection.
    pub fn generate_mesh(&self, shapes: &VoxelShapeCache) -> Result<BlocksData, GridError> {
        self.generate_mesh_with(shapes, &MeshOptions::default())
    }

    /// Builds the render mesh.
    ///
    /// # Errors
    ///
    /// Fails on voxels with an unknown shape or rotation, on multi-material
    /// blocks lacking a material for a visible face, and on malformed
    /// prebuilt geometry.
    pub fn generate_mesh_with(
        &self,
        shapes: &VoxelShapeCache,
        options: &MeshOptions,
    ) -> Result<BlocksData, GridError> {
        let mut builder = MeshBuilder {
            grid: self,
            shapes,
            options,
            cache: vec![None; CACHE_LEN],
            unknown_types: FxHashSet::default(),
            out: BlocksData::default(),
        };
        builder.walk(self.iterate())?;

        let out = builder.out;
        debug!(
            vertices = out.vertices.len(),
            triangles = out.triangle_count(),
            thrusters = out.thrusters.len(),
            "Generated grid mesh"
        );
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct MeshBuilder<'a> {
    grid: &'a Grid,
    shapes: &'a VoxelShapeCache,
    options: &'a MeshOptions,
    /// Dense copy of the current block plus halo.
    cache: Vec<Option<Voxel>>,
    /// Palette indices already reported as missing.
    unknown_types: FxHashSet<u16>,
    out: BlocksData,
}

fn cache_index(local: IVec3) -> usize {
    let w = CACHE_BUILD_WIDTH;
    (local.z * w * w + local.y * w + local.x) as usize
}

impl MeshBuilder<'_> {
    fn walk(&mut self, mut cursor: Cursor<'_>) -> Result<(), GridError> {
        while cursor.is_valid() {
            if !cursor.is_voxel() {
                if cursor.branch_width() <= MESH_BUILD_WIDTH {
                    self.build_block(cursor)?;
                } else {
                    self.walk(cursor.children())?;
                }
            }
            cursor.advance();
        }
        Ok(())
    }

    /// Fills the cache for one branch and emits its voxels.
    fn build_block(&mut self, branch: Cursor<'_>) -> Result<(), GridError> {
        let width = branch.branch_width();
        let min = branch.pos() - IVec3::splat(width / 2);

        self.cache.fill(None);
        for (pos, voxel) in Voxels::within(branch) {
            self.cache[cache_index(pos - min + IVec3::ONE)] = Some(voxel);
        }
        self.fill_halo(min, width);

        for z in 1..=width {
            for y in 1..=width {
                for x in 1..=width {
                    let local = IVec3::new(x, y, z);
                    if let Some(voxel) = self.cache[cache_index(local)] {
                        self.emit_voxel(voxel, local, min + local - IVec3::ONE)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Looks up the six one-cell slabs surrounding the block.
    fn fill_halo(&mut self, min: IVec3, width: i32) {
        let octree = self.grid.octree();
        for axis in 0..3 {
            for layer in [0, width + 1] {
                for a in 1..=width {
                    for b in 1..=width {
                        let mut local = IVec3::ZERO;
                        local[axis] = layer;
                        local[(axis + 1) % 3] = a;
                        local[(axis + 2) % 3] = b;
                        self.cache[cache_index(local)] = octree.find(min + local - IVec3::ONE);
                    }
                }
            }
        }
    }

    fn neighbour(&self, local: IVec3, face: Face) -> Option<Voxel> {
        self.cache[cache_index(local + face.offset())]
    }

    fn visible_faces(&self, local: IVec3) -> Result<FaceMask, GridError> {
        let mut mask = FaceMask::NONE;
        for face in Face::ALL {
            let covered = match self.neighbour(local, face) {
                None => false,
                Some(other) => self
                    .shapes
                    .world_full_faces(ShapeType::from_id(other.shape())?, other.rotation())?
                    .contains(face.opposite()),
            };
            if !covered {
                mask.insert(face);
            }
        }
        Ok(mask)
    }

    fn emit_voxel(&mut self, voxel: Voxel, local: IVec3, pos: IVec3) -> Result<(), GridError> {
        let ty = voxel.ty();
        let Some(entry) = self.grid.types().get(ty as usize) else {
            if self.unknown_types.insert(ty) {
                warn!(ty, "Voxel references unknown palette entry, skipping");
            }
            return Ok(());
        };
        let block = &entry.block;
        let shape = ShapeType::from_id(voxel.shape())?;
        let rotation = voxel.rotation();

        let mask = self.visible_faces(local)?;
        let prebuilt = self.shapes.get(shape, rotation, mask)?;
        if prebuilt.indices.len() % 3 != 0 {
            return Err(GridError::MalformedGeometry(prebuilt.indices.len()));
        }

        let base = self.out.vertices.len() as u32;
        let offset = pos.as_vec3();
        for vertex in &prebuilt.vertices {
            let position = vertex.position + offset;
            self.out.vertices.push(VertexFinal {
                position: position.to_array(),
                normal: vertex.normal.to_array(),
                tex_coords: box_projection(vertex.normal, position, self.options).to_array(),
                tangent: Vec4::X.to_array(),
                material: block.material_for_face(vertex.face)?,
            });
        }

        let first_index = self.out.indices.len();
        self.out
            .indices
            .extend(prebuilt.indices.iter().map(|&i| base + i));
        apply_tangents(&mut self.out.vertices, &self.out.indices[first_index..]);

        if block.kind == BlockKind::Engine {
            if let Some(particles) = &block.particles {
                let rotation = *self.shapes.rotation(rotation)?;
                self.out.thrusters.push(ThrusterInfo {
                    mat: Mat4::from_translation(offset)
                        * rotation
                        * Mat4::from_translation(particles.offset),
                    particles: particles.effect.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Assigns each triangle's UV-space tangent to its three vertices.
fn apply_tangents(vertices: &mut [VertexFinal], indices: &[u32]) {
    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = Vec3::from(vertices[i0].position);
        let uv0 = Vec2::from(vertices[i0].tex_coords);

        let dp1 = Vec3::from(vertices[i1].position) - p0;
        let dp2 = Vec3::from(vertices[i2].position) - p0;
        let du1 = Vec2::from(vertices[i1].tex_coords) - uv0;
        let du2 = Vec2::from(vertices[i2].tex_coords) - uv0;

        let det = du1.x * du2.y - du1.y * du2.x;
        let tangent = if det.abs() < 1e-8 {
            Vec4::X
        } else {
            let t = (dp1 * du2.y - dp2 * du1.y) / det;
            t.try_normalize().unwrap_or(Vec3::X).extend(1.0)
        };

        for i in [i0, i1, i2] {
            vertices[i].tangent = tangent.to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytemuck::Zeroable;

    use super::*;
    use crate::block::{Block, BlockMaterial, BlockRef, BlockRegistry, ParticlesInfo};

    fn steel() -> BlockRef {
        BlockRegistry::new().register(Block::hull("steel", 1)).unwrap()
    }

    fn engine() -> BlockRef {
        Arc::new(Block {
            name: "engine".to_string(),
            label: "Engine".to_string(),
            category: "propulsion".to_string(),
            kind: BlockKind::Engine,
            shapes: vec![ShapeType::Cube],
            materials: vec![BlockMaterial {
                material: 9,
                faces: FaceMask::ALL,
            }],
            particles: Some(ParticlesInfo {
                offset: Vec3::ZERO,
                effect: "exhaust_blue".to_string(),
            }),
        })
    }

    fn cubes(positions: &[IVec3]) -> Grid {
        let block = steel();
        let mut grid = Grid::new();
        for &pos in positions {
            grid.insert(pos, &block, 0, 0, ShapeType::Cube).unwrap();
        }
        grid
    }

    #[test]
    fn test_vertex_is_pod() {
        let v = VertexFinal::zeroed();
        assert_eq!(bytemuck::bytes_of(&v).len(), 52);
    }

    #[test]
    fn test_empty_grid_has_no_mesh() {
        let mesh = Grid::new().generate_mesh(&VoxelShapeCache::new()).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_single_cube_has_six_faces() {
        let shapes = VoxelShapeCache::new();
        let mesh = cubes(&[IVec3::ZERO]).generate_mesh(&shapes).unwrap();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.vertices.iter().all(|v| v.material == 1));
        for v in &mesh.vertices {
            assert!(Vec3::from(v.position).abs().cmple(Vec3::splat(0.5)).all());
        }
    }

    #[test]
    fn test_two_adjacent_cubes_share_hidden_faces() {
        let shapes = VoxelShapeCache::new();
        let mesh = cubes(&[IVec3::ZERO, IVec3::X]).generate_mesh(&shapes).unwrap();
        assert_eq!(mesh.vertices.len(), 40, "10 visible faces");
        assert_eq!(mesh.triangle_count(), 20);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_culling_across_block_boundary() {
        let shapes = VoxelShapeCache::new();
        // Cells 15 and 16 land in different 16-wide mesh blocks.
        let mesh = cubes(&[IVec3::new(15, 0, 0), IVec3::new(16, 0, 0)])
            .generate_mesh(&shapes)
            .unwrap();
        assert_eq!(mesh.vertices.len(), 40);
    }

    #[test]
    fn test_wedge_floor_hides_cube_below() {
        let shapes = VoxelShapeCache::new();
        let block = steel();
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &block, 0, 0, ShapeType::Wedge).unwrap();
        grid.insert(IVec3::NEG_Y, &block, 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        // Cube: 5 quads. Wedge: back quad, slope quad, two side triangles.
        assert_eq!(mesh.vertices.len(), 20 + 14);
        assert_eq!(mesh.indices.len(), 30 + 18);
    }

    #[test]
    fn test_slope_does_not_hide_neighbour() {
        let shapes = VoxelShapeCache::new();
        let block = steel();
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &block, 0, 0, ShapeType::Wedge).unwrap();
        grid.insert(IVec3::Y, &block, 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        // The cube keeps its bottom face; the wedge slope stays visible through +Z.
        assert_eq!(mesh.vertices.len(), 24 + 18);
    }

    #[test]
    fn test_per_face_materials() {
        let shapes = VoxelShapeCache::new();
        let block = Arc::new(Block {
            name: "panel".to_string(),
            label: "Panel".to_string(),
            category: "hull".to_string(),
            kind: BlockKind::Hull,
            shapes: vec![ShapeType::Cube],
            materials: vec![
                BlockMaterial {
                    material: 3,
                    faces: FaceMask::of(Face::PosY),
                },
                BlockMaterial {
                    material: 4,
                    faces: FaceMask::ALL,
                },
            ],
            particles: None,
        });
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &block, 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        for v in &mesh.vertices {
            let expected = if v.normal[1] > 0.5 { 3 } else { 4 };
            assert_eq!(v.material, expected);
        }
    }

    #[test]
    fn test_missing_face_material_fails() {
        let shapes = VoxelShapeCache::new();
        let block = Arc::new(Block {
            name: "broken".to_string(),
            label: "Broken".to_string(),
            category: "hull".to_string(),
            kind: BlockKind::Hull,
            shapes: vec![ShapeType::Cube],
            materials: vec![
                BlockMaterial {
                    material: 3,
                    faces: FaceMask::of(Face::PosY),
                },
                BlockMaterial {
                    material: 4,
                    faces: FaceMask::of(Face::NegY),
                },
            ],
            particles: None,
        });
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &block, 0, 0, ShapeType::Cube).unwrap();

        let err = grid.generate_mesh(&shapes).unwrap_err();
        assert!(matches!(err, GridError::MissingMaterial { .. }), "got {err:?}");
    }

    #[test]
    fn test_tangents_are_unit_length() {
        let shapes = VoxelShapeCache::new();
        let mesh = cubes(&[IVec3::ZERO, IVec3::new(-2, 1, 0)])
            .generate_mesh(&shapes)
            .unwrap();
        for v in &mesh.vertices {
            let t = Vec4::from(v.tangent);
            assert!((t.truncate().length() - 1.0).abs() < 1e-4);
            assert!(t.truncate().dot(Vec3::from(v.normal)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_box_projection() {
        let options = MeshOptions::default();
        let uv = box_projection(Vec3::Y, Vec3::new(1.0, 0.0, 2.0), &options);
        assert_eq!(uv, Vec2::new(1.0, 0.25));
        let uv = box_projection(Vec3::NEG_X, Vec3::new(0.0, 2.0, -2.0), &options);
        assert_eq!(uv, Vec2::new(1.0, 0.0));
        let uv = box_projection(Vec3::Z, Vec3::new(2.0, -2.0, 0.0), &options);
        assert_eq!(uv, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_engine_emits_thruster() {
        let shapes = VoxelShapeCache::new();
        let mut grid = Grid::new();
        grid.insert(IVec3::new(1, 0, 0), &engine(), 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        assert_eq!(mesh.thrusters.len(), 1);
        assert_eq!(mesh.thrusters[0].particles, "exhaust_blue");
        assert_eq!(
            mesh.thrusters[0].mat.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_enclosed_engine_still_emits_thruster() {
        let shapes = VoxelShapeCache::new();
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &engine(), 0, 0, ShapeType::Cube).unwrap();
        for face in Face::ALL {
            grid.insert(face.offset(), &steel(), 0, 0, ShapeType::Cube).unwrap();
        }

        let mesh = grid.generate_mesh(&shapes).unwrap();
        assert_eq!(mesh.thrusters.len(), 1);
        assert_eq!(mesh.thrusters[0].mat.transform_point3(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_rotated_engine_thruster_matrix() {
        let shapes = VoxelShapeCache::new();
        let mut block = (*engine()).clone();
        block.particles = Some(ParticlesInfo {
            offset: Vec3::new(0.0, 0.0, 0.5),
            effect: "exhaust_blue".to_string(),
        });
        let block = Arc::new(block);
        let mut grid = Grid::new();
        // Rotation 4 tilts +Z down onto -Y.
        grid.insert(IVec3::new(2, 1, 0), &block, 4, 0, ShapeType::Cube).unwrap();
        grid.insert(IVec3::new(2, 0, 0), &steel(), 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        assert_eq!(mesh.thrusters.len(), 1);
        let mat = mesh.thrusters[0].mat;
        let emitter = mat.transform_point3(Vec3::ZERO);
        assert!(emitter.abs_diff_eq(Vec3::new(2.0, 0.5, 0.0), 1e-6), "emitter at {emitter}");
        let outlet = mat.transform_vector3(Vec3::Z);
        assert!(outlet.abs_diff_eq(Vec3::NEG_Y, 1e-6), "outlet {outlet}");
    }

    #[test]
    fn test_engine_without_particles_emits_nothing() {
        let shapes = VoxelShapeCache::new();
        let mut block = (*engine()).clone();
        block.particles = None;
        let mut grid = Grid::new();
        grid.insert(IVec3::ZERO, &Arc::new(block), 0, 0, ShapeType::Cube).unwrap();

        let mesh = grid.generate_mesh(&shapes).unwrap();
        assert!(mesh.thrusters.is_empty());
        assert!(!mesh.indices.is_empty());
    }
}
