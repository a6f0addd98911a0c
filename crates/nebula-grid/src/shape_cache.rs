//! Precomputed per-shape geometry for every rotation and visibility mask.
//!
//! A voxel's shape, rotation and set of visible faces fully determine its
//! triangles, so the mesher never clips or rotates at runtime. The cache holds
//! `4 shapes × 24 rotations × 64 masks` prebuilt entries, plus the mask
//! remapping tables used to test neighbour occlusion in world space.

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::error::GridError;
use crate::face::{Face, FaceMask};
use crate::shape::ShapeType;

/// Number of distinct voxel orientations.
pub const ROTATION_COUNT: usize = 24;

const MASK_COUNT: usize = 64;

/// A vertex of a prebuilt shape, already rotated into grid orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeVertex {
    /// Position relative to the voxel center.
    pub position: Vec3,
    /// Rotated outward normal.
    pub normal: Vec3,
    /// Face of the unrotated shape, used to pick the block material.
    pub face: Face,
}

/// Triangles of one shape for one rotation and visibility mask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapePrebuilt {
    pub vertices: Vec<ShapeVertex>,
    pub indices: Vec<u32>,
}

impl ShapePrebuilt {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Lookup tables shared by every mesh build.
pub struct VoxelShapeCache {
    rotations: [Mat4; ROTATION_COUNT],
    local_to_world: Vec<[FaceMask; MASK_COUNT]>,
    world_to_local: Vec<[FaceMask; MASK_COUNT]>,
    prebuilt: Vec<Vec<ShapePrebuilt>>,
}

impl VoxelShapeCache {
    /// Builds every table. Meant to be done once and shared.
    pub fn new() -> Self {
        let rotations = build_rotations();

        let mut local_to_world = Vec::with_capacity(ROTATION_COUNT);
        let mut world_to_local = Vec::with_capacity(ROTATION_COUNT);
        for rotation in &rotations {
            local_to_world.push(build_mask_table(rotation));
            world_to_local.push(build_mask_table(&rotation.inverse()));
        }

        let prebuilt = ShapeType::ALL
            .iter()
            .map(|&shape| {
                let polygons = shape.polygons();
                let mut entries = Vec::with_capacity(ROTATION_COUNT * MASK_COUNT);
                for (r, rotation) in rotations.iter().enumerate() {
                    for world_mask in 0..MASK_COUNT {
                        let local = world_to_local[r][world_mask];
                        entries.push(build_prebuilt(&polygons, rotation, local));
                    }
                }
                entries
            })
            .collect::<Vec<_>>();

        debug!(
            shapes = ShapeType::ALL.len(),
            rotations = ROTATION_COUNT,
            "Built voxel shape cache"
        );

        Self {
            rotations,
            local_to_world,
            world_to_local,
            prebuilt,
        }
    }

    /// Rotation matrix for a stored rotation id.
    pub fn rotation(&self, rotation: u8) -> Result<&Mat4, GridError> {
        self.rotations
            .get(rotation as usize)
            .ok_or(GridError::BadRotation(rotation))
    }

    /// Maps a mask in the shape's own frame to grid directions.
    pub fn local_to_world(&self, mask: FaceMask, rotation: u8) -> Result<FaceMask, GridError> {
        self.local_to_world
            .get(rotation as usize)
            .map(|table| table[mask.bits() as usize])
            .ok_or(GridError::BadRotation(rotation))
    }

    /// Maps a mask in grid directions into the shape's own frame.
    pub fn world_to_local(&self, mask: FaceMask, rotation: u8) -> Result<FaceMask, GridError> {
        self.world_to_local
            .get(rotation as usize)
            .map(|table| table[mask.bits() as usize])
            .ok_or(GridError::BadRotation(rotation))
    }

    /// Faces of the grid cell a rotated shape covers completely.
    pub fn world_full_faces(&self, shape: ShapeType, rotation: u8) -> Result<FaceMask, GridError> {
        self.local_to_world(shape.full_faces(), rotation)
    }

    /// Prebuilt triangles for `shape` under `rotation`, keeping only polygons
    /// exposed through a face in `world_mask`.
    pub fn get(
        &self,
        shape: ShapeType,
        rotation: u8,
        world_mask: FaceMask,
    ) -> Result<&ShapePrebuilt, GridError> {
        if rotation as usize >= ROTATION_COUNT {
            return Err(GridError::BadRotation(rotation));
        }
        let slot = rotation as usize * MASK_COUNT + world_mask.bits() as usize;
        Ok(&self.prebuilt[shape.id() as usize][slot])
    }
}

impl Default for VoxelShapeCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Table construction
// ---------------------------------------------------------------------------

/// Rotation `i` is `B[i % 6] * A[i / 6]`: a yaw about Y followed by one of six
/// "up" directions (four rolls about Z, then ±90° about X).
fn build_rotations() -> [Mat4; ROTATION_COUNT] {
    use std::f32::consts::FRAC_PI_2;

    let yaw: [Mat4; 4] = std::array::from_fn(|i| Mat4::from_rotation_y(FRAC_PI_2 * i as f32));
    let up: [Mat4; 6] = [
        Mat4::IDENTITY,
        Mat4::from_rotation_z(FRAC_PI_2),
        Mat4::from_rotation_z(FRAC_PI_2 * 2.0),
        Mat4::from_rotation_z(FRAC_PI_2 * 3.0),
        Mat4::from_rotation_x(FRAC_PI_2),
        Mat4::from_rotation_x(-FRAC_PI_2),
    ];

    std::array::from_fn(|i| snap_matrix(up[i % 6] * yaw[i / 6]))
}

/// Rounds every entry so quarter-turn matrices are exact.
fn snap_matrix(m: Mat4) -> Mat4 {
    Mat4::from_cols_array(&m.to_cols_array().map(f32::round))
}

/// Remaps each of the 64 masks through `rotation`.
fn build_mask_table(rotation: &Mat4) -> [FaceMask; MASK_COUNT] {
    let mapped: [Face; 6] = Face::ALL.map(|face| {
        let dir = rotation.transform_vector3(face.normal());
        // Quarter turns map axes onto axes.
        Face::from_direction(dir).unwrap_or(face)
    });

    std::array::from_fn(|bits| {
        FaceMask::from_bits(bits as u8)
            .faces()
            .fold(FaceMask::NONE, |acc, face| acc | mapped[face.index()])
    })
}

fn build_prebuilt(
    polygons: &[crate::shape::Polygon],
    rotation: &Mat4,
    local_mask: FaceMask,
) -> ShapePrebuilt {
    let mut out = ShapePrebuilt::default();
    for poly in polygons {
        if !poly.exposure.intersects(local_mask) {
            continue;
        }
        let base = out.vertices.len() as u32;
        let normal = rotation.transform_vector3(poly.normal).normalize_or_zero();
        for &point in &poly.points {
            let position = (rotation.transform_point3(point) * 2.0).round() * 0.5;
            out.vertices.push(ShapeVertex {
                position,
                normal,
                face: poly.face,
            });
        }
        out.indices
            .extend(poly.triangulate().into_iter().map(|i| base + i));
    }
    out
}
