//! Voxel shapes: the solid each voxel occupies inside its unit cell.
//!
//! Shapes are described as convex polygons in a unit cube centred on the
//! origin. Each polygon is tagged with the cube faces it is exposed through:
//! a polygon lying on the cube boundary belongs to that face, while a slanted
//! polygon inside the cell is exposed through every face it can be seen from.
//! A polygon is emitted when any of its exposure faces is visible.

use glam::Vec3;

use crate::error::GridError;
use crate::face::{Face, FaceMask};

/// Available voxel shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShapeType {
    /// Full cube.
    Cube = 0,
    /// Half cube cut along the diagonal of the +Y/+Z edge.
    Wedge = 1,
    /// Tetrahedron in the −X/−Y/−Z corner.
    Corner = 2,
    /// Cube with the +X/+Y/+Z corner cut off.
    Penta = 3,
}

impl ShapeType {
    /// All shapes, in id order.
    pub const ALL: [ShapeType; 4] = [Self::Cube, Self::Wedge, Self::Corner, Self::Penta];

    /// Shape for a stored 5-bit id.
    pub fn from_id(id: u8) -> Result<Self, GridError> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(GridError::UnknownShape(id))
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::Wedge => "wedge",
            Self::Corner => "corner",
            Self::Penta => "penta",
        }
    }

    /// Faces of the unit cell this shape covers completely, in its own frame.
    pub fn full_faces(self) -> FaceMask {
        match self {
            Self::Cube => FaceMask::ALL,
            Self::Wedge => Face::NegY | Face::NegZ,
            Self::Corner => FaceMask::NONE,
            Self::Penta => Face::NegX | Face::NegY | Face::NegZ,
        }
    }

    /// Boundary polygons of the shape.
    pub fn polygons(self) -> Vec<Polygon> {
        match self {
            Self::Cube => Face::ALL.into_iter().map(Polygon::cube_face).collect(),
            Self::Wedge => vec![
                Polygon::cube_face(Face::NegY),
                Polygon::cube_face(Face::NegZ),
                Polygon::slanted(
                    Face::PosY,
                    Face::PosY | Face::PosZ,
                    Vec3::new(0.0, 1.0, 1.0),
                    vec![p(-1, 1, -1), p(1, 1, -1), p(1, -1, 1), p(-1, -1, 1)],
                ),
                Polygon::boundary(Face::PosX, vec![p(1, -1, -1), p(1, 1, -1), p(1, -1, 1)]),
                Polygon::boundary(Face::NegX, vec![p(-1, -1, -1), p(-1, 1, -1), p(-1, -1, 1)]),
            ],
            Self::Corner => vec![
                Polygon::boundary(Face::NegZ, vec![p(-1, -1, -1), p(1, -1, -1), p(-1, 1, -1)]),
                Polygon::boundary(Face::NegY, vec![p(-1, -1, -1), p(1, -1, -1), p(-1, -1, 1)]),
                Polygon::boundary(Face::NegX, vec![p(-1, -1, -1), p(-1, 1, -1), p(-1, -1, 1)]),
                Polygon::slanted(
                    Face::PosY,
                    Face::PosX | Face::PosY | Face::PosZ,
                    Vec3::ONE,
                    vec![p(1, -1, -1), p(-1, 1, -1), p(-1, -1, 1)],
                ),
            ],
            Self::Penta => vec![
                Polygon::cube_face(Face::NegX),
                Polygon::cube_face(Face::NegY),
                Polygon::cube_face(Face::NegZ),
                Polygon::boundary(Face::PosX, vec![p(1, -1, -1), p(1, 1, -1), p(1, -1, 1)]),
                Polygon::boundary(Face::PosY, vec![p(-1, 1, -1), p(1, 1, -1), p(-1, 1, 1)]),
                Polygon::boundary(Face::PosZ, vec![p(-1, -1, 1), p(1, -1, 1), p(-1, 1, 1)]),
                Polygon::slanted(
                    Face::PosY,
                    Face::PosX | Face::PosY | Face::PosZ,
                    Vec3::ONE,
                    vec![p(1, 1, -1), p(1, -1, 1), p(-1, 1, 1)],
                ),
            ],
        }
    }
}

/// Corner of the unit cell from half-unit signs.
fn p(x: i8, y: i8, z: i8) -> Vec3 {
    Vec3::new(x as f32, y as f32, z as f32) * 0.5
}

/// A convex polygon of a shape's surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    /// Face used to pick the block material.
    pub face: Face,
    /// Faces this polygon is visible through.
    pub exposure: FaceMask,
    /// Outward unit normal.
    pub normal: Vec3,
    /// Vertices in any winding; triangulation fixes the orientation.
    pub points: Vec<Vec3>,
}

impl Polygon {
    fn boundary(face: Face, points: Vec<Vec3>) -> Self {
        Self {
            face,
            exposure: FaceMask::of(face),
            normal: face.normal(),
            points,
        }
    }

    fn slanted(face: Face, exposure: FaceMask, normal: Vec3, points: Vec<Vec3>) -> Self {
        Self {
            face,
            exposure,
            normal: normal.normalize(),
            points,
        }
    }

    /// The full square on a face of the cell.
    fn cube_face(face: Face) -> Self {
        let n = face.normal();
        let (u, v) = match face {
            Face::PosX | Face::NegX => (Vec3::Y, Vec3::Z),
            Face::PosY | Face::NegY => (Vec3::Z, Vec3::X),
            Face::PosZ | Face::NegZ => (Vec3::X, Vec3::Y),
        };
        let center = n * 0.5;
        let points = vec![
            center - u * 0.5 - v * 0.5,
            center + u * 0.5 - v * 0.5,
            center + u * 0.5 + v * 0.5,
            center - u * 0.5 + v * 0.5,
        ];
        Self::boundary(face, points)
    }

    /// Fan triangulation with counter-clockwise winding around the normal.
    ///
    /// Returns indices relative to `points`.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::with_capacity((self.points.len().saturating_sub(2)) * 3);
        if self.points.len() < 3 {
            return indices;
        }
        let a = self.points[0];
        let winding = (self.points[1] - a).cross(self.points[2] - a).dot(self.normal);
        for i in 1..self.points.len() as u32 - 1 {
            if winding >= 0.0 {
                indices.extend_from_slice(&[0, i, i + 1]);
            } else {
                indices.extend_from_slice(&[0, i + 1, i]);
            }
        }
        indices
    }
}
