//! Segment vs. axis-aligned box intersection used by octree raycasting.
//!
//! The octree descends only into children whose bounding cube is crossed by
//! the segment, so the whole cast is a sequence of slab tests against cubes of
//! halving size.

use glam::{IVec3, Vec3};

use crate::node::Voxel;

/// Result of a successful raycast against the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastResult {
    /// The voxel that was hit.
    pub voxel: Voxel,
    /// Unit normal of the face the segment entered through.
    pub normal: Vec3,
    /// Entry point on the voxel's surface, in grid-local coordinates.
    pub hit_pos: Vec3,
    /// Integer grid position of the hit voxel.
    pub pos: IVec3,
    /// Center of the hit voxel's cube.
    pub world_pos: Vec3,
    /// Integer face normal. `pos + orientation` is the empty cell in front of the hit face.
    pub orientation: IVec3,
}

impl RayCastResult {
    /// Cell adjacent to the hit face, where a new voxel would be placed.
    pub fn adjacent(&self) -> IVec3 {
        self.pos + self.orientation
    }
}

/// Intersects the segment `from..to` with the box `[min, max]`.
///
/// Returns the point where the segment enters the box, or `from` itself when the
/// segment starts inside. Returns `None` when the box is missed or lies entirely
/// beyond `to`.
pub fn intersect_box(min: Vec3, max: Vec3, from: Vec3, to: Vec3) -> Option<Vec3> {
    let delta = to - from;
    let length = delta.length();
    if length <= f32::EPSILON {
        let inside = from.cmpge(min).all() && from.cmple(max).all();
        return inside.then_some(from);
    }
    let dir = delta / length;

    let mut t_min = 0.0f32;
    let mut t_max = length;
    for axis in 0..3 {
        if dir[axis].abs() < 1e-8 {
            if from[axis] < min[axis] || from[axis] > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut t0 = (min[axis] - from[axis]) * inv;
        let mut t1 = (max[axis] - from[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some(from + dir * t_min)
}

/// Maps a hit point relative to a unit cube's center onto the face it lies on.
///
/// Axes are tested in the order +X, -X, +Y, -Y, +Z; anything left is -Z.
pub fn face_normal(relative: Vec3) -> Vec3 {
    const EDGE: f32 = 0.49;
    if relative.x >= EDGE {
        Vec3::X
    } else if relative.x <= -EDGE {
        Vec3::NEG_X
    } else if relative.y >= EDGE {
        Vec3::Y
    } else if relative.y <= -EDGE {
        Vec3::NEG_Y
    } else if relative.z >= EDGE {
        Vec3::Z
    } else {
        Vec3::NEG_Z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Vec3 = Vec3::splat(-0.5);
    const MAX: Vec3 = Vec3::splat(0.5);

    #[test]
    fn test_axis_aligned_hit() {
        let hit = intersect_box(MIN, MAX, Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -5.0));
        let hit = hit.expect("segment through the cube must hit");
        assert!((hit - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-5, "hit at {hit}");
    }

    #[test]
    fn test_parallel_miss() {
        let hit = intersect_box(MIN, MAX, Vec3::new(2.0, 0.0, 5.0), Vec3::new(2.0, 0.0, -5.0));
        assert!(hit.is_none());
    }

    #[test]
    fn test_segment_too_short() {
        let hit = intersect_box(MIN, MAX, Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(hit.is_none(), "box lies beyond the segment end");
    }

    #[test]
    fn test_box_behind_start() {
        let hit = intersect_box(MIN, MAX, Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 10.0));
        assert!(hit.is_none());
    }

    #[test]
    fn test_start_inside() {
        let from = Vec3::new(0.1, 0.1, 0.1);
        assert_eq!(intersect_box(MIN, MAX, from, Vec3::new(4.0, 0.0, 0.0)), Some(from));
    }

    #[test]
    fn test_diagonal_hit() {
        let hit = intersect_box(MIN, MAX, Vec3::new(3.0, 3.0, 0.0), Vec3::new(-3.0, -3.0, 0.0));
        let hit = hit.unwrap();
        assert!((hit - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_face_normal_order() {
        assert_eq!(face_normal(Vec3::new(0.5, 0.0, 0.0)), Vec3::X);
        assert_eq!(face_normal(Vec3::new(-0.5, 0.2, 0.0)), Vec3::NEG_X);
        assert_eq!(face_normal(Vec3::new(0.0, 0.5, 0.0)), Vec3::Y);
        assert_eq!(face_normal(Vec3::new(0.0, -0.5, 0.0)), Vec3::NEG_Y);
        assert_eq!(face_normal(Vec3::new(0.0, 0.0, 0.5)), Vec3::Z);
        assert_eq!(face_normal(Vec3::new(0.0, 0.0, -0.5)), Vec3::NEG_Z);
        // Edge hits resolve to the first matching axis.
        assert_eq!(face_normal(Vec3::new(0.5, 0.5, 0.0)), Vec3::X);
    }
}
