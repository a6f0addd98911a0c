//! The six faces of a voxel cube and bitmasks over them.

use glam::{IVec3, Vec3};

/// One of the six axis-aligned faces of a voxel.
///
/// The `repr(u8)` discriminant doubles as the bit index inside [`FaceMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    /// +X face.
    PosX = 0,
    /// −X face.
    NegX = 1,
    /// +Y face.
    PosY = 2,
    /// −Y face.
    NegY = 3,
    /// +Z face.
    PosZ = 4,
    /// −Z face.
    NegZ = 5,
}

impl Face {
    /// All six faces in bit order.
    pub const ALL: [Face; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Outward unit normal.
    pub fn normal(self) -> Vec3 {
        self.offset().as_vec3()
    }

    /// Grid offset to the neighbouring cell across this face.
    pub fn offset(self) -> IVec3 {
        match self {
            Self::PosX => IVec3::X,
            Self::NegX => IVec3::NEG_X,
            Self::PosY => IVec3::Y,
            Self::NegY => IVec3::NEG_Y,
            Self::PosZ => IVec3::Z,
            Self::NegZ => IVec3::NEG_Z,
        }
    }

    /// The face pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }

    /// Face index (0–5).
    pub fn index(self) -> usize {
        self as usize
    }

    /// The face whose normal points along `dir`, if `dir` is close to an axis.
    pub fn from_direction(dir: Vec3) -> Option<Self> {
        let dir = dir.normalize_or_zero();
        Self::ALL
            .into_iter()
            .find(|face| face.normal().dot(dir) > 0.95)
    }
}

/// Bitmask over the six faces of a voxel.
///
/// Bit 0 = +X, Bit 1 = −X, Bit 2 = +Y, Bit 3 = −Y, Bit 4 = +Z, Bit 5 = −Z.
/// Bits above the sixth are never set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceMask(u8);

impl FaceMask {
    /// No faces.
    pub const NONE: Self = Self(0);
    /// All six faces.
    pub const ALL: Self = Self(0b0011_1111);

    /// Mask of a single face.
    pub const fn of(face: Face) -> Self {
        Self(1 << face as u8)
    }

    /// Builds a mask from raw bits, discarding bits above the sixth.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if `face` is in the mask.
    pub fn contains(self, face: Face) -> bool {
        self.0 & (1 << face as u8) != 0
    }

    /// Adds `face` to the mask.
    pub fn insert(&mut self, face: Face) {
        self.0 |= 1 << face as u8;
    }

    /// Returns `true` if the masks share a face.
    pub fn intersects(self, other: FaceMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of faces in the mask (0–6).
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Faces in the mask, in bit order.
    pub fn faces(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |&face| self.contains(face))
    }
}

impl std::ops::BitOr for FaceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOr<Face> for FaceMask {
    type Output = Self;

    fn bitor(self, rhs: Face) -> Self {
        self | Self::of(rhs)
    }
}

impl std::ops::BitOr for Face {
    type Output = FaceMask;

    fn bitor(self, rhs: Self) -> FaceMask {
        FaceMask::of(self) | FaceMask::of(rhs)
    }
}
