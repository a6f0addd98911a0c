//! Voxel ship grids: a sparse octree of bit-packed voxels, a block palette,
//! raycasting, face-culled mesh generation and a compact binary file format.

pub mod block;
pub mod cursor;
pub mod error;
pub mod face;
pub mod grid;
pub mod mesh;
pub mod node;
pub mod octree;
pub mod pool;
pub mod raycast;
pub mod serial;
pub mod shape;
pub mod shape_cache;

pub use block::{Block, BlockKind, BlockMaterial, BlockRef, BlockRegistry, ParticlesInfo};
pub use cursor::{Cursor, Voxels};
pub use error::{GridError, PoolError};
pub use face::{Face, FaceMask};
pub use grid::{Grid, GridSnapshot, MAX_TYPES, Type, TypeRecord};
pub use mesh::{
    BlocksData, CACHE_BUILD_WIDTH, MESH_BUILD_WIDTH, MeshOptions, ThrusterInfo, VertexFinal,
};
pub use node::{BAD_INDEX, Branch, Node, Voxel};
pub use octree::{MAX_DEPTH, MAX_NODES, NodePool, Octree};
pub use pool::{DEFAULT_BUCKET_SIZE, Pool};
pub use raycast::RayCastResult;
pub use serial::{SerialError, SerialOptions, decode_grid, encode_grid};
pub use shape::{Polygon, ShapeType};
pub use shape_cache::{ROTATION_COUNT, ShapePrebuilt, ShapeVertex, VoxelShapeCache};
