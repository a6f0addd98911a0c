//! Inspection and conversion tool for Nebula voxel grids.
//!
//! Loads a grid file or builds a demo hull, meshes it, optionally casts a ray
//! and writes the grid back out in the NGRD format.

pub mod demo;
pub mod error;
pub mod run;
pub mod startup;

pub use demo::{builtin_registry, demo_hull};
pub use error::ToolError;
pub use run::{Report, parse_ray, run};
pub use startup::Startup;
