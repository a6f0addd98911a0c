//! Errors surfaced by the grid tool.

use std::path::PathBuf;

use nebula_config::ConfigError;
use nebula_grid::{GridError, SerialError};

/// Failures of a tool run, carrying the file they relate to.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Config could not be loaded or created.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Neither an input file nor a demo size was given.
    #[error("nothing to do: pass --input <file> or --demo <size>")]
    NoGrid,

    /// The grid file could not be read.
    #[error("failed to read grid from '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The grid file could not be decoded.
    #[error("failed to load grid from '{}'", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: SerialError,
    },

    /// The grid could not be encoded.
    #[error("failed to encode grid for '{}'", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: SerialError,
    },

    /// The grid file could not be written.
    #[error("failed to write grid to '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building or meshing the grid failed.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// The `--ray` argument is malformed.
    #[error("invalid ray '{0}': expected fx,fy,fz:tx,ty,tz")]
    InvalidRay(String),
}
