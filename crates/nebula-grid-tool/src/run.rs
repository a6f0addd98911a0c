//! One tool invocation: obtain a grid, inspect it, optionally save it.

use std::path::Path;

use glam::Vec3;
use nebula_config::{CliArgs, Config};
use nebula_grid::{
    BlockRegistry, Grid, MeshOptions, RayCastResult, SerialOptions, VoxelShapeCache, decode_grid,
    encode_grid,
};
use tracing::info;

use crate::demo::{builtin_registry, demo_hull};
use crate::error::ToolError;

/// Summary of what a run found.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub voxels: usize,
    pub nodes: usize,
    pub depth: usize,
    pub palette: usize,
    pub radius: f32,
    pub vertices: usize,
    pub triangles: usize,
    pub thrusters: usize,
    pub hit: Option<RayCastResult>,
    /// Size of the written file, when `--output` was given.
    pub saved_bytes: Option<usize>,
}

/// Parses `fx,fy,fz:tx,ty,tz` into the segment endpoints.
pub fn parse_ray(text: &str) -> Result<(Vec3, Vec3), ToolError> {
    let invalid = || ToolError::InvalidRay(text.to_string());
    let parse_point = |part: &str| -> Result<Vec3, ToolError> {
        let coords = part
            .split(',')
            .map(|c| c.trim().parse::<f32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        match coords.as_slice() {
            [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
            _ => Err(invalid()),
        }
    };

    let (from, to) = text.split_once(':').ok_or_else(invalid)?;
    Ok((parse_point(from)?, parse_point(to)?))
}

/// Runs the tool with an already resolved config.
pub fn run(config: &Config, args: &CliArgs) -> Result<Report, ToolError> {
    let registry = builtin_registry()?;
    let grid = match (&args.input, args.demo) {
        (Some(path), _) => load(path, &registry)?,
        (None, Some(size)) => demo_hull(&registry, size)?,
        (None, None) => return Err(ToolError::NoGrid),
    };

    if config.debug.dump_tree {
        grid.dump();
    }

    let shapes = VoxelShapeCache::new();
    let options = MeshOptions {
        uv_scale: config.mesh.uv_scale,
        uv_offset: config.mesh.uv_offset,
    };
    let mesh = grid.generate_mesh_with(&shapes, &options)?;

    let hit = match &args.ray {
        Some(ray) => {
            let (from, to) = parse_ray(ray)?;
            let hit = grid.ray_cast(from, to);
            match &hit {
                Some(hit) => info!(
                    pos = %hit.pos,
                    normal = %hit.normal,
                    adjacent = %hit.adjacent(),
                    "Ray hit voxel"
                ),
                None => info!(%from, %to, "Ray missed"),
            }
            hit
        }
        None => None,
    };

    let saved_bytes = match &args.output {
        Some(path) => {
            let storage = SerialOptions {
                compress: config.storage.compress,
                threshold: config.storage.compression_threshold,
            };
            Some(save(&grid, path, &storage)?)
        }
        None => None,
    };

    let report = Report {
        voxels: grid.voxels().count(),
        nodes: grid.octree().size(),
        depth: grid.octree().depth(),
        palette: grid.type_count(),
        radius: grid.radius(),
        vertices: mesh.vertices.len(),
        triangles: mesh.triangle_count(),
        thrusters: mesh.thrusters.len(),
        hit,
        saved_bytes,
    };
    info!(
        voxels = report.voxels,
        nodes = report.nodes,
        depth = report.depth,
        palette = report.palette,
        radius = report.radius,
        vertices = report.vertices,
        triangles = report.triangles,
        thrusters = report.thrusters,
        "Grid summary"
    );
    Ok(report)
}

fn load(path: &Path, registry: &BlockRegistry) -> Result<Grid, ToolError> {
    let bytes = std::fs::read(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let grid = decode_grid(&bytes, registry).map_err(|source| ToolError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "Loaded grid");
    Ok(grid)
}

fn save(grid: &Grid, path: &Path, options: &SerialOptions) -> Result<usize, ToolError> {
    let bytes = encode_grid(grid, options).map_err(|source| ToolError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, &bytes).map_err(|source| ToolError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "Saved grid");
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::*;

    #[test]
    fn test_parse_ray() {
        let (from, to) = parse_ray("0, 5, 0:0,-5,0.5").unwrap();
        assert_eq!(from, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(to, Vec3::new(0.0, -5.0, 0.5));
    }

    #[test]
    fn test_parse_ray_rejects_garbage() {
        for bad in ["", "1,2,3", "1,2:3,4,5", "a,b,c:1,2,3", "1,2,3:4,5,6,7"] {
            assert!(matches!(parse_ray(bad), Err(ToolError::InvalidRay(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_requires_a_grid() {
        let err = run(&Config::default(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ToolError::NoGrid));
    }

    #[test]
    fn test_demo_with_ray() {
        let args = CliArgs {
            demo: Some(2),
            ray: Some("0,10,0:0,-10,0".to_string()),
            ..Default::default()
        };
        let report = run(&Config::default(), &args).unwrap();
        assert_eq!(report.voxels, 41);
        assert_eq!(report.thrusters, 2);
        assert!(report.triangles > 0);
        let hit = report.hit.expect("ray hits the plating");
        assert_eq!(hit.pos, IVec3::new(0, 1, 0));
        assert!(report.saved_bytes.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.ngrd");

        let save_args = CliArgs {
            demo: Some(3),
            output: Some(path.clone()),
            ..Default::default()
        };
        let saved = run(&Config::default(), &save_args).unwrap();
        assert!(saved.saved_bytes.unwrap() > 6);

        let load_args = CliArgs {
            input: Some(path),
            ..Default::default()
        };
        let loaded = run(&Config::default(), &load_args).unwrap();
        assert_eq!(loaded.voxels, saved.voxels);
        assert_eq!(loaded.nodes, saved.nodes);
        assert_eq!(loaded.triangles, saved.triangles);
    }

    #[test]
    fn test_missing_input_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ngrd");
        let args = CliArgs {
            input: Some(path.clone()),
            ..Default::default()
        };
        let err = run(&Config::default(), &args).unwrap_err();
        assert!(matches!(err, ToolError::Read { .. }));
        assert!(err.to_string().contains("missing.ngrd"), "{err}");
    }

    #[test]
    fn test_corrupt_input_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.ngrd");
        std::fs::write(&path, b"not a grid").unwrap();
        let args = CliArgs {
            input: Some(path),
            ..Default::default()
        };
        let err = run(&Config::default(), &args).unwrap_err();
        let expected = format!("failed to load grid from '{}'", dir.path().join("junk.ngrd").display());
        assert_eq!(err.to_string(), expected);
        assert!(matches!(
            err,
            ToolError::Load {
                source: nebula_grid::SerialError::InvalidMagic,
                ..
            }
        ));
    }
}
