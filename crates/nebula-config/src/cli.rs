//! Command-line argument parsing for the grid tool.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Grid tool command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nebula-grid-tool", about = "Inspect, mesh and convert voxel grids")]
pub struct CliArgs {
    /// Grid file to load.
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Where to save the grid after processing.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Build a demo hull of the given half-size instead of loading a file.
    #[arg(long)]
    pub demo: Option<u32>,

    /// Log every octree node.
    #[arg(long)]
    pub dump: bool,

    /// Cast a ray, given as `fx,fy,fz:tx,ty,tz`.
    #[arg(long)]
    pub ray: Option<String>,

    /// Compress the saved grid.
    #[arg(long)]
    pub compress: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(compress) = args.compress {
            self.storage.compress = compress;
        }
        if args.dump {
            self.debug.dump_tree = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            compress: Some(false),
            dump: true,
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert!(!config.storage.compress);
        assert!(config.debug.dump_tree);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.storage.compression_threshold, 1024);
        assert_eq!(config.mesh.uv_scale, 0.25);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_arguments() {
        let args = CliArgs::parse_from([
            "nebula-grid-tool",
            "--demo",
            "4",
            "--ray",
            "0,5,0:0,-5,0",
            "-o",
            "ship.ngrd",
            "--compress",
            "true",
        ]);
        assert_eq!(args.demo, Some(4));
        assert_eq!(args.ray.as_deref(), Some("0,5,0:0,-5,0"));
        assert_eq!(args.output, Some(PathBuf::from("ship.ngrd")));
        assert_eq!(args.compress, Some(true));
        assert!(!args.dump);
        assert!(args.input.is_none());
    }
}
