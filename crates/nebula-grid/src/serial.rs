//! Binary container for persisted grids.
//!
//! The NGRD (Nebula Grid) format wraps the postcard encoding of a [`Grid`]
//! with a magic, a version and an optional LZ4 stage.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `[0x4E, 0x47, 0x52, 0x44]` ("NGRD") |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | 1 | Compression flag (`0x00` none, `0x01` LZ4 with prepended size) |
//! | 6 | N | Postcard body, compressed when the flag is set |

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::block::BlockRegistry;
use crate::error::GridError;
use crate::grid::{Grid, GridSnapshot};

/// Magic bytes identifying the NGRD format.
const MAGIC: [u8; 4] = [0x4E, 0x47, 0x52, 0x44];

/// Current format version.
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// Compression flag: body is stored as is.
pub const COMPRESSION_FLAG_NONE: u8 = 0x00;

/// Compression flag: body is LZ4-compressed.
pub const COMPRESSION_FLAG_LZ4: u8 = 0x01;

/// Controls how grids are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialOptions {
    /// Whether compression is enabled at all. Default: true.
    pub compress: bool,
    /// Minimum body size (bytes) before compression is applied. Default: 1024.
    pub threshold: usize,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            compress: true,
            threshold: 1024,
        }
    }
}

/// Errors that can occur while encoding or decoding a grid file.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    /// The data is shorter than the header.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// An unknown compression flag byte was encountered.
    #[error("unknown compression flag: {0:#04x}")]
    UnknownCompression(u8),
    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {0}")]
    Decompress(String),
    /// The body could not be encoded or decoded.
    #[error("grid codec error: {0}")]
    Codec(#[from] postcard::Error),
    /// The decoded grid failed validation.
    #[error("invalid grid data: {0}")]
    Grid(#[from] GridError),
}

/// Encodes `grid` into the NGRD format.
pub fn encode_grid(grid: &Grid, options: &SerialOptions) -> Result<Vec<u8>, SerialError> {
    let body = postcard::to_allocvec(grid)?;

    let (flag, body) = if options.compress && body.len() >= options.threshold {
        (COMPRESSION_FLAG_LZ4, compress_prepend_size(&body))
    } else {
        (COMPRESSION_FLAG_NONE, body)
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(FORMAT_VERSION);
    buf.push(flag);
    buf.extend_from_slice(&body);

    tracing::debug!(bytes = buf.len(), compressed = flag == COMPRESSION_FLAG_LZ4, "Encoded grid");
    Ok(buf)
}

/// Decodes an NGRD buffer, resolving block names through `registry`.
pub fn decode_grid(data: &[u8], registry: &BlockRegistry) -> Result<Grid, SerialError> {
    if data.len() < HEADER_LEN {
        return Err(SerialError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    if data[..MAGIC.len()] != MAGIC {
        return Err(SerialError::InvalidMagic);
    }
    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(SerialError::UnsupportedVersion(version));
    }

    let payload = &data[HEADER_LEN..];
    let body = match data[5] {
        COMPRESSION_FLAG_NONE => payload.to_vec(),
        COMPRESSION_FLAG_LZ4 => decompress_size_prepended(payload)
            .map_err(|e| SerialError::Decompress(e.to_string()))?,
        flag => return Err(SerialError::UnknownCompression(flag)),
    };

    let snapshot: GridSnapshot = postcard::from_bytes(&body)?;
    Ok(Grid::from_snapshot(snapshot, registry)?)
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::*;
    use crate::block::Block;
    use crate::shape::ShapeType;

    fn sample() -> (BlockRegistry, Grid) {
        let mut registry = BlockRegistry::new();
        let steel = registry.register(Block::hull("steel", 1)).unwrap();
        let mut grid = Grid::new();
        for x in -6..6 {
            for z in -6..6 {
                grid.insert(IVec3::new(x, 0, z), &steel, (x & 7) as u8, 2, ShapeType::Cube)
                    .unwrap();
            }
        }
        (registry, grid)
    }

    #[test]
    fn test_header_layout() {
        let (_, grid) = sample();
        let options = SerialOptions {
            compress: false,
            ..Default::default()
        };
        let bytes = encode_grid(&grid, &options).unwrap();
        assert_eq!(&bytes[..4], b"NGRD");
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(bytes[5], COMPRESSION_FLAG_NONE);
    }

    #[test]
    fn test_round_trip_uncompressed() {
        let (registry, grid) = sample();
        let options = SerialOptions {
            compress: false,
            ..Default::default()
        };
        let bytes = encode_grid(&grid, &options).unwrap();
        let loaded = decode_grid(&bytes, &registry).unwrap();
        assert_eq!(loaded.octree(), grid.octree());
        assert_eq!(loaded.get_type_count(0).unwrap(), 144);
    }

    #[test]
    fn test_round_trip_compressed() {
        let (registry, grid) = sample();
        let options = SerialOptions {
            compress: true,
            threshold: 0,
        };
        let bytes = encode_grid(&grid, &options).unwrap();
        assert_eq!(bytes[5], COMPRESSION_FLAG_LZ4);

        let loaded = decode_grid(&bytes, &registry).unwrap();
        assert_eq!(loaded.octree(), grid.octree());
        assert_eq!(loaded.find(IVec3::new(3, 0, -2)), grid.find(IVec3::new(3, 0, -2)));
    }

    #[test]
    fn test_small_body_skips_compression() {
        let (_, grid) = sample();
        let options = SerialOptions {
            compress: true,
            threshold: usize::MAX,
        };
        let bytes = encode_grid(&grid, &options).unwrap();
        assert_eq!(bytes[5], COMPRESSION_FLAG_NONE);
    }

    #[test]
    fn test_rejects_bad_header() {
        let registry = BlockRegistry::new();
        assert!(matches!(
            decode_grid(b"NGR", &registry),
            Err(SerialError::Truncated { expected: 6, actual: 3 })
        ));
        assert!(matches!(
            decode_grid(b"XXXX\x01\x00", &registry),
            Err(SerialError::InvalidMagic)
        ));
        assert!(matches!(
            decode_grid(b"NGRD\x09\x00", &registry),
            Err(SerialError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            decode_grid(b"NGRD\x01\x07", &registry),
            Err(SerialError::UnknownCompression(7))
        ));
    }

    #[test]
    fn test_rejects_corrupt_lz4() {
        let registry = BlockRegistry::new();
        // Declares 16 output bytes, then a literal run cut short.
        let data = b"NGRD\x01\x01\x10\x00\x00\x00\xff";
        assert!(matches!(
            decode_grid(data, &registry),
            Err(SerialError::Decompress(_))
        ));
    }

    #[test]
    fn test_unknown_block_surfaces_as_grid_error() {
        let (_, grid) = sample();
        let bytes = encode_grid(&grid, &SerialOptions::default()).unwrap();
        let err = decode_grid(&bytes, &BlockRegistry::new()).unwrap_err();
        assert!(
            matches!(err, SerialError::Grid(GridError::UnknownBlock(ref name)) if name == "steel"),
            "got {err}"
        );
    }
}
