//! Embedded GLB asset parsing and buffer transcoding.
//!
//! Asset blobs extracted from model containers are GLB files whose vertex
//! attributes use compact quantized encodings (signed-byte normals and
//! tangents, half-float texture coordinates, 16-bit colors). The transcoder
//! rewrites every attribute into standard float encodings, repacks the binary
//! payload with corrected offsets, and re-serializes a self-consistent GLB.

/// GLB container parse/serialize
pub mod asset;
/// Accessor-aware binary payload repacking
pub mod repack;

use thiserror::Error;

/// Errors while transcoding one asset blob. All variants are fatal for the
/// blob only; the caller continues with the model's remaining assets.
#[derive(Debug, Error)]
pub enum GlbError {
    #[error("bad GLB magic: found {found:02X?}")]
    BadMagic { found: [u8; 4] },
    #[error("GLB {what} at 0x{offset:X} extends beyond blob")]
    Truncated { what: &'static str, offset: usize },
    #[error("expected {expected} chunk, found type 0x{found:08X}")]
    UnexpectedChunk { expected: &'static str, found: u32 },
    #[error("malformed JSON chunk: {0}")]
    Json(#[from] serde_json::Error),
    #[error("accessor {index} references missing buffer view {view}")]
    MissingBufferView { index: usize, view: usize },
    #[error("accessor {index} data out of bounds of binary payload")]
    AccessorOutOfBounds { index: usize },
    #[error("buffer view {view} out of bounds of binary payload")]
    ViewOutOfBounds { view: usize },
    #[error("unsupported accessor layout: componentType={component_type}, type={shape}")]
    UnsupportedLayout { component_type: u32, shape: String },
    #[error("GLB serialization failed: {0}")]
    Serialize(String),
}

/// Transcoder behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct RepackOptions {
    /// Remove vendor extension and auxiliary metadata subtrees from the JSON
    /// document. Transcoded buffers invalidate any byte layouts those
    /// subtrees reference.
    pub strip_vendor_extensions: bool,
}

impl Default for RepackOptions {
    fn default() -> Self {
        RepackOptions {
            strip_vendor_extensions: true,
        }
    }
}

/// Transcode one asset blob into a new, self-consistent GLB.
pub fn transcode(blob: &[u8], options: &RepackOptions) -> Result<Vec<u8>, GlbError> {
    let (mut doc, bin) = asset::parse_asset(blob)?;
    let payload = repack::repack(&mut doc, &bin, options)?;
    asset::serialize_asset(&doc, payload)
}
