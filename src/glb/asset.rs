//! GLB container layer: chunked binary envelope around a JSON scene document
//! and a raw binary payload.

use std::borrow::Cow;

use serde_json::Value;
use tracing::{debug, warn};

use crate::parser_utils::{read_u32_at, slice_range};

use super::GlbError;

pub const GLB_MAGIC: [u8; 4] = *b"glTF";
/// Chunk type "JSON".
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// Chunk type "BIN\0".
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Parse a GLB blob into its JSON document and binary payload.
///
/// Non-printable bytes within the declared JSON length are sanitized to
/// spaces before parsing; embedded blobs routinely carry padding garbage
/// inside that range. A missing BIN chunk yields an empty payload.
pub fn parse_asset(blob: &[u8]) -> Result<(Value, Vec<u8>), GlbError> {
    let magic = slice_range(blob, 0, 4).ok_or(GlbError::Truncated {
        what: "header",
        offset: 0,
    })?;
    if magic != GLB_MAGIC {
        return Err(GlbError::BadMagic {
            found: magic.try_into().unwrap_or([0; 4]),
        });
    }
    let version = read_u32_at(blob, 4).ok_or(GlbError::Truncated {
        what: "header",
        offset: 4,
    })?;
    if version != 2 {
        warn!(version, "unexpected GLB version, attempting to parse anyway");
    }
    let declared_total = read_u32_at(blob, 8).ok_or(GlbError::Truncated {
        what: "header",
        offset: 8,
    })? as usize;
    if declared_total != blob.len() {
        debug!(
            declared = declared_total,
            actual = blob.len(),
            "GLB total length disagrees with blob size"
        );
    }

    // JSON chunk.
    let json_len = read_u32_at(blob, HEADER_LEN).ok_or(GlbError::Truncated {
        what: "JSON chunk header",
        offset: HEADER_LEN,
    })? as usize;
    let json_type = read_u32_at(blob, HEADER_LEN + 4).ok_or(GlbError::Truncated {
        what: "JSON chunk header",
        offset: HEADER_LEN + 4,
    })?;
    if json_type != CHUNK_JSON {
        return Err(GlbError::UnexpectedChunk {
            expected: "JSON",
            found: json_type,
        });
    }
    let json_start = HEADER_LEN + CHUNK_HEADER_LEN;
    let json_raw = slice_range(blob, json_start, json_len).ok_or(GlbError::Truncated {
        what: "JSON chunk",
        offset: json_start,
    })?;
    let mut json_bytes = json_raw.to_vec();
    for b in &mut json_bytes {
        if *b < 0x20 || *b > 0x7E {
            *b = b' ';
        }
    }
    let text = String::from_utf8_lossy(&json_bytes);
    let doc: Value = serde_json::from_str(text.trim())?;

    // BIN chunk, if present.
    let bin_header = json_start + json_len;
    if bin_header >= blob.len() {
        return Ok((doc, Vec::new()));
    }
    let bin_len = read_u32_at(blob, bin_header).ok_or(GlbError::Truncated {
        what: "BIN chunk header",
        offset: bin_header,
    })? as usize;
    let bin_type = read_u32_at(blob, bin_header + 4).ok_or(GlbError::Truncated {
        what: "BIN chunk header",
        offset: bin_header + 4,
    })?;
    if bin_type != CHUNK_BIN {
        return Err(GlbError::UnexpectedChunk {
            expected: "BIN",
            found: bin_type,
        });
    }
    let bin = slice_range(blob, bin_header + CHUNK_HEADER_LEN, bin_len).ok_or(
        GlbError::Truncated {
            what: "BIN chunk",
            offset: bin_header + CHUNK_HEADER_LEN,
        },
    )?;

    Ok((doc, bin.to_vec()))
}

/// Serialize a JSON document and binary payload into a GLB blob.
///
/// The JSON chunk is padded to 4-byte alignment with spaces and the BIN chunk
/// with zeros; the header's total length covers both padded chunks.
pub fn serialize_asset(doc: &Value, payload: Vec<u8>) -> Result<Vec<u8>, GlbError> {
    let json_string = serde_json::to_string(doc)?;
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: GLB_MAGIC,
            version: 2,
            length: 0, // to_writer computes this
        },
        json: Cow::Owned(json_string.into_bytes()),
        bin: if payload.is_empty() {
            None
        } else {
            Some(Cow::Owned(payload))
        },
    };
    let mut out = Vec::new();
    glb.to_writer(&mut out)
        .map_err(|e| GlbError::Serialize(e.to_string()))?;
    Ok(out)
}
