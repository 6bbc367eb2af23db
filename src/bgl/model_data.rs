//! Model-data subrecord decoding.
//!
//! Unlike the placement stream, model-data subsections are walked by fixed
//! 24-byte row index: {guid, nested blob offset, nested blob length}. Each
//! referenced blob is a RIFF chunk stream carrying GXML metadata and a GLBD
//! chunk of embedded GLB assets, each of which is transcoded on discovery.

use tracing::{debug, warn};

use crate::glb::{self, RepackOptions};
use crate::parser_utils::{read_u32_at, slice_range};

use super::container::SubrecordTable;
use super::{BglError, Guid, gxml};

const RIFF_TAG: &[u8; 4] = b"RIFF";
const GXML_TAG: &[u8; 4] = b"GXML";
const GLBD_TAG: &[u8; 4] = b"GLBD";
const GLB_SIG: &[u8; 4] = b"GLB\0";

const MODEL_ROW_LEN: usize = 24;
/// Chunk scanning starts past the RIFF tag and container size.
const CHUNK_SCAN_START: usize = 8;

/// One transcoded asset variant of a model.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: String,
    /// Minimum pixel size below which a simpler LOD should be substituted.
    pub min_size: u32,
    /// Transcoded GLB bytes.
    pub glb: Vec<u8>,
}

/// One model-data entry: a guid-keyed set of transcoded asset variants.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub guid: Guid,
    pub name: String,
    pub assets: Vec<ModelAsset>,
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Decode all model-data rows in one subrecord run.
///
/// A row whose blob does not open with the RIFF signature ends the walk for
/// this run (tolerated early stop, not an error). Per-asset transcode
/// failures are logged against the model guid and skipped.
pub fn decode_models(
    file_data: &[u8],
    table: &SubrecordTable,
    options: &RepackOptions,
) -> Result<Vec<ModelEntry>, BglError> {
    let base = table.offset as usize;
    let total = table.byte_length as usize;
    let mut models = Vec::new();
    let mut consumed = 0usize;
    let mut row = 0usize;

    while consumed < total {
        let row_offset = base + row * MODEL_ROW_LEN;
        let row_bytes =
            slice_range(file_data, row_offset, MODEL_ROW_LEN).ok_or(BglError::Truncated {
                what: "model data row",
                offset: row_offset,
            })?;
        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(&row_bytes[..16]);
        let guid = Guid::from_bytes(guid_bytes);
        let blob_offset = u32::from_le_bytes([
            row_bytes[16],
            row_bytes[17],
            row_bytes[18],
            row_bytes[19],
        ]) as usize;
        let blob_len = u32::from_le_bytes([
            row_bytes[20],
            row_bytes[21],
            row_bytes[22],
            row_bytes[23],
        ]) as usize;

        let blob =
            slice_range(file_data, base + blob_offset, blob_len).ok_or(BglError::Truncated {
                what: "model data blob",
                offset: base + blob_offset,
            })?;
        if !blob.starts_with(RIFF_TAG) {
            debug!(
                row,
                offset = format_args!("0x{:X}", base + blob_offset),
                "model blob lacks RIFF signature, stopping row walk"
            );
            break;
        }

        models.push(decode_model_blob(guid, blob, options));
        consumed += MODEL_ROW_LEN + blob_len;
        row += 1;
    }

    Ok(models)
}

/// Scan one RIFF blob for GXML metadata and GLBD-embedded assets.
fn decode_model_blob(guid: Guid, blob: &[u8], options: &RepackOptions) -> ModelEntry {
    let mut name = String::new();
    let mut lods = Vec::new();
    let mut glbs: Vec<Vec<u8>> = Vec::new();

    let mut i = CHUNK_SCAN_START;
    while i + 8 <= blob.len() {
        let tag = &blob[i..i + 4];
        if tag == GXML_TAG {
            let Some(size) = read_u32_at(blob, i + 4).map(|s| s as usize) else {
                break;
            };
            match slice_range(blob, i + 8, size) {
                Some(payload) => {
                    let text = String::from_utf8_lossy(payload);
                    match gxml::parse_model_info(&text) {
                        Ok(info) => {
                            name = info.name;
                            lods = info.lods;
                        }
                        Err(e) => {
                            warn!(%guid, error = %e, "failed to parse GXML metadata");
                        }
                    }
                }
                None => {
                    warn!(%guid, offset = i, "GXML chunk extends beyond blob");
                    break;
                }
            }
            i = align4(i + 8 + size);
        } else if tag == GLBD_TAG {
            let Some(size) = read_u32_at(blob, i + 4).map(|s| s as usize) else {
                break;
            };
            let end = (i + 8 + size).min(blob.len());
            scan_embedded_assets(guid, blob, i + 8, end, options, &mut glbs);
            i = align4(i + 8 + size);
        } else {
            i += 4;
        }
    }

    let model_name = if name.is_empty() {
        format!("model_{guid}")
    } else {
        name
    };
    let assets = glbs
        .into_iter()
        .enumerate()
        .map(|(index, glb)| {
            let (asset_name, min_size) = match lods.get(index) {
                Some(lod) => (lod.model_file.clone(), lod.min_size),
                None => (format!("{model_name}_glb{index}"), 0),
            };
            ModelAsset {
                name: asset_name.replace(' ', "_"),
                min_size,
                glb,
            }
        })
        .collect();

    debug!(%guid, name = %model_name, "decoded model entry");
    ModelEntry {
        guid,
        name: model_name,
        assets,
    }
}

/// Scan a GLBD payload for signature-prefixed GLB blocks and transcode each.
fn scan_embedded_assets(
    guid: Guid,
    blob: &[u8],
    start: usize,
    end: usize,
    options: &RepackOptions,
    out: &mut Vec<Vec<u8>>,
) {
    let mut j = start;
    while j + 8 <= end {
        if &blob[j..j + 4] == GLB_SIG {
            let Some(glb_size) = read_u32_at(blob, j + 4).map(|s| s as usize) else {
                break;
            };
            let Some(payload) = slice_range(blob, j + 8, glb_size) else {
                warn!(%guid, offset = j, "embedded GLB extends beyond blob, stopping scan");
                break;
            };
            match glb::transcode(payload, options) {
                Ok(bytes) => out.push(bytes),
                Err(e) => {
                    warn!(%guid, error = %e, "skipping malformed embedded asset");
                }
            }
            j += 8 + glb_size;
        } else {
            j += 4;
        }
    }
}
