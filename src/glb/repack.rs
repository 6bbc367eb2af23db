//! Accessor-aware repacking of the GLB binary payload.
//!
//! Every accessor is classified by the mesh-primitive attribute that
//! references it, decoded out of the original payload (honoring interleaved
//! strides), converted to a standard float encoding where its role calls for
//! one, and packed back into its owning buffer view. Buffer views are then
//! re-emitted contiguously in ascending original-offset order and the JSON
//! document is mutated to match the new layout.

use std::collections::{BTreeMap, HashMap};

use half::f16;
use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::parser_utils::slice_range;

use super::{GlbError, RepackOptions};

const COMPONENT_BYTE: u32 = 5120;
const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
const COMPONENT_SHORT: u32 = 5122;
const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const COMPONENT_FLOAT: u32 = 5126;

fn component_size(component_type: u32) -> Option<usize> {
    match component_type {
        COMPONENT_BYTE | COMPONENT_UNSIGNED_BYTE => Some(1),
        COMPONENT_SHORT | COMPONENT_UNSIGNED_SHORT => Some(2),
        COMPONENT_UNSIGNED_INT | COMPONENT_FLOAT => Some(4),
        _ => None,
    }
}

fn component_count(shape: &str) -> Option<usize> {
    match shape {
        "SCALAR" => Some(1),
        "VEC2" => Some(2),
        "VEC3" => Some(3),
        "VEC4" => Some(4),
        _ => None,
    }
}

/// Semantic role of an accessor, derived from the mesh-primitive attribute
/// (or indices reference) that points at it. Accessors have no intrinsic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    Position,
    Normal,
    Tangent,
    TexCoord(u32),
    Color(u32),
    /// Referenced as a primitive's index buffer: copied verbatim.
    Index,
    /// Referenced by an attribute the transcoder does not convert.
    Other,
    /// Referenced by nothing.
    None,
}

impl AttributeRole {
    fn from_attribute(name: &str) -> AttributeRole {
        if name == "POSITION" {
            return AttributeRole::Position;
        }
        if name == "NORMAL" {
            return AttributeRole::Normal;
        }
        if name == "TANGENT" {
            return AttributeRole::Tangent;
        }
        if let Some(n) = name.strip_prefix("TEXCOORD_").and_then(|s| s.parse().ok()) {
            return AttributeRole::TexCoord(n);
        }
        if let Some(n) = name.strip_prefix("COLOR_").and_then(|s| s.parse().ok()) {
            return AttributeRole::Color(n);
        }
        AttributeRole::Other
    }
}

/// Typed read-only view of an accessor; mutation happens on the JSON tree so
/// fields the transcoder does not understand survive the round trip.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    shape: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

/// Resolve each accessor's role from the mesh primitives. The first reference
/// wins; conflicting references are reported and ignored.
pub fn resolve_roles(doc: &Value, accessor_count: usize) -> Vec<AttributeRole> {
    let mut roles = vec![AttributeRole::None; accessor_count];
    let mut assign = |index: usize, role: AttributeRole| {
        let Some(slot) = roles.get_mut(index) else {
            warn!(index, "primitive references accessor out of range");
            return;
        };
        if *slot == AttributeRole::None {
            *slot = role;
        } else if *slot != role {
            warn!(index, ?role, current = ?*slot, "conflicting accessor roles, keeping first");
        }
    };

    let meshes = doc.get("meshes").and_then(Value::as_array);
    for mesh in meshes.into_iter().flatten() {
        let primitives = mesh.get("primitives").and_then(Value::as_array);
        for primitive in primitives.into_iter().flatten() {
            if let Some(attributes) = primitive.get("attributes").and_then(Value::as_object) {
                for (name, value) in attributes {
                    if let Some(index) = value.as_u64() {
                        assign(index as usize, AttributeRole::from_attribute(name));
                    }
                }
            }
            if let Some(index) = primitive.get("indices").and_then(Value::as_u64) {
                assign(index as usize, AttributeRole::Index);
            }
        }
    }
    roles
}

struct DecodedAccessor {
    bytes: Vec<u8>,
    component_type: u32,
    /// New element shape, when the conversion changed it.
    shape: Option<&'static str>,
    /// Converted to float encoding (drops any `normalized` marker).
    converted: bool,
    min_max: Option<(Vec<f32>, Vec<f32>)>,
}

struct AccessorUpdate {
    rel_offset: usize,
    component_type: u32,
    shape: Option<&'static str>,
    converted: bool,
    min_max: Option<(Vec<f32>, Vec<f32>)>,
}

fn normalize3(v: [f32; 3], fallback: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < 1e-6 {
        fallback
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn decode_accessor(
    bin: &[u8],
    view: &BufferView,
    accessor: &Accessor,
    index: usize,
    role: AttributeRole,
) -> Result<DecodedAccessor, GlbError> {
    let comp_size =
        component_size(accessor.component_type).ok_or_else(|| GlbError::UnsupportedLayout {
            component_type: accessor.component_type,
            shape: accessor.shape.clone(),
        })?;
    let comp_count =
        component_count(&accessor.shape).ok_or_else(|| GlbError::UnsupportedLayout {
            component_type: accessor.component_type,
            shape: accessor.shape.clone(),
        })?;
    let elem_size = comp_size * comp_count;
    let stride = view.byte_stride.unwrap_or(elem_size);
    let base = view.byte_offset + accessor.byte_offset;

    if accessor.count > 0 {
        let need = base + (accessor.count - 1) * stride + elem_size;
        if need > bin.len() {
            return Err(GlbError::AccessorOutOfBounds { index });
        }
    }
    let element = |i: usize| &bin[base + i * stride..base + i * stride + elem_size];

    let verbatim = |reason: Option<&str>| {
        if let Some(reason) = reason {
            warn!(
                index,
                ?role,
                component_type = accessor.component_type,
                shape = %accessor.shape,
                "{reason}, copying accessor bytes verbatim"
            );
        }
        let mut bytes = Vec::with_capacity(accessor.count * elem_size);
        for i in 0..accessor.count {
            bytes.extend_from_slice(element(i));
        }
        DecodedAccessor {
            bytes,
            component_type: accessor.component_type,
            shape: None,
            converted: false,
            min_max: None,
        }
    };

    let decoded = match role {
        AttributeRole::Position => {
            if accessor.component_type != COMPONENT_FLOAT {
                verbatim(Some("non-float POSITION"))
            } else {
                let mut bytes = Vec::with_capacity(accessor.count * elem_size);
                let mut min = vec![f32::MAX; comp_count];
                let mut max = vec![f32::MIN; comp_count];
                for i in 0..accessor.count {
                    let src = element(i);
                    for c in 0..comp_count {
                        let v = f32::from_le_bytes([
                            src[c * 4],
                            src[c * 4 + 1],
                            src[c * 4 + 2],
                            src[c * 4 + 3],
                        ]);
                        min[c] = min[c].min(v);
                        max[c] = max[c].max(v);
                        bytes.extend_from_slice(&v.to_le_bytes());
                    }
                }
                let min_max = (accessor.count > 0).then_some((min, max));
                DecodedAccessor {
                    bytes,
                    component_type: COMPONENT_FLOAT,
                    shape: None,
                    converted: false,
                    min_max,
                }
            }
        }
        AttributeRole::Normal => match accessor.component_type {
            COMPONENT_FLOAT => verbatim(None),
            COMPONENT_BYTE if comp_count >= 3 => {
                let mut bytes = Vec::with_capacity(accessor.count * 12);
                for i in 0..accessor.count {
                    let src = element(i);
                    let v = normalize3(
                        [
                            (src[0] as i8) as f32 / 127.0,
                            (src[1] as i8) as f32 / 127.0,
                            (src[2] as i8) as f32 / 127.0,
                        ],
                        [0.0, 0.0, 1.0],
                    );
                    push_f32s(&mut bytes, &v);
                }
                DecodedAccessor {
                    bytes,
                    component_type: COMPONENT_FLOAT,
                    shape: Some("VEC3"),
                    converted: true,
                    min_max: None,
                }
            }
            _ => verbatim(Some("unexpected NORMAL encoding")),
        },
        AttributeRole::Tangent => match accessor.component_type {
            COMPONENT_FLOAT => verbatim(None),
            COMPONENT_BYTE if comp_count == 4 => {
                let mut bytes = Vec::with_capacity(accessor.count * 16);
                for i in 0..accessor.count {
                    let src = element(i);
                    let v = normalize3(
                        [
                            (src[0] as i8) as f32 / 127.0,
                            (src[1] as i8) as f32 / 127.0,
                            (src[2] as i8) as f32 / 127.0,
                        ],
                        [1.0, 0.0, 0.0],
                    );
                    // Handedness is a hard sign threshold, not a rescale.
                    let w = if (src[3] as i8) < 0 { -1.0 } else { 1.0 };
                    push_f32s(&mut bytes, &[v[0], v[1], v[2], w]);
                }
                DecodedAccessor {
                    bytes,
                    component_type: COMPONENT_FLOAT,
                    shape: Some("VEC4"),
                    converted: true,
                    min_max: None,
                }
            }
            _ => verbatim(Some("unexpected TANGENT encoding")),
        },
        AttributeRole::TexCoord(_) => match accessor.component_type {
            COMPONENT_FLOAT => verbatim(None),
            COMPONENT_SHORT | COMPONENT_UNSIGNED_SHORT if comp_count >= 2 => {
                let mut bytes = Vec::with_capacity(accessor.count * 8);
                for i in 0..accessor.count {
                    let src = element(i);
                    let u = f16::from_bits(u16::from_le_bytes([src[0], src[1]])).to_f32();
                    let v = f16::from_bits(u16::from_le_bytes([src[2], src[3]])).to_f32();
                    push_f32s(&mut bytes, &[u, v]);
                }
                DecodedAccessor {
                    bytes,
                    component_type: COMPONENT_FLOAT,
                    shape: Some("VEC2"),
                    converted: true,
                    min_max: None,
                }
            }
            _ => verbatim(Some("unexpected TEXCOORD encoding")),
        },
        AttributeRole::Color(_) => match accessor.component_type {
            COMPONENT_FLOAT => verbatim(None),
            COMPONENT_UNSIGNED_SHORT if comp_count == 4 => {
                let mut bytes = Vec::with_capacity(accessor.count * 16);
                for i in 0..accessor.count {
                    let src = element(i);
                    let mut c = [0.0f32; 4];
                    for (k, value) in c.iter_mut().enumerate() {
                        let raw = u16::from_le_bytes([src[k * 2], src[k * 2 + 1]]);
                        *value = raw as f32 / 65535.0;
                    }
                    push_f32s(&mut bytes, &c);
                }
                DecodedAccessor {
                    bytes,
                    component_type: COMPONENT_FLOAT,
                    shape: Some("VEC4"),
                    converted: true,
                    min_max: None,
                }
            }
            _ => verbatim(Some("unexpected COLOR encoding")),
        },
        AttributeRole::Index | AttributeRole::Other | AttributeRole::None => verbatim(None),
    };
    Ok(decoded)
}

/// Repack the binary payload and mutate the JSON document to match.
///
/// Returns the new payload. Buffer views keep their indices; accessor starts
/// and view ends are zero-padded to 4-byte alignment, with the padding counted
/// inside the owning view's byteLength so views tile the payload without gaps.
pub fn repack(
    doc: &mut Value,
    bin: &[u8],
    options: &RepackOptions,
) -> Result<Vec<u8>, GlbError> {
    let accessors: Vec<Accessor> = match doc.get("accessors") {
        Some(value) => serde_json::from_value(value.clone())?,
        None => Vec::new(),
    };
    let views: Vec<BufferView> = match doc.get("bufferViews") {
        Some(value) => serde_json::from_value(value.clone())?,
        None => Vec::new(),
    };
    let roles = resolve_roles(doc, accessors.len());

    // Accessor indices grouped by their owning view (original indices).
    let mut by_view: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, accessor) in accessors.iter().enumerate() {
        let Some(view) = accessor.buffer_view else {
            continue;
        };
        if view >= views.len() {
            return Err(GlbError::MissingBufferView { index: i, view });
        }
        by_view.entry(view).or_default().push(i);
    }

    let order: Vec<usize> = (0..views.len())
        .sorted_by_key(|&v| (views[v].byte_offset, v))
        .collect();

    let mut payload: Vec<u8> = Vec::new();
    let mut new_offsets = vec![0usize; views.len()];
    let mut new_lengths = vec![0usize; views.len()];
    let mut repacked = vec![false; views.len()];
    let mut updates: HashMap<usize, AccessorUpdate> = HashMap::new();

    for &vi in &order {
        let view = &views[vi];
        let region_start = payload.len();
        match by_view.get(&vi) {
            None => {
                // Unreferenced region (image data and the like): copy verbatim.
                match slice_range(bin, view.byte_offset, view.byte_length) {
                    Some(region) => payload.extend_from_slice(region),
                    None => {
                        warn!(view = vi, "buffer view extends beyond payload, clamping");
                        payload.extend_from_slice(&bin[view.byte_offset.min(bin.len())..]);
                    }
                }
            }
            Some(owned) => {
                repacked[vi] = true;
                let ordered = owned
                    .iter()
                    .copied()
                    .sorted_by_key(|&a| (accessors[a].byte_offset, a));
                for ai in ordered {
                    while (payload.len() - region_start) % 4 != 0 {
                        payload.push(0);
                    }
                    let rel_offset = payload.len() - region_start;
                    let decoded = decode_accessor(bin, view, &accessors[ai], ai, roles[ai])?;
                    payload.extend_from_slice(&decoded.bytes);
                    updates.insert(
                        ai,
                        AccessorUpdate {
                            rel_offset,
                            component_type: decoded.component_type,
                            shape: decoded.shape,
                            converted: decoded.converted,
                            min_max: decoded.min_max,
                        },
                    );
                }
            }
        }
        while (payload.len() - region_start) % 4 != 0 {
            payload.push(0);
        }
        new_offsets[vi] = region_start;
        new_lengths[vi] = payload.len() - region_start;
    }

    apply_json_updates(
        doc,
        &roles,
        &updates,
        &new_offsets,
        &new_lengths,
        &repacked,
        payload.len(),
    );

    if options.strip_vendor_extensions {
        strip_vendor_metadata(doc);
    }

    Ok(payload)
}

fn set_or_remove_offset(obj: &mut serde_json::Map<String, Value>, offset: usize) {
    // Zero offsets are omitted entirely.
    if offset == 0 {
        obj.remove("byteOffset");
    } else {
        obj.insert("byteOffset".to_owned(), json!(offset));
    }
}

fn apply_json_updates(
    doc: &mut Value,
    roles: &[AttributeRole],
    updates: &HashMap<usize, AccessorUpdate>,
    new_offsets: &[usize],
    new_lengths: &[usize],
    repacked: &[bool],
    payload_len: usize,
) {
    if let Some(views) = doc.get_mut("bufferViews").and_then(Value::as_array_mut) {
        for (vi, view) in views.iter_mut().enumerate() {
            let Some(obj) = view.as_object_mut() else {
                continue;
            };
            if vi >= new_offsets.len() {
                continue;
            }
            set_or_remove_offset(obj, new_offsets[vi]);
            obj.insert("byteLength".to_owned(), json!(new_lengths[vi]));
            if repacked[vi] {
                // Repacked regions are tightly packed per accessor.
                obj.remove("byteStride");
            }
        }
    }

    if let Some(accessors) = doc.get_mut("accessors").and_then(Value::as_array_mut) {
        for (ai, accessor) in accessors.iter_mut().enumerate() {
            let Some(obj) = accessor.as_object_mut() else {
                continue;
            };
            let role = roles.get(ai).copied().unwrap_or(AttributeRole::None);
            if let Some(update) = updates.get(&ai) {
                set_or_remove_offset(obj, update.rel_offset);
                obj.insert("componentType".to_owned(), json!(update.component_type));
                if let Some(shape) = update.shape {
                    obj.insert("type".to_owned(), json!(shape));
                }
                if update.converted {
                    obj.remove("normalized");
                }
                if role == AttributeRole::Position {
                    if let Some((min, max)) = &update.min_max {
                        obj.insert("min".to_owned(), json!(min));
                        obj.insert("max".to_owned(), json!(max));
                    }
                }
            }
            // Stale extents on non-position data are invalid.
            if role != AttributeRole::Position {
                obj.remove("min");
                obj.remove("max");
            }
        }
    }

    if let Some(buffers) = doc.get_mut("buffers").and_then(Value::as_array_mut) {
        if let Some(obj) = buffers.first_mut().and_then(Value::as_object_mut) {
            obj.insert("byteLength".to_owned(), json!(payload_len));
        }
    }
}

/// Recursively drop vendor extension and auxiliary metadata subtrees.
fn strip_vendor_metadata(doc: &mut Value) {
    if let Some(root) = doc.as_object_mut() {
        root.remove("extensionsUsed");
        root.remove("extensionsRequired");
    }
    strip_subtrees(doc);
}

fn strip_subtrees(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("extensions");
            map.remove("extras");
            for child in map.values_mut() {
                strip_subtrees(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_subtrees(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32s(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Build a document with one primitive whose attributes reference the
    /// given accessors in order.
    fn doc_with(attributes: &[(&str, usize)], accessors: Value, views: Value) -> Value {
        let attrs: serde_json::Map<String, Value> = attributes
            .iter()
            .map(|&(name, index)| (name.to_owned(), json!(index)))
            .collect();
        json!({
            "asset": {"version": "2.0"},
            "meshes": [{"primitives": [{"attributes": attrs}]}],
            "accessors": accessors,
            "bufferViews": views,
            "buffers": [{"byteLength": 0}]
        })
    }

    #[test]
    fn resolves_roles_from_primitives() {
        let doc = json!({
            "meshes": [{"primitives": [
                {"attributes": {"POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2, "COLOR_1": 3}, "indices": 4}
            ]}]
        });
        let roles = resolve_roles(&doc, 6);
        assert_eq!(roles[0], AttributeRole::Position);
        assert_eq!(roles[1], AttributeRole::Normal);
        assert_eq!(roles[2], AttributeRole::TexCoord(0));
        assert_eq!(roles[3], AttributeRole::Color(1));
        assert_eq!(roles[4], AttributeRole::Index);
        assert_eq!(roles[5], AttributeRole::None);
    }

    #[test]
    fn normal_decode_normalizes_and_falls_back() {
        let mut doc = doc_with(
            &[("NORMAL", 0)],
            json!([{"bufferView": 0, "componentType": 5120, "count": 3, "type": "VEC4"}]),
            json!([{"byteOffset": 0, "byteLength": 12}]),
        );
        let bin = [127u8, 0, 0, 0, 100, 100, 0, 0, 0, 0, 0, 0];
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();

        let values = f32s(&payload);
        assert_eq!(values.len(), 9);
        for triple in values.chunks(3) {
            let len = (triple[0] * triple[0] + triple[1] * triple[1] + triple[2] * triple[2])
                .sqrt();
            assert!((len - 1.0).abs() < 1e-4);
        }
        assert!((values[0] - 1.0).abs() < 1e-6);
        // Diagonal input normalized.
        assert!((values[3] - values[4]).abs() < 1e-6);
        // Zero-length fallback.
        assert_eq!(&values[6..9], &[0.0, 0.0, 1.0]);

        let accessor = &doc["accessors"][0];
        assert_eq!(accessor["componentType"], 5126);
        assert_eq!(accessor["type"], "VEC3");
        assert!(accessor.get("min").is_none());
    }

    #[test]
    fn tangent_w_is_binary_sign() {
        let mut doc = doc_with(
            &[("TANGENT", 0)],
            json!([{"bufferView": 0, "componentType": 5120, "count": 3, "type": "VEC4"}]),
            json!([{"byteOffset": 0, "byteLength": 12}]),
        );
        // w bytes: -1, 5, 0 -> -1.0, +1.0, +1.0
        let bin = [127u8, 0, 0, 0xFF, 0, 127, 0, 5, 0, 0, 0, 0];
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();

        let values = f32s(&payload);
        assert_eq!(values.len(), 12);
        assert_eq!(values[3], -1.0);
        assert_eq!(values[7], 1.0);
        assert_eq!(values[11], 1.0);
        for quad in values.chunks(4) {
            let len = (quad[0] * quad[0] + quad[1] * quad[1] + quad[2] * quad[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
            assert!(quad[3] == 1.0 || quad[3] == -1.0);
        }
        // Zero-length xyz fallback.
        assert_eq!(&values[8..11], &[1.0, 0.0, 0.0]);
        assert_eq!(doc["accessors"][0]["type"], "VEC4");
    }

    #[test]
    fn texcoord_half_float_widening() {
        let mut doc = doc_with(
            &[("TEXCOORD_0", 0)],
            json!([{"bufferView": 0, "componentType": 5122, "count": 1, "type": "VEC2"}]),
            json!([{"byteOffset": 0, "byteLength": 4}]),
        );
        // 0x3C00 is half-precision 1.0 at both U and V.
        let bin = [0x00u8, 0x3C, 0x00, 0x3C];
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();
        assert_eq!(f32s(&payload), vec![1.0, 1.0]);
        assert_eq!(doc["accessors"][0]["componentType"], 5126);
    }

    #[test]
    fn color_u16_rescale() {
        let mut doc = doc_with(
            &[("COLOR_0", 0)],
            json!([{"bufferView": 0, "componentType": 5123, "count": 1, "type": "VEC4"}]),
            json!([{"byteOffset": 0, "byteLength": 8}]),
        );
        let mut bin = Vec::new();
        for raw in [65535u16, 0, 32768, 65535] {
            bin.extend_from_slice(&raw.to_le_bytes());
        }
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();
        let values = f32s(&payload);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 0.0);
        assert!((values[2] - 0.5).abs() < 1e-3);
        assert_eq!(values[3], 1.0);
    }

    #[test]
    fn position_gets_min_max_and_zero_offset_is_omitted() {
        let mut doc = doc_with(
            &[("POSITION", 0)],
            json!([{
                "bufferView": 0, "byteOffset": 0, "componentType": 5126, "count": 2,
                "type": "VEC3"
            }]),
            json!([{"byteOffset": 0, "byteLength": 24}]),
        );
        let mut bin = Vec::new();
        for v in [1.0f32, 2.0, 3.0, -1.0, 5.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        repack(&mut doc, &bin, &RepackOptions::default()).unwrap();

        let accessor = &doc["accessors"][0];
        assert_eq!(accessor["min"], json!([-1.0, 2.0, 0.0]));
        assert_eq!(accessor["max"], json!([1.0, 5.0, 3.0]));
        assert!(accessor.get("byteOffset").is_none());
        assert!(doc["bufferViews"][0].get("byteOffset").is_none());
    }

    #[test]
    fn interleaved_view_is_deinterleaved() {
        // One view, stride 16: POSITION (12 bytes) then NORMAL (4 bytes).
        let mut doc = doc_with(
            &[("POSITION", 0), ("NORMAL", 1)],
            json!([
                {"bufferView": 0, "byteOffset": 0, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 12, "componentType": 5120, "count": 2, "type": "VEC4"}
            ]),
            json!([{"byteOffset": 0, "byteLength": 32, "byteStride": 16}]),
        );
        let mut bin = Vec::new();
        for vertex in 0..2u8 {
            for v in [vertex as f32, 0.0, 0.0] {
                bin.extend_from_slice(&v.to_le_bytes());
            }
            bin.extend_from_slice(&[0, 0, 127, 0]);
        }
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();

        // Positions packed first (24 bytes), then normals (24 bytes).
        assert_eq!(payload.len(), 48);
        let values = f32s(&payload);
        assert_eq!(&values[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&values[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&values[6..9], &[0.0, 0.0, 1.0]);
        assert_eq!(&values[9..12], &[0.0, 0.0, 1.0]);

        let views = doc["bufferViews"].as_array().unwrap();
        assert_eq!(views[0]["byteLength"], json!(48));
        assert!(views[0].get("byteStride").is_none());
        assert_eq!(doc["accessors"][1]["byteOffset"], json!(24));
    }

    #[test]
    fn views_tile_payload_without_gaps() {
        let mut doc = doc_with(
            &[("POSITION", 0)],
            json!([
                {"bufferView": 1, "componentType": 5126, "count": 1, "type": "VEC3"},
                {"bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]),
            json!([
                {"byteOffset": 0, "byteLength": 6},
                {"byteOffset": 8, "byteLength": 12}
            ]),
        );
        doc["meshes"][0]["primitives"][0]["indices"] = json!(1);
        let mut bin = Vec::new();
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        for v in [1.0f32, 2.0, 3.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();

        let views = doc["bufferViews"].as_array().unwrap();
        let mut ranges: Vec<(usize, usize)> = views
            .iter()
            .map(|v| {
                let offset = v.get("byteOffset").and_then(Value::as_u64).unwrap_or(0) as usize;
                let length = v["byteLength"].as_u64().unwrap() as usize;
                (offset, length)
            })
            .collect();
        ranges.sort();
        let mut cursor = 0usize;
        for (offset, length) in ranges {
            assert_eq!(offset, cursor);
            cursor += length;
        }
        assert_eq!(cursor, payload.len());
        // Index region padded from 6 to 8 bytes.
        assert_eq!(payload.len(), 8 + 12);
    }

    #[test]
    fn missing_tangent_is_fine() {
        let mut doc = doc_with(
            &[("POSITION", 0)],
            json!([{"bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3"}]),
            json!([{"byteOffset": 0, "byteLength": 12}]),
        );
        let bin = [0u8; 12];
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();
        assert_eq!(payload.len(), 12);
        assert_eq!(doc["bufferViews"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn accessor_without_buffer_view_is_ignored() {
        let mut doc = doc_with(
            &[("NORMAL", 0)],
            json!([{"componentType": 5120, "count": 4, "type": "VEC4", "min": [0], "max": [1]}]),
            json!([]),
        );
        let payload = repack(&mut doc, &[], &RepackOptions::default()).unwrap();
        assert!(payload.is_empty());
        // Stale extents are still cleaned up.
        assert!(doc["accessors"][0].get("min").is_none());
    }

    #[test]
    fn unreferenced_view_copied_verbatim() {
        let mut doc = doc_with(
            &[("POSITION", 0)],
            json!([{"bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3"}]),
            json!([
                {"byteOffset": 0, "byteLength": 12},
                {"byteOffset": 12, "byteLength": 4, "byteStride": 2}
            ]),
        );
        let mut bin = vec![0u8; 12];
        bin.extend_from_slice(&[9, 8, 7, 6]);
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();
        assert_eq!(&payload[12..16], &[9, 8, 7, 6]);
        // Untouched views keep their declared stride.
        assert_eq!(doc["bufferViews"][1]["byteStride"], json!(2));
    }

    #[test]
    fn strips_vendor_metadata_when_asked() {
        let mut doc = json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["VENDOR_thing"],
            "materials": [{"extensions": {"VENDOR_thing": {"x": 1}}, "extras": {"note": "hi"}}],
            "accessors": [],
            "bufferViews": []
        });
        repack(&mut doc, &[], &RepackOptions::default()).unwrap();
        assert!(doc.get("extensionsUsed").is_none());
        assert!(doc["materials"][0].get("extensions").is_none());
        assert!(doc["materials"][0].get("extras").is_none());

        let mut doc = json!({
            "asset": {"version": "2.0"},
            "materials": [{"extensions": {"VENDOR_thing": {}}}],
            "accessors": [],
            "bufferViews": []
        });
        let options = RepackOptions {
            strip_vendor_extensions: false,
        };
        repack(&mut doc, &[], &options).unwrap();
        assert!(doc["materials"][0].get("extensions").is_some());
    }

    #[test]
    fn out_of_bounds_accessor_is_an_error() {
        let mut doc = doc_with(
            &[("POSITION", 0)],
            json!([{"bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3"}]),
            json!([{"byteOffset": 0, "byteLength": 48}]),
        );
        let bin = [0u8; 16];
        assert!(matches!(
            repack(&mut doc, &bin, &RepackOptions::default()),
            Err(GlbError::AccessorOutOfBounds { .. })
        ));
    }

    #[test]
    fn indices_copied_verbatim() {
        let mut doc = doc_with(
            &[],
            json!([{"bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR"}]),
            json!([{"byteOffset": 0, "byteLength": 6}]),
        );
        doc["meshes"][0]["primitives"][0]["indices"] = json!(0);
        let mut bin = Vec::new();
        for i in [7u16, 8, 9] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let payload = repack(&mut doc, &bin, &RepackOptions::default()).unwrap();
        assert_eq!(&payload[0..6], &bin[..]);
        assert_eq!(doc["accessors"][0]["componentType"], 5123);
    }
}
