//! Joining decoded placements with transcoded models into output artifacts.
//!
//! Models and placements correlate by guid; a model may have placements from
//! a different input file than the one carrying its geometry. Each placement
//! becomes one line in its geographic tile's bucket, referencing either a
//! single GLB directly or a generated indirection document listing the
//! model's LOD variants.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::bgl::Guid;
use crate::bgl::model_data::ModelEntry;
use crate::bgl::placement::ScenicPlacement;
use crate::geo;

/// One output artifact: a transcoded GLB or an indirection XML document.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Placement lines bucketed under one tile, with a representative coordinate
/// for directory naming.
#[derive(Debug, Clone)]
pub struct TilePlacements {
    pub latitude: f64,
    pub longitude: f64,
    pub lines: Vec<String>,
}

#[derive(Debug, Default)]
pub struct JoinOutput {
    pub files: Vec<OutputFile>,
    pub tiles: BTreeMap<i32, TilePlacements>,
}

/// Join every model against the accumulated placement map.
///
/// Models without placements contribute nothing; placements without a model
/// are silently left behind (the common case: library objects referencing
/// stock models not present in the scanned files).
pub fn join(
    models: &[ModelEntry],
    placements: &HashMap<Guid, Vec<ScenicPlacement>>,
) -> JoinOutput {
    let mut output = JoinOutput::default();

    for model in models {
        let Some(group) = placements.get(&model.guid) else {
            debug!(guid = %model.guid, name = %model.name, "model has no placements");
            continue;
        };
        if model.assets.is_empty() {
            warn!(guid = %model.guid, name = %model.name, "model has no decodable assets");
            continue;
        }

        for asset in &model.assets {
            output.files.push(OutputFile {
                name: format!("{}.glb", asset.name),
                data: asset.glb.clone(),
            });
        }

        let uniform_unit_scale = group.iter().all(|p| (p.scale - 1.0).abs() < 1e-6);
        let reference = if model.assets.len() == 1 && uniform_unit_scale {
            format!("{}.glb", model.assets[0].name)
        } else {
            let name = format!("{}.xml", model.name.replace(' ', "_"));
            output.files.push(OutputFile {
                name: name.clone(),
                data: indirection_document(model).into_bytes(),
            });
            name
        };

        for placement in group {
            let Some(tile) = geo::tile_index(placement.latitude, placement.longitude) else {
                warn!(
                    guid = %model.guid,
                    latitude = placement.latitude,
                    longitude = placement.longitude,
                    "placement outside valid coordinate range, skipping"
                );
                continue;
            };
            let bucket = output.tiles.entry(tile).or_insert_with(|| TilePlacements {
                latitude: placement.latitude,
                longitude: placement.longitude,
                lines: Vec::new(),
            });
            bucket.lines.push(format!(
                "OBJECT_STATIC {} {:.6} {:.6} {} {:.2} {:.2} {:.2}",
                reference,
                placement.longitude,
                placement.latitude,
                placement.altitude,
                placement.heading,
                placement.pitch,
                placement.bank,
            ));
        }
    }

    info!(
        files = output.files.len(),
        tiles = output.tiles.len(),
        "join complete"
    );
    output
}

/// Generate the PropertyList indirection document listing a model's variants.
fn indirection_document(model: &ModelEntry) -> String {
    let mut doc = String::from("<?xml version=\"1.0\"?>\n<PropertyList>\n");
    doc.push_str("  <!-- generated by bglunpack -->\n");
    for asset in &model.assets {
        let name = xml_escape(&asset.name);
        doc.push_str("  <model>\n");
        doc.push_str(&format!("    <name>{name}</name>\n"));
        doc.push_str(&format!("    <path>{name}.glb</path>\n"));
        doc.push_str("  </model>\n");
    }
    doc.push_str("</PropertyList>\n");
    doc
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgl::model_data::ModelAsset;
    use crate::bgl::placement::PlacementFlags;

    fn placement(guid: Guid, lat: f64, lon: f64, scale: f64) -> ScenicPlacement {
        ScenicPlacement {
            guid,
            longitude: lon,
            latitude: lat,
            altitude: 12.0,
            flags: PlacementFlags::default(),
            pitch: 0.0,
            bank: 0.0,
            heading: 90.0,
            image_complexity: 0,
            scale,
        }
    }

    fn model(guid: Guid, name: &str, asset_names: &[&str]) -> ModelEntry {
        ModelEntry {
            guid,
            name: name.to_owned(),
            assets: asset_names
                .iter()
                .map(|n| ModelAsset {
                    name: (*n).to_owned(),
                    min_size: 0,
                    glb: vec![0xAA],
                })
                .collect(),
        }
    }

    #[test]
    fn single_asset_uniform_scale_is_referenced_directly() {
        let guid = Guid::from_bytes([1; 16]);
        let models = vec![model(guid, "Tower", &["Tower_LOD00"])];
        let mut placements = HashMap::new();
        placements.insert(guid, vec![placement(guid, 37.5, -122.3, 1.0)]);

        let output = join(&models, &placements);
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "Tower_LOD00.glb");
        assert_eq!(output.tiles.len(), 1);
        let lines = &output.tiles.values().next().unwrap().lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "OBJECT_STATIC Tower_LOD00.glb -122.300000 37.500000 12 90.00 0.00 0.00"
        );
    }

    #[test]
    fn multi_asset_model_gets_indirection_document() {
        let guid = Guid::from_bytes([2; 16]);
        let models = vec![model(guid, "Big Barn", &["Barn_LOD00", "Barn_LOD01"])];
        let mut placements = HashMap::new();
        placements.insert(guid, vec![placement(guid, 37.5, -122.3, 1.0)]);

        let output = join(&models, &placements);
        assert_eq!(output.files.len(), 3);
        let xml = output
            .files
            .iter()
            .find(|f| f.name == "Big_Barn.xml")
            .expect("indirection document");
        let text = String::from_utf8(xml.data.clone()).unwrap();
        assert!(text.contains("<name>Barn_LOD00</name>"));
        assert!(text.contains("<path>Barn_LOD01.glb</path>"));
        let lines = &output.tiles.values().next().unwrap().lines;
        assert!(lines[0].starts_with("OBJECT_STATIC Big_Barn.xml "));
    }

    #[test]
    fn non_unit_scale_forces_indirection() {
        let guid = Guid::from_bytes([3; 16]);
        let models = vec![model(guid, "Crane", &["Crane_LOD00"])];
        let mut placements = HashMap::new();
        placements.insert(guid, vec![placement(guid, 10.0, 10.0, 2.0)]);

        let output = join(&models, &placements);
        assert!(output.files.iter().any(|f| f.name == "Crane.xml"));
    }

    #[test]
    fn model_without_placements_is_skipped() {
        let models = vec![model(Guid::from_bytes([4; 16]), "Orphan", &["Orphan_LOD00"])];
        let output = join(&models, &HashMap::new());
        assert!(output.files.is_empty());
        assert!(output.tiles.is_empty());
    }

    #[test]
    fn out_of_range_placement_is_skipped() {
        let guid = Guid::from_bytes([5; 16]);
        let models = vec![model(guid, "Edge", &["Edge_LOD00"])];
        let mut placements = HashMap::new();
        placements.insert(
            guid,
            vec![
                placement(guid, 95.0, 0.0, 1.0),
                placement(guid, 45.0, 9.0, 1.0),
            ],
        );

        let output = join(&models, &placements);
        let lines: usize = output.tiles.values().map(|t| t.lines.len()).sum();
        assert_eq!(lines, 1);
    }

    #[test]
    fn placements_grouped_by_tile() {
        let guid = Guid::from_bytes([6; 16]);
        let models = vec![model(guid, "Shed", &["Shed_LOD00"])];
        let mut placements = HashMap::new();
        placements.insert(
            guid,
            vec![
                placement(guid, 45.01, 9.01, 1.0),
                placement(guid, 45.02, 9.02, 1.0),
                placement(guid, 46.5, 9.01, 1.0),
            ],
        );

        let output = join(&models, &placements);
        let lines: usize = output.tiles.values().map(|t| t.lines.len()).sum();
        assert_eq!(lines, 3);
        assert_eq!(output.tiles.len(), 2);
    }
}
