//! GXML model metadata parsing.
//!
//! The GXML chunk of a model container carries an XML document naming the
//! model and listing its level-of-detail variants with minimum-pixel-size
//! thresholds.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum GxmlError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// One LOD row: the variant's model file name and the screen size below which
/// a simpler variant should be substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LodThreshold {
    pub model_file: String,
    pub min_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub lods: Vec<LodThreshold>,
}

/// Extract the model name and LOD thresholds from a GXML document.
///
/// A missing `ModelInfo/@name` falls back to `Unnamed_Model`; LOD rows with a
/// missing file name or an unparsable `minSize` are dropped.
pub fn parse_model_info(xml: &str) -> Result<ModelInfo, GxmlError> {
    let doc = roxmltree::Document::parse(xml)?;

    let name = doc
        .descendants()
        .find(|n| n.has_tag_name("ModelInfo"))
        .and_then(|n| n.attribute("name"))
        .map(|n| n.trim_end_matches(".gltf").to_owned())
        .unwrap_or_else(|| "Unnamed_Model".to_owned());

    let mut lods = Vec::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("LOD")) {
        let Some(model_file) = node.attribute("ModelFile") else {
            continue;
        };
        let min_size = match node.attribute("minSize").unwrap_or("0").parse::<u32>() {
            Ok(size) => size,
            Err(_) => {
                warn!(model_file, "unparsable LOD minSize, dropping LOD row");
                continue;
            }
        };
        lods.push(LodThreshold {
            model_file: model_file.trim_end_matches(".gltf").to_owned(),
            min_size,
        });
    }

    Ok(ModelInfo { name, lods })
}
