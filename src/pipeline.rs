//! Per-file scan pipeline and cross-file accumulation.
//!
//! Each input file is scanned independently into a [`ScanResult`]; results
//! merge into one accumulated set once all files are processed. Per-file
//! result sets are disjoint by construction, so callers may scan files in
//! parallel and merge afterwards without any shared mutable state.

use std::collections::HashMap;

use tracing::info;

use crate::bgl::container;
use crate::bgl::model_data::{self, ModelEntry};
use crate::bgl::placement::{self, PlacementConfig, ScenicPlacement};
use crate::bgl::{BglError, Guid};
use crate::geo::ElevationSource;
use crate::glb::RepackOptions;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    pub placement: PlacementConfig,
    pub repack: RepackOptions,
}

/// Everything extracted from one or more scanned files.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub placements: HashMap<Guid, Vec<ScenicPlacement>>,
    pub models: Vec<ModelEntry>,
}

impl ScanResult {
    pub fn merge(&mut self, other: ScanResult) {
        for (guid, mut group) in other.placements {
            self.placements.entry(guid).or_default().append(&mut group);
        }
        self.models.extend(other.models);
    }

    pub fn placement_count(&self) -> usize {
        self.placements.values().map(Vec::len).sum()
    }
}

/// Scan one BGL file: classify its records, decode every placement and model
/// subsection, and transcode embedded assets.
pub fn scan_file(
    file_data: &[u8],
    config: &ScanConfig,
    elevation: &dyn ElevationSource,
) -> Result<ScanResult, BglError> {
    let directory = container::read_container(file_data)?;
    let mut result = ScanResult::default();

    for record in &directory.placement_records {
        let table = container::read_subrecord_table(file_data, record)?;
        for placement in
            placement::decode_placements(file_data, &table, &config.placement, elevation)?
        {
            result
                .placements
                .entry(placement.guid)
                .or_default()
                .push(placement);
        }
    }

    for record in &directory.model_records {
        let table = container::read_subrecord_table(file_data, record)?;
        result
            .models
            .extend(model_data::decode_models(file_data, &table, &config.repack)?);
    }

    info!(
        placements = result.placement_count(),
        models = result.models.len(),
        "file scan complete"
    );
    Ok(result)
}
