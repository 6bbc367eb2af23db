/// Parsers for BGL scenery database files (placements, model containers)
pub mod bgl;
/// Error definitions
pub mod error;
/// Joining placements with transcoded models into per-tile output artifacts
pub mod export;
/// Geographic tile indexing and the terrain elevation seam
pub mod geo;
/// Embedded GLB asset parsing and buffer transcoding
pub mod glb;
/// Shared winnow parsing helpers
pub mod parser_utils;
/// Per-file scan pipeline and cross-file accumulation
pub mod pipeline;
