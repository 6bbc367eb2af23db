//! Parsers for BGL scenery database files.
//!
//! A BGL file is a magic-validated container holding a table of typed records.
//! Two record kinds matter here: scenery-object records (placement instances)
//! and model-data records (embedded model containers). Each record points to a
//! subrecord table describing a contiguous run of subrecords; the two record
//! kinds use different iteration disciplines over that run.

/// Top-level container header and record table
pub mod container;
/// GXML model metadata (display name, LOD thresholds)
pub mod gxml;
/// Model-data subrecords: nested RIFF containers with embedded assets
pub mod model_data;
/// Scenery-object subrecords: placement instances
pub mod placement;

use std::fmt;

use thiserror::Error;

/// Structural errors while decoding a BGL file. All variants are fatal for the
/// file being processed; the caller decides whether to continue with the next
/// file.
#[derive(Debug, Error)]
pub enum BglError {
    #[error("bad container magic #{which}: found {found:02X?}")]
    BadMagic { which: u8, found: [u8; 4] },
    #[error("{what} at 0x{offset:X} extends beyond end of file")]
    Truncated { what: &'static str, offset: usize },
    #[error("subrecord at 0x{offset:X} declares zero length")]
    ZeroLengthSubrecord { offset: usize },
    #[error("parse error at 0x{offset:X}: {detail}")]
    ParseError { offset: usize, detail: String },
}

impl BglError {
    pub(crate) fn parse_at(
        offset: usize,
        e: winnow::error::ErrMode<winnow::error::ContextError>,
    ) -> Self {
        BglError::ParseError {
            offset,
            detail: format!("{e}"),
        }
    }
}

/// A 128-bit identifier correlating placement instances with model-data
/// entries. Stored on disk in the Windows GUID byte layout: the first three
/// groups are little-endian, the trailing eight bytes are in order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const NIL: Guid = Guid([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        let d1 = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let d2 = u16::from_le_bytes([b[4], b[5]]);
        let d3 = u16::from_le_bytes([b[6], b[7]]);
        write!(
            f,
            "{d1:08x}-{d2:04x}-{d3:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_display_mixed_endian() {
        let guid = Guid::from_bytes([
            0x78, 0x56, 0x34, 0x12, 0xbc, 0x9a, 0xf0, 0xde, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef,
        ]);
        assert_eq!(
            guid.to_string(),
            "12345678-9abc-def0-0123-456789abcdef"
        );
    }

    #[test]
    fn nil_guid() {
        assert!(Guid::NIL.is_nil());
        assert!(!Guid::from_bytes([1; 16]).is_nil());
    }
}
