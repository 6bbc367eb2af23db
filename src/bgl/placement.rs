//! Scenery-object subrecord decoding.
//!
//! Placement subrecords form a tag/length stream: each subrecord declares a
//! 2-byte tag and a 2-byte length counted from the subrecord's first byte.
//! Only library-object placements (tag 0x0B) are decoded; anything else is
//! skipped via its declared length.

use tracing::{debug, warn};
use winnow::Parser;
use winnow::binary::{le_f32, le_i16, le_u16, le_u32};
use winnow::token::take;

use crate::geo::ElevationSource;
use crate::parser_utils::{WResult, slice_from, slice_range};

use super::container::SubrecordTable;
use super::{BglError, Guid};

/// Subrecord tag for a library-object placement.
pub const TAG_LIBRARY_OBJECT: u16 = 0x0B;

/// Minimum byte length of a library-object subrecord (tag, length, and the
/// fixed field layout).
const ENTRY_MIN_LEN: usize = 0x42;

const LON_FACTOR: f64 = 360.0 / 805_306_368.0;
const LAT_FACTOR: f64 = 180.0 / 536_870_912.0;
const ANGLE_FACTOR: f64 = 360.0 / 65_536.0;

/// Placement flag set decoded from six on-disk flag bytes: a nonzero byte at
/// index `i` sets bit `i`. `NO_Z_TEST` is defined by the format but cannot be
/// produced by the six bytes current files carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementFlags(u8);

impl PlacementFlags {
    pub const IS_ABOVE_AGL: PlacementFlags = PlacementFlags(1 << 0);
    pub const NO_AUTOGEN_SUPPRESSION: PlacementFlags = PlacementFlags(1 << 1);
    pub const NO_CRASH: PlacementFlags = PlacementFlags(1 << 2);
    pub const NO_FOG: PlacementFlags = PlacementFlags(1 << 3);
    pub const NO_SHADOW: PlacementFlags = PlacementFlags(1 << 4);
    pub const NO_Z_WRITE: PlacementFlags = PlacementFlags(1 << 5);
    pub const NO_Z_TEST: PlacementFlags = PlacementFlags(1 << 6);

    const NAMES: [(PlacementFlags, &'static str); 7] = [
        (Self::IS_ABOVE_AGL, "IsAboveAgl"),
        (Self::NO_AUTOGEN_SUPPRESSION, "NoAutogenSuppression"),
        (Self::NO_CRASH, "NoCrash"),
        (Self::NO_FOG, "NoFog"),
        (Self::NO_SHADOW, "NoShadow"),
        (Self::NO_Z_WRITE, "NoZWrite"),
        (Self::NO_Z_TEST, "NoZTest"),
    ];

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut flags = 0u8;
        for (i, &b) in bytes.iter().enumerate().take(7) {
            if b != 0 {
                flags |= 1 << i;
            }
        }
        PlacementFlags(flags)
    }

    pub fn contains(&self, other: PlacementFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PlacementFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// How the on-disk scale field maps to the effective scale. Producers disagree
/// on whether the stored float is the scale itself or scale minus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleBias {
    /// Effective scale is `raw + 1`.
    #[default]
    RawPlusOne,
    /// Effective scale is the raw float.
    Raw,
}

/// When terrain elevation is added to the placement altitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AglAdjust {
    /// Adjust when the IsAboveAgl flag is absent (altitude is ground-relative).
    #[default]
    WhenFlagAbsent,
    /// Adjust when the IsAboveAgl flag is set.
    WhenFlagSet,
    /// Never adjust.
    Never,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementConfig {
    pub scale_bias: ScaleBias,
    pub agl: AglAdjust,
}

/// One decoded library-object placement.
#[derive(Debug, Clone)]
pub struct ScenicPlacement {
    pub guid: Guid,
    /// Degrees, -180..180.
    pub longitude: f64,
    /// Degrees, -90..90.
    pub latitude: f64,
    /// Meters, elevation-adjusted per [`AglAdjust`].
    pub altitude: f64,
    pub flags: PlacementFlags,
    /// Degrees.
    pub pitch: f64,
    /// Degrees.
    pub bank: f64,
    /// Degrees.
    pub heading: f64,
    pub image_complexity: i16,
    pub scale: f64,
}

struct RawPlacement {
    longitude: u32,
    latitude: u32,
    altitude: i16,
    flags: PlacementFlags,
    pitch: u16,
    bank: u16,
    heading: u16,
    image_complexity: i16,
    guid: Guid,
    scale: f32,
}

fn parse_placement_fields(input: &mut &[u8]) -> WResult<RawPlacement> {
    let longitude = le_u32.parse_next(input)?;
    let latitude = le_u32.parse_next(input)?;
    let altitude = le_i16.parse_next(input)?;
    let flag_bytes: &[u8] = take(6usize).parse_next(input)?;
    let flags = PlacementFlags::from_bytes(flag_bytes);
    let pitch = le_u16.parse_next(input)?;
    let bank = le_u16.parse_next(input)?;
    let heading = le_u16.parse_next(input)?;
    let image_complexity = le_i16.parse_next(input)?;
    let _reserved_guid: &[u8] = take(16usize).parse_next(input)?;
    let guid_bytes: &[u8] = take(16usize).parse_next(input)?;
    let guid = Guid::from_bytes(guid_bytes.try_into().unwrap_or([0; 16]));
    let scale = le_f32.parse_next(input)?;
    let _unknown: &[u8] = take(2usize).parse_next(input)?;
    Ok(RawPlacement {
        longitude,
        latitude,
        altitude,
        flags,
        pitch,
        bank,
        heading,
        image_complexity,
        guid,
        scale,
    })
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Decode all library-object placements in one subrecord run.
///
/// Unknown subrecord tags are skipped via their declared length; a zero or
/// out-of-bounds length is fatal for the file.
pub fn decode_placements(
    file_data: &[u8],
    table: &SubrecordTable,
    config: &PlacementConfig,
    elevation: &dyn ElevationSource,
) -> Result<Vec<ScenicPlacement>, BglError> {
    let base = table.offset as usize;
    let total = table.byte_length as usize;
    let mut placements = Vec::new();
    let mut consumed = 0usize;

    while consumed < total {
        let at = base + consumed;
        let header = slice_range(file_data, at, 4).ok_or(BglError::Truncated {
            what: "subrecord header",
            offset: at,
        })?;
        let tag = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        if len == 0 {
            return Err(BglError::ZeroLengthSubrecord { offset: at });
        }

        if tag != TAG_LIBRARY_OBJECT {
            warn!(
                tag = format_args!("0x{tag:04X}"),
                offset = format_args!("0x{at:X}"),
                skipped = len,
                "unexpected subrecord type, skipping"
            );
            consumed += len;
            continue;
        }

        if len < ENTRY_MIN_LEN {
            return Err(BglError::ParseError {
                offset: at,
                detail: format!("library object subrecord too short: {len} bytes"),
            });
        }
        let body = slice_from(file_data, at + 4)
            .filter(|rest| rest.len() >= ENTRY_MIN_LEN - 4)
            .ok_or(BglError::Truncated {
                what: "library object subrecord",
                offset: at,
            })?;
        let input = &mut &body[..];
        let raw = parse_placement_fields(input).map_err(|e| BglError::parse_at(at, e))?;

        let longitude = raw.longitude as f64 * LON_FACTOR - 180.0;
        let latitude = 90.0 - raw.latitude as f64 * LAT_FACTOR;
        let adjust = match config.agl {
            AglAdjust::WhenFlagAbsent => !raw.flags.contains(PlacementFlags::IS_ABOVE_AGL),
            AglAdjust::WhenFlagSet => raw.flags.contains(PlacementFlags::IS_ABOVE_AGL),
            AglAdjust::Never => false,
        };
        let altitude = if adjust {
            raw.altitude as f64 + elevation.elevation(latitude, longitude)
        } else {
            raw.altitude as f64
        };
        let scale = match config.scale_bias {
            ScaleBias::RawPlusOne => raw.scale as f64 + 1.0,
            ScaleBias::Raw => raw.scale as f64,
        };

        let placement = ScenicPlacement {
            guid: raw.guid,
            longitude,
            latitude,
            altitude,
            flags: raw.flags,
            pitch: round3(raw.pitch as f64 * ANGLE_FACTOR),
            bank: round3(raw.bank as f64 * ANGLE_FACTOR),
            heading: round3(raw.heading as f64 * ANGLE_FACTOR),
            image_complexity: raw.image_complexity,
            scale: round3(scale),
        };
        debug!(
            guid = %placement.guid,
            longitude = format_args!("{:.6}", placement.longitude),
            latitude = format_args!("{:.6}", placement.latitude),
            altitude = placement.altitude,
            flags = %placement.flags,
            heading = placement.heading,
            scale = placement.scale,
            "decoded placement"
        );
        placements.push(placement);
        consumed += len;
    }

    Ok(placements)
}
