//! BGL container header validation and record table classification.
//!
//! The file opens with a 0x38-byte prologue carrying two magic sequences and a
//! record count, followed by fixed-size record table rows. Each row classifies
//! a subsection of the file by a 4-byte type code; everything except
//! scenery-object and model-data records is ignored.

use tracing::debug;
use winnow::Parser;
use winnow::binary::le_u32;
use winnow::token::take;

use crate::parser_utils::{WResult, slice_from, slice_range};

use super::BglError;

const MAGIC_1: [u8; 4] = [0x01, 0x02, 0x92, 0x19];
const MAGIC_2: [u8; 4] = [0x03, 0x18, 0x05, 0x08];

const MAGIC_2_OFFSET: usize = 0x10;
const RECORD_COUNT_OFFSET: usize = 0x14;
const HEADER_LEN: usize = 0x38;
const RECORD_LEN: usize = 0x14;

/// Record type code for scenery-object (placement) subsections.
pub const RECORD_SCENERY_OBJECT: u32 = 0x25;
/// Record type code for model-data subsections.
pub const RECORD_MODEL_DATA: u32 = 0x2B;

/// One classified record table row: where its subsection lives in the file.
#[derive(Debug, Clone, Copy)]
pub struct RecordPointer {
    /// Absolute byte offset of the subsection.
    pub offset: u32,
    /// Declared subsection size in bytes.
    pub size: u32,
}

/// The classified record table of one BGL file.
#[derive(Debug, Default)]
pub struct ContainerDirectory {
    pub placement_records: Vec<RecordPointer>,
    pub model_records: Vec<RecordPointer>,
}

/// Subrecord table header found at `record offset + 4`: a counted, sized run
/// of subrecords located at an absolute file offset.
#[derive(Debug, Clone, Copy)]
pub struct SubrecordTable {
    pub count: u32,
    /// Absolute byte offset of the subrecord run.
    pub offset: u32,
    /// Total byte length of the subrecord run.
    pub byte_length: u32,
}

fn parse_record_row(input: &mut &[u8]) -> WResult<(u32, u32, u32)> {
    let record_type = le_u32.parse_next(input)?;
    let _unknown: &[u8] = take(8usize).parse_next(input)?;
    let subsection_offset = le_u32.parse_next(input)?;
    let subsection_size = le_u32.parse_next(input)?;
    Ok((record_type, subsection_offset, subsection_size))
}

/// Validate the container header and classify the record table.
///
/// Magic mismatch rejects the file outright. Unknown record types are skipped
/// silently; other record kinds exist in real files and are irrelevant here.
pub fn read_container(file_data: &[u8]) -> Result<ContainerDirectory, BglError> {
    let magic1 = slice_range(file_data, 0, 4).ok_or(BglError::Truncated {
        what: "container header",
        offset: 0,
    })?;
    if magic1 != MAGIC_1 {
        return Err(BglError::BadMagic {
            which: 1,
            found: magic1.try_into().unwrap_or([0; 4]),
        });
    }
    let magic2 = slice_range(file_data, MAGIC_2_OFFSET, 4).ok_or(BglError::Truncated {
        what: "container header",
        offset: MAGIC_2_OFFSET,
    })?;
    if magic2 != MAGIC_2 {
        return Err(BglError::BadMagic {
            which: 2,
            found: magic2.try_into().unwrap_or([0; 4]),
        });
    }

    let record_count = slice_range(file_data, RECORD_COUNT_OFFSET, 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(BglError::Truncated {
            what: "record count",
            offset: RECORD_COUNT_OFFSET,
        })?;

    let mut directory = ContainerDirectory::default();
    for i in 0..record_count as usize {
        let row_offset = HEADER_LEN + i * RECORD_LEN;
        let row = slice_range(file_data, row_offset, RECORD_LEN).ok_or(BglError::Truncated {
            what: "record table row",
            offset: row_offset,
        })?;
        let input = &mut &row[..];
        let (record_type, subsection_offset, subsection_size) =
            parse_record_row(input).map_err(|e| BglError::parse_at(row_offset, e))?;

        let pointer = RecordPointer {
            offset: subsection_offset,
            size: subsection_size,
        };
        match record_type {
            RECORD_SCENERY_OBJECT => {
                debug!(offset = format_args!("0x{subsection_offset:X}"), "found scenery object record");
                directory.placement_records.push(pointer);
            }
            RECORD_MODEL_DATA => {
                debug!(offset = format_args!("0x{subsection_offset:X}"), "found model data record");
                directory.model_records.push(pointer);
            }
            _ => {}
        }
    }

    Ok(directory)
}

/// Read the subrecord table header of a record's subsection.
pub fn read_subrecord_table(
    file_data: &[u8],
    record: &RecordPointer,
) -> Result<SubrecordTable, BglError> {
    let header_offset = record.offset as usize + 4;
    let header = slice_from(file_data, header_offset)
        .filter(|rest| rest.len() >= 12)
        .ok_or(BglError::Truncated {
            what: "subrecord table header",
            offset: header_offset,
        })?;
    let input = &mut &header[..];
    let count = le_u32
        .parse_next(input)
        .map_err(|e| BglError::parse_at(header_offset, e))?;
    let offset = le_u32
        .parse_next(input)
        .map_err(|e| BglError::parse_at(header_offset, e))?;
    let byte_length = le_u32
        .parse_next(input)
        .map_err(|e| BglError::parse_at(header_offset, e))?;
    Ok(SubrecordTable {
        count,
        offset,
        byte_length,
    })
}
