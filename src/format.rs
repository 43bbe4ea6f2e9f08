//! Defines the physical binary layout of the portable wire format.
//!
//! # Frame Layout
//! One encoded value ("frame") starts with a flag byte. `NULL` and `HANDLE`
//! frames are flag-only (plus a 4-byte handle index); `OBJECT` frames carry a
//! fixed 18-byte header followed by a named-field region and a raw region:
//!
//! Frame: `flag(1) | isUserType(1) | typeId(4) | contentHash(4) | totalLength(4) | rawDataOffset(4)`
//! then `[named-field entries] [raw bytes]`
//!
//! `totalLength` spans from the flag byte through the end of the frame and is
//! backpatched once the body is written; `rawDataOffset` is relative to the
//! frame start and is only meaningful for user-record frames (zero when the
//! frame has no raw region).
//!
//! ## Named-Field Entry
//! `fieldId(4) | fieldLength(4) | payload(fieldLength bytes)`
//!
//! A typed payload opens with a 1-byte type code; a variant-valued payload is
//! a complete nested frame (flag-first). The two are distinguished by the
//! first byte: type codes stay below `0x80`, flags start at it.

use std::hash::Hasher;
use twox_hash::XxHash32;

use crate::error::{GridportError, Result};
use crate::io::ByteCursor;

/// Frame flag: the encoded value is absent.
pub const FLAG_NULL: u8 = 0x80;
/// Frame flag: a 4-byte handle index to a previously encoded record follows.
pub const FLAG_HANDLE: u8 = 0x81;
/// Frame flag: an 18-byte object header follows.
pub const FLAG_OBJECT: u8 = 0x82;
/// Frame flag reserved for metadata frames. Never emitted by this codec.
pub const FLAG_METADATA: u8 = 0x83;

/// Type code for a signed byte.
pub const TYPE_BYTE: u8 = 1;
/// Type code for an i16.
pub const TYPE_SHORT: u8 = 2;
/// Type code for an i32.
pub const TYPE_INT: u8 = 3;
/// Type code for an i64.
pub const TYPE_LONG: u8 = 4;
/// Type code for an f32.
pub const TYPE_FLOAT: u8 = 5;
/// Type code for an f64.
pub const TYPE_DOUBLE: u8 = 6;
/// Type code for a UTF-16 code unit.
pub const TYPE_CHAR: u8 = 7;
/// Type code for a bool.
pub const TYPE_BOOL: u8 = 8;
/// Type code for a UTF-8 string.
pub const TYPE_STRING: u8 = 9;
/// Type code for a 128-bit UUID.
pub const TYPE_UUID: u8 = 10;
/// Type code for a byte array.
pub const TYPE_BYTE_ARR: u8 = 11;
/// Type code for an i16 array.
pub const TYPE_SHORT_ARR: u8 = 12;
/// Type code for an i32 array.
pub const TYPE_INT_ARR: u8 = 13;
/// Type code for an i64 array.
pub const TYPE_LONG_ARR: u8 = 14;
/// Type code for an f32 array.
pub const TYPE_FLOAT_ARR: u8 = 15;
/// Type code for an f64 array.
pub const TYPE_DOUBLE_ARR: u8 = 16;
/// Type code for a UTF-16 code-unit array.
pub const TYPE_CHAR_ARR: u8 = 17;
/// Type code for a bool array (one byte per element).
pub const TYPE_BOOL_ARR: u8 = 18;
/// Type code for a string sequence.
pub const TYPE_STRING_ARR: u8 = 19;
/// Type code for a UUID sequence.
pub const TYPE_UUID_ARR: u8 = 20;
/// Type code for a wide (UTF-16) string. Code 21 is skipped: it is reserved
/// for object arrays, a kind outside this codec's variant set.
pub const TYPE_WSTRING: u8 = 22;
/// Type code for an ordered collection of variants.
pub const TYPE_COLLECTION: u8 = 100;
/// Type code for a variant-to-variant map.
pub const TYPE_MAP: u8 = 200;

/// The fixed size of an OBJECT frame header, flag byte included.
/// flag(1) + isUserType(1) + typeId(4) + contentHash(4) + totalLength(4) + rawDataOffset(4) = 18
pub const HEADER_SIZE: usize = 18;

/// Frame-relative offset of the backpatched `totalLength` field.
pub const TOTAL_LENGTH_OFFSET: usize = 10;

/// Frame-relative offset of the backpatched `rawDataOffset` field.
pub const RAW_OFFSET_OFFSET: usize = 14;

/// The parsed fixed header of an OBJECT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// True for user-record frames, false for standard kinds.
    pub user_type: bool,
    /// The user type id, or the standard type code widened to i32.
    pub type_id: i32,
    /// Deterministic content hash of the encoded value (zero for records).
    pub content_hash: i32,
    /// Bytes from the frame's flag byte through its end, inclusive.
    pub total_length: i32,
    /// Frame-relative start of the raw region; zero when unused.
    pub raw_offset: i32,
}

impl FrameHeader {
    /// Parses the header of the OBJECT frame starting at `frame_start`
    /// (pointing at the flag byte) and validates its length fields against
    /// the buffer.
    pub fn read_at(input: &ByteCursor<'_>, frame_start: usize) -> Result<Self> {
        let flag = input.u8_at(frame_start)?;
        if flag != FLAG_OBJECT {
            return Err(GridportError::ProtocolViolation(format!(
                "expected object frame at offset {frame_start}, found flag 0x{flag:02x}"
            )));
        }
        let header = Self {
            user_type: input.bool_at(frame_start + 1)?,
            type_id: input.i32_at(frame_start + 2)?,
            content_hash: input.i32_at(frame_start + 6)?,
            total_length: input.i32_at(frame_start + TOTAL_LENGTH_OFFSET)?,
            raw_offset: input.i32_at(frame_start + RAW_OFFSET_OFFSET)?,
        };

        if header.total_length < HEADER_SIZE as i32 {
            return Err(GridportError::ProtocolViolation(format!(
                "frame at offset {frame_start} declares total length {}",
                header.total_length
            )));
        }
        let total = header.total_length as usize;
        if frame_start + total > input.len() {
            return Err(GridportError::BufferUnderrun {
                offset: frame_start,
                wanted: total,
                available: input.len() - frame_start,
            });
        }
        if header.raw_offset != 0
            && (header.raw_offset < HEADER_SIZE as i32 || header.raw_offset > header.total_length)
        {
            return Err(GridportError::ProtocolViolation(format!(
                "frame at offset {frame_start} declares raw offset {} outside its {} bytes",
                header.raw_offset, header.total_length
            )));
        }
        Ok(header)
    }

    /// End of this frame, as an absolute buffer offset.
    pub fn frame_end(&self, frame_start: usize) -> usize {
        frame_start + self.total_length as usize
    }
}

/// Deterministic, pure hash of a field name, used whenever the id resolver is
/// absent or declines a name. Case-sensitive, a function of the UTF-8 bytes
/// only, and identical between the encode and decode paths.
pub fn field_name_hash(name: &str) -> i32 {
    let mut hasher = XxHash32::with_seed(0);
    hasher.write(name.as_bytes());
    hasher.finish() as i32
}
