//! LEB128-style variable-length integers used in record headers.

use ccat_types::Id;

use crate::error::{StorageError, StorageResult};

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
///
/// `at` is the record being decoded and only feeds error reporting.
pub(crate) fn decode_varint(data: &[u8], at: Id) -> StorageResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        // The tenth byte may only carry bit 63.
        if shift >= 64 || (shift == 63 && byte > 1) {
            return Err(StorageError::corrupt(at, "varint overflow"));
        }
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(StorageError::corrupt(at, "truncated varint"))
}

/// Encode an optional id as `raw + 1`, reserving zero for "absent".
pub(crate) fn encode_optional_id(buf: &mut Vec<u8>, id: Option<Id>) {
    match id {
        Some(id) if !id.is_null() => encode_varint(buf, id.as_u32() as u64 + 1),
        _ => encode_varint(buf, 0),
    }
}

/// Inverse of [`encode_optional_id`].
pub(crate) fn decode_optional_id(data: &[u8], at: Id) -> StorageResult<(Option<Id>, usize)> {
    let (raw, consumed) = decode_varint(data, at)?;
    if raw == 0 {
        return Ok((None, consumed));
    }
    let raw = u32::try_from(raw - 1)
        .ok()
        .filter(|&r| r != u32::MAX)
        .ok_or_else(|| StorageError::corrupt(at, format!("id field {raw} out of range")))?;
    Ok((Some(Id::new(raw)), consumed))
}
