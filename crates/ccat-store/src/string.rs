//! String record layout.
//!
//! ```text
//! [tag u8] [parent id + 1, varint; chain tags only] [byte length, varint] [bytes]
//! ```
//!
//! Literal records hold a whole string. Chain records hold the text after the
//! last separator and point at the record for everything before it; the
//! separator itself is not stored. Each record picks its own width: narrow
//! stores Latin-1 (one byte per char), wide stores UTF-8.

use std::borrow::Cow;

use ccat_types::Id;

use crate::error::{StorageError, StorageResult};
use crate::varint::{decode_optional_id, decode_varint, encode_optional_id, encode_varint};

const TAG_LITERAL_NARROW: u8 = 0;
const TAG_LITERAL_WIDE: u8 = 1;
const TAG_CHAIN_NARROW: u8 = 2;
const TAG_CHAIN_WIDE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Width {
    Narrow,
    Wide,
}

/// A decoded string record borrowing the reader's bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StringRecord<'a> {
    pub parent: Option<Id>,
    pub width: Width,
    pub bytes: &'a [u8],
}

impl StringRecord<'_> {
    /// UTF-8 length of this record's own text.
    pub fn utf8_len(&self) -> usize {
        match self.width {
            Width::Narrow => self
                .bytes
                .iter()
                .map(|&b| if b < 0x80 { 1 } else { 2 })
                .sum(),
            Width::Wide => self.bytes.len(),
        }
    }

    /// Append this record's own text to `out`.
    pub fn push_to(&self, out: &mut String, id: Id) -> StorageResult<()> {
        match self.width {
            Width::Narrow => out.extend(self.bytes.iter().map(|&b| b as char)),
            Width::Wide => {
                let text = std::str::from_utf8(self.bytes)
                    .map_err(|e| StorageError::corrupt(id, format!("invalid UTF-8: {e}")))?;
                out.push_str(text);
            }
        }
        Ok(())
    }
}

/// Narrow (Latin-1) bytes when every char fits in one byte, else UTF-8.
fn encode_text(text: &str) -> (Width, Cow<'_, [u8]>) {
    if text.is_ascii() {
        return (Width::Narrow, Cow::Borrowed(text.as_bytes()));
    }
    if text.chars().all(|c| (c as u32) <= 0xFF) {
        let narrow = text.chars().map(|c| c as u8).collect();
        return (Width::Narrow, Cow::Owned(narrow));
    }
    (Width::Wide, Cow::Borrowed(text.as_bytes()))
}

/// Serialize a string record. `parent` makes it a chain record.
pub(crate) fn encode_record(parent: Option<Id>, text: &str) -> Vec<u8> {
    let (width, bytes) = encode_text(text);
    let tag = match (parent.is_some(), width) {
        (false, Width::Narrow) => TAG_LITERAL_NARROW,
        (false, Width::Wide) => TAG_LITERAL_WIDE,
        (true, Width::Narrow) => TAG_CHAIN_NARROW,
        (true, Width::Wide) => TAG_CHAIN_WIDE,
    };
    let mut record = Vec::with_capacity(bytes.len() + 8);
    record.push(tag);
    if parent.is_some() {
        encode_optional_id(&mut record, parent);
    }
    encode_varint(&mut record, bytes.len() as u64);
    record.extend_from_slice(&bytes);
    record
}

/// Parse the string record starting at `id` inside `data`.
pub(crate) fn decode_record(data: &[u8], id: Id) -> StorageResult<StringRecord<'_>> {
    let tail = data.get(id.offset()..).filter(|t| !t.is_empty()).ok_or(
        StorageError::InvalidId {
            id,
            needed: 1,
            len: data.len(),
        },
    )?;
    let (chained, width) = match tail[0] {
        TAG_LITERAL_NARROW => (false, Width::Narrow),
        TAG_LITERAL_WIDE => (false, Width::Wide),
        TAG_CHAIN_NARROW => (true, Width::Narrow),
        TAG_CHAIN_WIDE => (true, Width::Wide),
        other => return Err(StorageError::corrupt(id, format!("unknown string tag {other}"))),
    };
    let mut pos = 1;
    let parent = if chained {
        let (parent, consumed) = decode_optional_id(&tail[pos..], id)?;
        pos += consumed;
        match parent {
            Some(p) if p < id => Some(p),
            _ => return Err(StorageError::corrupt(id, "chain parent must precede its record")),
        }
    } else {
        None
    };
    let (len, consumed) = decode_varint(&tail[pos..], id)?;
    pos += consumed;
    let bytes = usize::try_from(len)
        .ok()
        .and_then(|len| tail.get(pos..pos.checked_add(len)?))
        .ok_or_else(|| StorageError::corrupt(id, "string bytes extend beyond buffer"))?;
    Ok(StringRecord {
        parent,
        width,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(parent: Option<Id>, text: &str) -> (Width, String) {
        // Pad so a chain parent can precede the record.
        let mut data = vec![0u8; 8];
        data.extend(encode_record(parent, text));
        let record = decode_record(&data, Id::new(8)).unwrap();
        assert_eq!(record.parent, parent);
        let mut out = String::new();
        record.push_to(&mut out, Id::new(8)).unwrap();
        assert_eq!(record.utf8_len(), out.len());
        (record.width, out)
    }

    #[test]
    fn ascii_is_narrow() {
        assert_eq!(roundtrip(None, "Assets"), (Width::Narrow, "Assets".into()));
    }

    #[test]
    fn latin1_is_narrow_and_shorter_than_utf8() {
        let text = "café";
        let record = encode_record(None, text);
        // tag + len + 4 narrow bytes
        assert_eq!(record.len(), 6);
        assert_eq!(roundtrip(None, text), (Width::Narrow, text.into()));
    }

    #[test]
    fn non_latin1_is_wide() {
        let text = "プレハブ";
        assert_eq!(roundtrip(None, text), (Width::Wide, text.into()));
    }

    #[test]
    fn empty_literal() {
        assert_eq!(encode_record(None, ""), vec![TAG_LITERAL_NARROW, 0]);
        assert_eq!(roundtrip(None, ""), (Width::Narrow, String::new()));
    }

    #[test]
    fn chain_record_keeps_parent() {
        let (_, text) = roundtrip(Some(Id::new(3)), "tex.png");
        assert_eq!(text, "tex.png");
    }

    #[test]
    fn chain_parent_must_precede() {
        let data = encode_record(Some(Id::new(0)), "x");
        let err = decode_record(&data, Id::new(0)).unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let err = decode_record(&[9, 0], Id::new(0)).unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));
    }

    #[test]
    fn truncated_bytes_are_corrupt() {
        let mut data = encode_record(None, "hello");
        data.truncate(4);
        assert!(decode_record(&data, Id::new(0)).is_err());
    }

    #[test]
    fn out_of_range_id() {
        let err = decode_record(b"", Id::new(0)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidId { .. }));
    }
}
