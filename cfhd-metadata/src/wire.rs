//! Metadata wire format.
//!
//! A record is `[tag:4][type+size:4][payload]`, little-endian, with the payload
//! padded to a 4-byte boundary. The type+size word is `(type_char << 24) | length`.
//! A packed block is a flat concatenation of records.

use crate::tag::Tag;
use crate::value::{MetadataEntry, MetadataRecord, MetadataType, MAX_PAYLOAD};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use cfhd_core::{Error, Result};

/// Size of the tag and type+size words.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Smallest record a packed block parser will look at.
pub const MIN_PACKED_RECORD: usize = 12;

/// A single packed-block parse stops once this many bytes are consumed.
pub const PACKED_PARSE_LIMIT: usize = 4096;

/// Payload length rounded up to the 4-byte boundary.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Serialized size of one record.
pub fn record_len(payload: usize) -> usize {
    RECORD_HEADER_SIZE + padded_len(payload)
}

/// Split a type+size word into the type character and payload length.
pub fn split_type_size(word: u32) -> (u8, usize) {
    ((word >> 24) as u8, (word & MAX_PAYLOAD as u32) as usize)
}

/// Append one record.
pub fn write_record(out: &mut Vec<u8>, tag: Tag, ty: MetadataType, data: &[u8]) {
    // Writing into a Vec cannot fail.
    let _ = out.write_u32::<LittleEndian>(tag.value());
    let _ = out.write_u32::<LittleEndian>(ty.type_size_word(data.len()));
    out.extend_from_slice(data);
    out.resize(out.len() + padded_len(data.len()) - data.len(), 0);
}

/// Append one entry.
pub fn write_entry(out: &mut Vec<u8>, entry: &MetadataEntry) {
    write_record(out, entry.tag, entry.ty, &entry.data);
}

/// Read the record at the start of `buf`.
///
/// Returns `Ok(None)` when fewer than a header's worth of bytes remain or the
/// header is zero padding. On success also returns the bytes consumed.
pub fn read_record(buf: &[u8]) -> Result<Option<(MetadataRecord<'_>, usize)>> {
    if buf.len() < RECORD_HEADER_SIZE {
        return Ok(None);
    }
    let tag = Tag(LittleEndian::read_u32(&buf[0..4]));
    let word = LittleEndian::read_u32(&buf[4..8]);
    if tag.is_null() && word == 0 {
        return Ok(None);
    }

    let (code, size) = split_type_size(word);
    let ty = MetadataType::from_code(code).ok_or_else(|| {
        Error::BadFormat(format!("unknown metadata type 0x{:02X} for tag {}", code, tag))
    })?;
    let end = RECORD_HEADER_SIZE + size;
    if end > buf.len() {
        return Err(Error::BadFormat(format!(
            "metadata record {} needs {} bytes, {} available",
            tag,
            end,
            buf.len()
        )));
    }

    let record = MetadataRecord {
        tag,
        ty,
        data: &buf[RECORD_HEADER_SIZE..end],
    };
    let consumed = (RECORD_HEADER_SIZE + padded_len(size)).min(buf.len());
    Ok(Some((record, consumed)))
}

/// Serialize entries as one packed block.
pub fn pack_block(entries: &[MetadataEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.iter().map(|e| record_len(e.size())).sum());
    for entry in entries {
        write_entry(&mut out, entry);
    }
    out
}

/// Serialize entries as packed blocks that each parse completely in one call.
pub fn pack_chunks(entries: &[MetadataEntry]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for entry in entries {
        if !current.is_empty() && current.len() + record_len(entry.size()) > PACKED_PARSE_LIMIT {
            chunks.push(std::mem::take(&mut current));
        }
        write_entry(&mut current, entry);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Parse a packed block.
///
/// Parsing runs while at least [`MIN_PACKED_RECORD`] bytes remain and fewer than
/// [`PACKED_PARSE_LIMIT`] bytes have been consumed.
pub fn unpack_block(block: &[u8]) -> Result<Vec<MetadataEntry>> {
    let mut entries = Vec::new();
    let mut consumed = 0;
    while block.len() - consumed >= MIN_PACKED_RECORD && consumed < PACKED_PARSE_LIMIT {
        match read_record(&block[consumed..])? {
            Some((record, used)) => {
                entries.push(record.to_entry());
                consumed += used;
            }
            None => break,
        }
    }
    Ok(entries)
}
