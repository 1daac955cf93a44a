//! Metadata type codes, typed values and records.
//!
//! Each type is identified on the wire by a single character. [`TYPE_TABLE`]
//! maps that character to the element size and the decoder for the payload;
//! [`MetadataValue::to_bytes`] is the matching encoder.

use crate::tag::Tag;
use crate::wire;
use byteorder::{ByteOrder, LittleEndian};
use cfhd_core::{Error, Result};

/// Largest payload a record can carry (24-bit length field).
pub const MAX_PAYLOAD: usize = 0x00FF_FFFF;

/// Payload type of a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetadataType {
    String,
    U8,
    U16,
    U32,
    Float,
    Double,
    Guid,
    Xml,
    LongHex,
    Hidden,
    TagRef,
    /// Self-describing block of packed records.
    Packed,
}

/// Wire description of one type code.
pub struct TypeCodec {
    pub ty: MetadataType,
    pub code: u8,
    /// Payload length must be a multiple of this.
    pub element_size: usize,
    /// Payload length must equal this when set.
    pub exact_size: Option<usize>,
    pub decode: fn(&[u8]) -> Result<MetadataValue>,
}

/// Type code table, keyed by the wire character.
pub static TYPE_TABLE: [TypeCodec; 12] = [
    TypeCodec { ty: MetadataType::String, code: b'c', element_size: 1, exact_size: None, decode: decode_string },
    TypeCodec { ty: MetadataType::U8, code: b'B', element_size: 1, exact_size: None, decode: decode_u8 },
    TypeCodec { ty: MetadataType::U16, code: b'S', element_size: 2, exact_size: None, decode: decode_u16 },
    TypeCodec { ty: MetadataType::U32, code: b'L', element_size: 4, exact_size: None, decode: decode_u32 },
    TypeCodec { ty: MetadataType::Float, code: b'f', element_size: 4, exact_size: None, decode: decode_float },
    TypeCodec { ty: MetadataType::Double, code: b'd', element_size: 8, exact_size: None, decode: decode_double },
    TypeCodec { ty: MetadataType::Guid, code: b'G', element_size: 1, exact_size: Some(16), decode: decode_guid },
    TypeCodec { ty: MetadataType::Xml, code: b'x', element_size: 1, exact_size: None, decode: decode_xml },
    TypeCodec { ty: MetadataType::LongHex, code: b'H', element_size: 1, exact_size: None, decode: decode_long_hex },
    TypeCodec { ty: MetadataType::Hidden, code: b'h', element_size: 1, exact_size: None, decode: decode_hidden },
    TypeCodec { ty: MetadataType::TagRef, code: b'T', element_size: 4, exact_size: Some(4), decode: decode_tag_ref },
    TypeCodec { ty: MetadataType::Packed, code: b'C', element_size: 1, exact_size: None, decode: decode_packed },
];

impl MetadataType {
    fn codec(&self) -> &'static TypeCodec {
        // Every variant has exactly one table row.
        TYPE_TABLE
            .iter()
            .find(|codec| codec.ty == *self)
            .unwrap_or(&TYPE_TABLE[0])
    }

    /// Wire character.
    pub fn code(&self) -> u8 {
        self.codec().code
    }

    /// Look up a wire character.
    pub fn from_code(code: u8) -> Option<Self> {
        TYPE_TABLE
            .iter()
            .find(|codec| codec.code == code)
            .map(|codec| codec.ty)
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        self.codec().element_size
    }

    /// Validate a payload length for this type.
    pub fn validate_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::invalid_arg("metadata payload is empty"));
        }
        if size > MAX_PAYLOAD {
            return Err(Error::invalid_arg(format!(
                "metadata payload of {} bytes exceeds {}",
                size, MAX_PAYLOAD
            )));
        }
        let codec = self.codec();
        if let Some(exact) = codec.exact_size {
            if size != exact {
                return Err(Error::invalid_arg(format!(
                    "{:?} payload must be {} bytes, got {}",
                    self, exact, size
                )));
            }
        }
        if size % codec.element_size != 0 {
            return Err(Error::invalid_arg(format!(
                "{:?} payload of {} bytes is not a multiple of {}",
                self, size, codec.element_size
            )));
        }
        Ok(())
    }

    /// Pack type and length into the 32-bit type+size word.
    pub fn type_size_word(&self, size: usize) -> u32 {
        (self.code() as u32) << 24 | (size as u32 & MAX_PAYLOAD as u32)
    }
}

/// Decoded metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Guid([u8; 16]),
    Xml(String),
    LongHex(Vec<u8>),
    Hidden(Vec<u8>),
    TagRef(Tag),
    Packed(Vec<MetadataEntry>),
}

impl MetadataValue {
    /// Decode a payload of the given type.
    pub fn parse(ty: MetadataType, data: &[u8]) -> Result<Self> {
        ty.validate_size(data.len())
            .map_err(|e| Error::BadFormat(e.to_string()))?;
        (ty.codec().decode)(data)
    }

    /// Type of this value.
    pub fn ty(&self) -> MetadataType {
        match self {
            MetadataValue::String(_) => MetadataType::String,
            MetadataValue::U8(_) => MetadataType::U8,
            MetadataValue::U16(_) => MetadataType::U16,
            MetadataValue::U32(_) => MetadataType::U32,
            MetadataValue::Float(_) => MetadataType::Float,
            MetadataValue::Double(_) => MetadataType::Double,
            MetadataValue::Guid(_) => MetadataType::Guid,
            MetadataValue::Xml(_) => MetadataType::Xml,
            MetadataValue::LongHex(_) => MetadataType::LongHex,
            MetadataValue::Hidden(_) => MetadataType::Hidden,
            MetadataValue::TagRef(_) => MetadataType::TagRef,
            MetadataValue::Packed(_) => MetadataType::Packed,
        }
    }

    /// Encode the payload (little-endian, unpadded).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MetadataValue::String(s) | MetadataValue::Xml(s) => s.as_bytes().to_vec(),
            MetadataValue::U8(v) | MetadataValue::LongHex(v) | MetadataValue::Hidden(v) => {
                v.clone()
            }
            MetadataValue::U16(v) => {
                let mut out = vec![0u8; v.len() * 2];
                LittleEndian::write_u16_into(v, &mut out);
                out
            }
            MetadataValue::U32(v) => {
                let mut out = vec![0u8; v.len() * 4];
                LittleEndian::write_u32_into(v, &mut out);
                out
            }
            MetadataValue::Float(v) => {
                let mut out = vec![0u8; v.len() * 4];
                LittleEndian::write_f32_into(v, &mut out);
                out
            }
            MetadataValue::Double(v) => {
                let mut out = vec![0u8; v.len() * 8];
                LittleEndian::write_f64_into(v, &mut out);
                out
            }
            MetadataValue::Guid(g) => g.to_vec(),
            MetadataValue::TagRef(tag) => tag.value().to_le_bytes().to_vec(),
            MetadataValue::Packed(entries) => wire::pack_block(entries),
        }
    }
}

fn text(data: &[u8]) -> String {
    let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn decode_string(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::String(text(data)))
}

fn decode_xml(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::Xml(text(data)))
}

fn decode_u8(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::U8(data.to_vec()))
}

fn decode_long_hex(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::LongHex(data.to_vec()))
}

fn decode_hidden(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::Hidden(data.to_vec()))
}

fn decode_u16(data: &[u8]) -> Result<MetadataValue> {
    let mut values = vec![0u16; data.len() / 2];
    LittleEndian::read_u16_into(data, &mut values);
    Ok(MetadataValue::U16(values))
}

fn decode_u32(data: &[u8]) -> Result<MetadataValue> {
    let mut values = vec![0u32; data.len() / 4];
    LittleEndian::read_u32_into(data, &mut values);
    Ok(MetadataValue::U32(values))
}

fn decode_float(data: &[u8]) -> Result<MetadataValue> {
    let mut values = vec![0f32; data.len() / 4];
    LittleEndian::read_f32_into(data, &mut values);
    Ok(MetadataValue::Float(values))
}

fn decode_double(data: &[u8]) -> Result<MetadataValue> {
    let mut values = vec![0f64; data.len() / 8];
    LittleEndian::read_f64_into(data, &mut values);
    Ok(MetadataValue::Double(values))
}

fn decode_guid(data: &[u8]) -> Result<MetadataValue> {
    let mut guid = [0u8; 16];
    guid.copy_from_slice(data);
    Ok(MetadataValue::Guid(guid))
}

fn decode_tag_ref(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::TagRef(Tag(LittleEndian::read_u32(data))))
}

fn decode_packed(data: &[u8]) -> Result<MetadataValue> {
    Ok(MetadataValue::Packed(wire::unpack_block(data)?))
}

/// Owned metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataEntry {
    pub tag: Tag,
    pub ty: MetadataType,
    pub data: Vec<u8>,
}

impl MetadataEntry {
    /// Create a record, validating the payload size for its type.
    pub fn new(tag: Tag, ty: MetadataType, data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        ty.validate_size(data.len())?;
        Ok(MetadataEntry { tag, ty, data })
    }

    /// Create a record from a typed value.
    pub fn from_value(tag: Tag, value: &MetadataValue) -> Result<Self> {
        MetadataEntry::new(tag, value.ty(), value.to_bytes())
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload.
    pub fn value(&self) -> Result<MetadataValue> {
        MetadataValue::parse(self.ty, &self.data)
    }

    /// Borrow as a record.
    pub fn as_record(&self) -> MetadataRecord<'_> {
        MetadataRecord {
            tag: self.tag,
            ty: self.ty,
            data: &self.data,
        }
    }
}

/// Borrowed metadata record, as read from a serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord<'a> {
    pub tag: Tag,
    pub ty: MetadataType,
    pub data: &'a [u8],
}

impl<'a> MetadataRecord<'a> {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload.
    pub fn value(&self) -> Result<MetadataValue> {
        MetadataValue::parse(self.ty, self.data)
    }

    /// Copy into an owned entry.
    pub fn to_entry(&self) -> MetadataEntry {
        MetadataEntry {
            tag: self.tag,
            ty: self.ty,
            data: self.data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::tags;

    #[test]
    fn test_type_codes() {
        assert_eq!(MetadataType::String.code(), b'c');
        assert_eq!(MetadataType::Packed.code(), b'C');
        assert_eq!(MetadataType::from_code(b'L'), Some(MetadataType::U32));
        assert_eq!(MetadataType::from_code(b'?'), None);
        for codec in TYPE_TABLE.iter() {
            assert_eq!(codec.ty.code(), codec.code);
        }
    }

    #[test]
    fn test_type_size_word() {
        let word = MetadataType::U32.type_size_word(8);
        assert_eq!(word >> 24, b'L' as u32);
        assert_eq!(word & 0x00FF_FFFF, 8);
    }

    #[test]
    fn test_validate_size() {
        assert!(MetadataType::U32.validate_size(8).is_ok());
        assert!(MetadataType::U32.validate_size(6).is_err());
        assert!(MetadataType::Guid.validate_size(16).is_ok());
        assert!(MetadataType::Guid.validate_size(15).is_err());
        assert!(MetadataType::String.validate_size(0).is_err());
        assert!(MetadataType::U8.validate_size(MAX_PAYLOAD + 1).is_err());
    }

    #[test]
    fn test_string_trims_terminator() {
        let value = MetadataValue::parse(MetadataType::String, b"hello\0\0\0").unwrap();
        assert_eq!(value, MetadataValue::String("hello".into()));
    }

    #[test]
    fn test_numeric_values() {
        let value = MetadataValue::Float(vec![1.5, -2.0]);
        let entry = MetadataEntry::from_value(tags::WHITE_BALANCE, &value).unwrap();
        assert_eq!(entry.size(), 8);
        assert_eq!(entry.value().unwrap(), value);

        let value = MetadataValue::TagRef(tags::LOOK_FILE);
        let entry = MetadataEntry::from_value(tags::CAMERA_NAME, &value).unwrap();
        assert_eq!(entry.value().unwrap(), value);
    }

    #[test]
    fn test_entry_rejects_bad_size() {
        let result = MetadataEntry::new(tags::EXPOSURE, MetadataType::Double, vec![0u8; 4]);
        assert!(result.is_err());
    }
}
