//! Decode-side view of the metadata embedded in a sample.

use crate::store::Eye;
use crate::tag::{tags, Tag};
use crate::value::{MetadataEntry, MetadataRecord, MetadataType};
use crate::wire;
use cfhd_core::{Error, Result};

/// Metadata payload copied out of one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleMetadata {
    payload: Vec<u8>,
}

impl SampleMetadata {
    /// Wrap a serialized payload.
    pub fn new(payload: Vec<u8>) -> Self {
        SampleMetadata { payload }
    }

    /// Copy a serialized payload.
    pub fn from_bytes(payload: &[u8]) -> Self {
        Self::new(payload.to_vec())
    }

    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the sample carried no metadata.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Start a sequential read from the first record.
    pub fn cursor(&self) -> MetadataCursor<'_> {
        MetadataCursor {
            data: &self.payload,
            offset: 0,
        }
    }

    /// First top-level record with `tag`.
    pub fn find(&self, tag: Tag) -> Result<MetadataRecord<'_>> {
        let mut cursor = self.cursor();
        loop {
            let record = cursor.read_next()?;
            if record.tag == tag {
                return Ok(record);
            }
        }
    }

    /// Records that apply to one eye: shared records with the eye's delta applied.
    pub fn eye_view(&self, eye: Eye) -> Result<Vec<MetadataEntry>> {
        let mut shared = Vec::new();
        let mut delta = Vec::new();
        for record in self.cursor() {
            let record = record?;
            if record.tag == tags::EYE_DELTA_LEFT || record.tag == tags::EYE_DELTA_RIGHT {
                if Some(record.tag) == eye.delta_tag() && record.ty == MetadataType::Packed {
                    delta.extend(wire::unpack_block(record.data)?);
                }
                continue;
            }
            shared.push(record.to_entry());
        }

        for entry in delta {
            match shared.iter_mut().find(|e| e.tag == entry.tag) {
                Some(existing) => *existing = entry,
                None => shared.push(entry),
            }
        }
        Ok(shared)
    }
}

/// Sequential reader over a metadata payload.
///
/// A cursor only moves forward; start again with [`SampleMetadata::cursor`].
#[derive(Debug, Clone)]
pub struct MetadataCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> MetadataCursor<'a> {
    /// Read a cursor directly over serialized records.
    pub fn over(data: &'a [u8]) -> Self {
        MetadataCursor { data, offset: 0 }
    }

    /// Next record, or [`Error::MetadataEnd`] once exhausted.
    pub fn read_next(&mut self) -> Result<MetadataRecord<'a>> {
        let rest = &self.data[self.offset.min(self.data.len())..];
        match wire::read_record(rest)? {
            Some((record, used)) => {
                self.offset += used;
                Ok(record)
            }
            None => {
                self.offset = self.data.len();
                Err(Error::MetadataEnd)
            }
        }
    }
}

impl<'a> Iterator for MetadataCursor<'a> {
    type Item = Result<MetadataRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Err(Error::MetadataEnd) => None,
            other => {
                if other.is_err() {
                    self.offset = self.data.len();
                }
                Some(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GlobalMetadata;

    fn entry(tag: Tag, value: f32) -> MetadataEntry {
        MetadataEntry::new(tag, MetadataType::Float, value.to_le_bytes().to_vec()).unwrap()
    }

    fn sample() -> SampleMetadata {
        let global = GlobalMetadata {
            mono: vec![entry(tags::EXPOSURE, 1.0), entry(tags::SATURATION, 1.0)],
            deltas: [vec![entry(tags::SATURATION, 0.5)], vec![entry(tags::WHITE_BALANCE, 2.0)]],
        };
        SampleMetadata::new(global.frame_payload(&[]))
    }

    #[test]
    fn test_cursor_reads_to_end() {
        let metadata = sample();
        let mut cursor = metadata.cursor();
        let mut tags_seen = Vec::new();
        loop {
            match cursor.read_next() {
                Ok(record) => tags_seen.push(record.tag),
                Err(e) => {
                    assert!(e.is_metadata_end());
                    break;
                }
            }
        }
        assert_eq!(
            tags_seen,
            vec![tags::EXPOSURE, tags::SATURATION, tags::EYE_DELTA_LEFT, tags::EYE_DELTA_RIGHT]
        );
        // Exhausted cursors stay exhausted.
        assert!(cursor.read_next().unwrap_err().is_metadata_end());
    }

    #[test]
    fn test_find() {
        let metadata = sample();
        let record = metadata.find(tags::SATURATION).unwrap();
        assert_eq!(record.data, &1.0f32.to_le_bytes()[..]);
        assert!(matches!(metadata.find(tags::TIMECODE), Err(Error::MetadataEnd)));
    }

    #[test]
    fn test_eye_view() {
        let metadata = sample();
        let mono = metadata.eye_view(Eye::Mono).unwrap();
        assert_eq!(mono, vec![entry(tags::EXPOSURE, 1.0), entry(tags::SATURATION, 1.0)]);

        let left = metadata.eye_view(Eye::Left).unwrap();
        assert_eq!(left, vec![entry(tags::EXPOSURE, 1.0), entry(tags::SATURATION, 0.5)]);

        let right = metadata.eye_view(Eye::Right).unwrap();
        assert_eq!(right.len(), 3);
        assert_eq!(right[2], entry(tags::WHITE_BALANCE, 2.0));
    }

    #[test]
    fn test_empty_payload() {
        let metadata = SampleMetadata::default();
        assert!(metadata.is_empty());
        assert_eq!(metadata.cursor().count(), 0);
    }

    #[test]
    fn test_corrupt_payload_reports_once() {
        let mut bytes = sample().as_bytes().to_vec();
        bytes[7] = b'?';
        let metadata = SampleMetadata::new(bytes);
        let results: Vec<_> = metadata.cursor().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
