//! Decode-side metadata tracks, active overrides and the colour database.
//!
//! The effective metadata for a decode is the sample's embedded records for the
//! chosen eye, overlaid by database records for the clip, overlaid by staged
//! active overrides. Which overlays apply depends on the track kind.

use crate::sample::SampleMetadata;
use crate::store::Eye;
use crate::tag::{tags, Tag};
use crate::value::{MetadataEntry, MetadataType};
use cfhd_core::Result;
use std::collections::HashMap;

/// Which view of the metadata a decoder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackKind {
    /// Values as recorded by the camera or encoder.
    Original,
    /// Values including user modifications.
    #[default]
    Modified,
}

/// Track selector: kind plus eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataTrack {
    pub kind: TrackKind,
    pub eye: Eye,
}

impl MetadataTrack {
    /// Camera-original values for the given eye.
    pub fn original(eye: Eye) -> Self {
        MetadataTrack {
            kind: TrackKind::Original,
            eye,
        }
    }

    /// User-modified values for the given eye.
    pub fn modified(eye: Eye) -> Self {
        MetadataTrack {
            kind: TrackKind::Modified,
            eye,
        }
    }

    /// Whether colour database records override embedded ones.
    pub fn applies_database(&self) -> bool {
        self.kind == TrackKind::Modified
    }

    /// Whether staged active overrides apply.
    pub fn applies_active(&self) -> bool {
        self.kind == TrackKind::Modified
    }
}

/// External store of per-clip colour corrections.
pub trait ColorDatabase: Send + Sync {
    /// Records stored for the clip with this GUID.
    fn lookup(&self, clip: &[u8; 16]) -> Vec<MetadataEntry>;
}

/// Colour database held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryColorDatabase {
    clips: HashMap<[u8; 16], Vec<MetadataEntry>>,
}

impl InMemoryColorDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record for a clip, replacing one with the same tag.
    pub fn insert(&mut self, clip: [u8; 16], entry: MetadataEntry) {
        let records = self.clips.entry(clip).or_default();
        overlay(records, std::iter::once(entry));
    }
}

impl ColorDatabase for InMemoryColorDatabase {
    fn lookup(&self, clip: &[u8; 16]) -> Vec<MetadataEntry> {
        self.clips.get(clip).cloned().unwrap_or_default()
    }
}

/// Overrides staged on a decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMetadata {
    entries: Vec<MetadataEntry>,
}

impl ActiveMetadata {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an override, replacing a previous one for the same tag.
    pub fn set(&mut self, tag: Tag, ty: MetadataType, data: &[u8]) -> Result<()> {
        let entry = MetadataEntry::new(tag, ty, data.to_vec())?;
        overlay(&mut self.entries, std::iter::once(entry));
        Ok(())
    }

    /// Drop all overrides.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }
}

/// Resolve the metadata handed to the transform for one decode.
pub fn resolve(
    sample: &SampleMetadata,
    eye: Eye,
    database: Option<&dyn ColorDatabase>,
    active: Option<&ActiveMetadata>,
) -> Result<Vec<MetadataEntry>> {
    let mut records = sample.eye_view(eye)?;

    if let Some(database) = database {
        let clip = records
            .iter()
            .find(|e| e.tag == tags::CLIP_GUID && e.data.len() == 16)
            .map(|e| {
                let mut guid = [0u8; 16];
                guid.copy_from_slice(&e.data);
                guid
            });
        if let Some(clip) = clip {
            overlay(&mut records, database.lookup(&clip));
        }
    }

    if let Some(active) = active {
        overlay(&mut records, active.entries.iter().cloned());
    }
    Ok(records)
}

fn overlay(records: &mut Vec<MetadataEntry>, overrides: impl IntoIterator<Item = MetadataEntry>) {
    for entry in overrides {
        match records.iter_mut().find(|e| e.tag == entry.tag) {
            Some(existing) => *existing = entry,
            None => records.push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GlobalMetadata;

    const CLIP: [u8; 16] = [5u8; 16];

    fn float(tag: Tag, v: f32) -> MetadataEntry {
        MetadataEntry::new(tag, MetadataType::Float, v.to_le_bytes().to_vec()).unwrap()
    }

    fn sample() -> SampleMetadata {
        let global = GlobalMetadata {
            mono: vec![
                MetadataEntry::new(tags::CLIP_GUID, MetadataType::Guid, CLIP.to_vec()).unwrap(),
                float(tags::EXPOSURE, 1.0),
                float(tags::SATURATION, 1.0),
            ],
            deltas: Default::default(),
        };
        SampleMetadata::new(global.frame_payload(&[]))
    }

    #[test]
    fn test_track_flags() {
        assert!(!MetadataTrack::original(Eye::Mono).applies_active());
        assert!(!MetadataTrack::original(Eye::Mono).applies_database());
        assert!(MetadataTrack::modified(Eye::Left).applies_active());
        assert!(MetadataTrack::modified(Eye::Left).applies_database());
    }

    #[test]
    fn test_resolution_order() {
        let mut database = InMemoryColorDatabase::new();
        database.insert(CLIP, float(tags::EXPOSURE, 2.0));
        database.insert(CLIP, float(tags::SATURATION, 3.0));

        let mut active = ActiveMetadata::new();
        active
            .set(tags::SATURATION, MetadataType::Float, &4.0f32.to_le_bytes())
            .unwrap();

        let records = resolve(&sample(), Eye::Mono, Some(&database), Some(&active)).unwrap();
        let value = |tag| records.iter().find(|e| e.tag == tag).unwrap().data.clone();
        assert_eq!(value(tags::EXPOSURE), 2.0f32.to_le_bytes().to_vec());
        assert_eq!(value(tags::SATURATION), 4.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_embedded_only() {
        let records = resolve(&sample(), Eye::Mono, None, None).unwrap();
        assert_eq!(records[1], float(tags::EXPOSURE, 1.0));
    }

    #[test]
    fn test_unknown_clip_ignored() {
        let mut database = InMemoryColorDatabase::new();
        database.insert([9u8; 16], float(tags::EXPOSURE, 7.0));
        let records = resolve(&sample(), Eye::Mono, Some(&database), None).unwrap();
        assert_eq!(records[1], float(tags::EXPOSURE, 1.0));
    }

    #[test]
    fn test_active_set_replaces() {
        let mut active = ActiveMetadata::new();
        active.set(tags::EXPOSURE, MetadataType::Float, &1.0f32.to_le_bytes()).unwrap();
        active.set(tags::EXPOSURE, MetadataType::Float, &2.0f32.to_le_bytes()).unwrap();
        assert_eq!(active.entries().len(), 1);
        assert!(active.set(tags::EXPOSURE, MetadataType::Float, &[]).is_err());
        active.clear();
        assert!(active.is_empty());
    }
}
