//! Encoder-side metadata store.
//!
//! The store holds three global scopes, one per eye, and a local scope. Global
//! records persist across frames until cleared. Local records apply to the next
//! encoded frame only: [`MetadataStore::take_changes`] hands them to the encoder
//! and frees them.

use crate::lut::SharedLutCache;
use crate::tag::{tags, Tag};
use crate::value::{MetadataEntry, MetadataType, MetadataValue};
use crate::wire;
use byteorder::{ByteOrder, LittleEndian};
use cfhd_core::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, trace};

/// Stereo eye selector for global metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Eye {
    /// Shared by both eyes.
    #[default]
    Mono,
    Left,
    Right,
}

impl Eye {
    /// Scope index (0 mono, 1 left, 2 right).
    pub fn index(&self) -> usize {
        match self {
            Eye::Mono => 0,
            Eye::Left => 1,
            Eye::Right => 2,
        }
    }

    /// Eye for a scope index.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Eye::Mono),
            1 => Some(Eye::Left),
            2 => Some(Eye::Right),
            _ => None,
        }
    }

    /// Tag of the delta container carrying this eye's overrides.
    pub fn delta_tag(&self) -> Option<Tag> {
        match self {
            Eye::Mono => None,
            Eye::Left => Some(tags::EYE_DELTA_LEFT),
            Eye::Right => Some(tags::EYE_DELTA_RIGHT),
        }
    }
}

/// Where an added record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetadataScope {
    /// The currently selected eye's global scope.
    Global,
    /// The next encoded frame only.
    Local,
}

/// Global metadata as attached to an encoder: eye 0 plus per-eye deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalMetadata {
    /// Records shared by both eyes.
    pub mono: Vec<MetadataEntry>,
    /// Left and right records absent from, or different to, `mono`.
    pub deltas: [Vec<MetadataEntry>; 2],
}

impl GlobalMetadata {
    /// Whether there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.mono.is_empty() && self.deltas.iter().all(Vec::is_empty)
    }

    /// Serialize the metadata for one frame, with `local` records merged over eye 0.
    pub fn frame_payload(&self, local: &[MetadataEntry]) -> Vec<u8> {
        let mut merged = self.mono.clone();
        for entry in local {
            upsert(&mut merged, entry.clone());
        }

        let mut out = Vec::new();
        for entry in &merged {
            wire::write_entry(&mut out, entry);
        }
        for (eye, delta) in [Eye::Left, Eye::Right].iter().zip(self.deltas.iter()) {
            if let Some(tag) = eye.delta_tag() {
                for chunk in wire::pack_chunks(delta) {
                    wire::write_record(&mut out, tag, MetadataType::Packed, &chunk);
                }
            }
        }
        out
    }
}

/// Pending changes handed from the store to an encoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataUpdate {
    pub global: GlobalMetadata,
    pub local: Vec<MetadataEntry>,
}

/// Typed metadata records with global, per-eye and local scoping.
///
/// Not thread-safe by contract: add from one producer thread, or wrap the store
/// in a [`SharedMetadataStore`] to attach it from several encoders.
#[derive(Debug, Default)]
pub struct MetadataStore {
    global: [Vec<MetadataEntry>; 3],
    local: Vec<MetadataEntry>,
    active_eye: Eye,
    changed: bool,
    lut: SharedLutCache,
}

impl MetadataStore {
    /// Create an empty store with its own look file cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that shares a look file cache with other stores.
    pub fn with_lut_cache(lut: SharedLutCache) -> Self {
        MetadataStore {
            lut,
            ..Self::default()
        }
    }

    /// Add a record.
    ///
    /// Special tags do not store the raw payload: [`tags::SELECT_EYE`] selects
    /// the global eye for following adds, and [`tags::LOOK_FILE`] resolves the
    /// path through the look file cache. A tag-0 packed block is unpacked and
    /// each contained record is added.
    pub fn add(&mut self, tag: Tag, ty: MetadataType, data: &[u8], scope: MetadataScope) -> Result<()> {
        if data.is_empty() {
            return Err(Error::invalid_arg(format!("metadata {} has no data", tag)));
        }
        if tag.is_null() && ty != MetadataType::Packed {
            return Err(Error::invalid_arg("metadata tag 0 is only valid for packed blocks"));
        }
        ty.validate_size(data.len())?;

        if tag.is_null() {
            let entries = wire::unpack_block(data)
                .map_err(|e| Error::invalid_arg(format!("bad packed block: {}", e)))?;
            trace!("Unpacking {} records from packed block", entries.len());
            // All or nothing: a bad record leaves the store as it was.
            let mut staged = self.staged();
            for entry in entries {
                staged.add(entry.tag, entry.ty, &entry.data, scope)?;
            }
            *self = staged;
            return Ok(());
        }

        if tag == tags::SELECT_EYE {
            let index = match data.len() {
                1 => data[0] as u32,
                2 | 3 => LittleEndian::read_u16(data) as u32,
                _ => LittleEndian::read_u32(&data[..4]),
            };
            self.active_eye = Eye::from_index(index)
                .ok_or_else(|| Error::invalid_arg(format!("eye index {} out of range", index)))?;
            trace!("Selected metadata eye {:?}", self.active_eye);
            return Ok(());
        }

        let entries = if tag == tags::LOOK_FILE {
            self.look_entries(ty, data)?
        } else {
            vec![MetadataEntry::new(tag, ty, data.to_vec())?]
        };

        if scope == MetadataScope::Global {
            self.ensure_identity(tag);
        }
        for entry in entries {
            self.insert(entry, scope);
        }
        Ok(())
    }

    /// The filename and CRC records standing in for a look file path.
    fn look_entries(&self, ty: MetadataType, data: &[u8]) -> Result<Vec<MetadataEntry>> {
        let path = match MetadataValue::parse(ty, data)? {
            MetadataValue::String(path) | MetadataValue::Xml(path) => path,
            _ => String::from_utf8_lossy(data).into_owned(),
        };
        let file = self.lut.lookup(&path);
        let mut entries = vec![MetadataEntry::from_value(
            tags::LOOK_FILE,
            &MetadataValue::String(file.filename),
        )?];
        if let Some(crc) = file.crc {
            entries.push(MetadataEntry::from_value(tags::LOOK_CRC, &MetadataValue::U32(vec![crc]))?);
        }
        Ok(entries)
    }

    /// A copy of the scopes sharing this store's look file cache.
    fn staged(&self) -> MetadataStore {
        MetadataStore {
            global: self.global.clone(),
            local: self.local.clone(),
            active_eye: self.active_eye,
            changed: self.changed,
            lut: self.lut.clone(),
        }
    }

    /// Add a typed value.
    pub fn add_value(&mut self, tag: Tag, value: &MetadataValue, scope: MetadataScope) -> Result<()> {
        self.add(tag, value.ty(), &value.to_bytes(), scope)
    }

    /// Select the global eye scope for following adds.
    pub fn select_eye(&mut self, eye: Eye) {
        self.active_eye = eye;
    }

    /// Currently selected eye.
    pub fn active_eye(&self) -> Eye {
        self.active_eye
    }

    /// Look up a record: local first, then the selected eye, then eye 0.
    pub fn find(&self, tag: Tag) -> Result<&MetadataEntry> {
        let active = &self.global[self.active_eye.index()];
        self.local
            .iter()
            .chain(active.iter())
            .chain(self.global[0].iter())
            .find(|entry| entry.tag == tag)
            .ok_or(Error::MetadataEnd)
    }

    /// Records of one global scope.
    pub fn global(&self, eye: Eye) -> &[MetadataEntry] {
        &self.global[eye.index()]
    }

    /// Pending local records.
    pub fn local(&self) -> &[MetadataEntry] {
        &self.local
    }

    /// Whether there are changes not yet attached.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Look file cache used by this store.
    pub fn lut_cache(&self) -> &SharedLutCache {
        &self.lut
    }

    /// Remove all global records.
    pub fn clear_global(&mut self) {
        for scope in self.global.iter_mut() {
            scope.clear();
        }
        self.changed = true;
    }

    /// Remove pending local records.
    pub fn clear_local(&mut self) {
        if !self.local.is_empty() {
            self.local.clear();
            self.changed = true;
        }
    }

    /// Hand pending changes to an encoder.
    ///
    /// Returns `None` when nothing changed since the last call. Otherwise the
    /// update carries eye 0, the per-eye deltas and the local records; the local
    /// scope is freed and the change flag cleared.
    pub fn take_changes(&mut self) -> Option<MetadataUpdate> {
        if !self.changed {
            return None;
        }
        let mono = &self.global[0];
        let deltas = [eye_delta(mono, &self.global[1]), eye_delta(mono, &self.global[2])];
        let update = MetadataUpdate {
            global: GlobalMetadata {
                mono: mono.clone(),
                deltas,
            },
            local: std::mem::take(&mut self.local),
        };
        self.changed = false;
        debug!(
            "Attaching metadata: {} global, {}/{} eye delta, {} local records",
            update.global.mono.len(),
            update.global.deltas[0].len(),
            update.global.deltas[1].len(),
            update.local.len()
        );
        Some(update)
    }

    fn ensure_identity(&mut self, tag: Tag) {
        if tag == tags::CLIP_GUID || self.global[0].iter().any(|e| e.tag == tags::CLIP_GUID) {
            return;
        }
        let guid = *uuid::Uuid::new_v4().as_bytes();
        debug!("Seeding global metadata with clip GUID");
        self.global[0].push(MetadataEntry {
            tag: tags::CLIP_GUID,
            ty: MetadataType::Guid,
            data: guid.to_vec(),
        });
        self.changed = true;
    }

    fn insert(&mut self, entry: MetadataEntry, scope: MetadataScope) {
        let target = match scope {
            MetadataScope::Global => &mut self.global[self.active_eye.index()],
            MetadataScope::Local => &mut self.local,
        };
        upsert(target, entry);
        self.changed = true;
    }
}

/// Replace the record with the same tag, or append.
fn upsert(scope: &mut Vec<MetadataEntry>, entry: MetadataEntry) {
    match scope.iter_mut().find(|e| e.tag == entry.tag) {
        Some(existing) => *existing = entry,
        None => scope.push(entry),
    }
}

/// Records of `eye` that are absent from `mono` or carry a different value.
pub fn eye_delta(mono: &[MetadataEntry], eye: &[MetadataEntry]) -> Vec<MetadataEntry> {
    eye.iter()
        .filter(|entry| !mono.iter().any(|m| m == *entry))
        .cloned()
        .collect()
}

/// A store shared by several encoders.
#[derive(Debug, Clone, Default)]
pub struct SharedMetadataStore {
    inner: Arc<Mutex<MetadataStore>>,
}

impl SharedMetadataStore {
    /// Share a store.
    pub fn new(store: MetadataStore) -> Self {
        SharedMetadataStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Exclusive access to the store.
    pub fn lock(&self) -> MutexGuard<'_, MetadataStore> {
        self.inner.lock()
    }

    /// Take pending changes under exclusive access.
    pub fn take_changes(&self) -> Option<MetadataUpdate> {
        self.inner.lock().take_changes()
    }
}
