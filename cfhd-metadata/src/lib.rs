//! Typed metadata for CFHD samples.
//!
//! Metadata travels inside each compressed sample as a sequence of tagged
//! records. This crate provides:
//!
//! - [`MetadataStore`]: the encoder-side store with global, per-eye and local
//!   scopes, the look file cache and eye-delta computation
//! - [`SampleMetadata`]: the decoder-side reader with a sequential cursor and
//!   direct lookup
//! - [`track`]: track selection, active overrides and the colour database
//! - [`wire`]: the record and packed-block wire format
//!
//! # Example
//!
//! ```
//! use cfhd_metadata::{tags, MetadataScope, MetadataStore, MetadataType, SampleMetadata};
//!
//! let mut store = MetadataStore::new();
//! store
//!     .add(tags::EXPOSURE, MetadataType::Float, &0.5f32.to_le_bytes(), MetadataScope::Global)
//!     .unwrap();
//!
//! let update = store.take_changes().unwrap();
//! let payload = update.global.frame_payload(&update.local);
//!
//! let sample = SampleMetadata::new(payload);
//! let record = sample.find(tags::EXPOSURE).unwrap();
//! assert_eq!(record.data, &0.5f32.to_le_bytes()[..]);
//! ```

pub mod lut;
pub mod sample;
pub mod store;
pub mod tag;
pub mod track;
pub mod value;
pub mod wire;

pub use lut::{LutCache, LutCacheStats, LutFile, SharedLutCache};
pub use sample::{MetadataCursor, SampleMetadata};
pub use store::{
    Eye, GlobalMetadata, MetadataScope, MetadataStore, MetadataUpdate, SharedMetadataStore,
};
pub use tag::{tags, Tag};
pub use track::{ActiveMetadata, ColorDatabase, InMemoryColorDatabase, MetadataTrack, TrackKind};
pub use value::{MetadataEntry, MetadataRecord, MetadataType, MetadataValue, MAX_PAYLOAD};
