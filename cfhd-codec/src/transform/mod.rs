//! The pixel-domain compressor boundary.
//!
//! Sessions never look inside a compressed sample beyond what
//! [`Transform::parse_header`] reports. Everything else (wavelets, entropy
//! coding, colour conversion) lives behind this trait.

mod passthrough;

pub use passthrough::{header_tags, PassthroughTransform, SIGNATURE};

use crate::encoder::EncodeParams;
use cfhd_core::{
    DecodedResolution, EncodedFormat, Error, FieldType, PixelFormat, Result, ThumbnailFlags,
};
use cfhd_metadata::MetadataEntry;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Fields recovered from a sample header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHeader {
    /// `None` when the header carries a code this engine does not know.
    pub encoded_format: Option<EncodedFormat>,
    pub field_type: FieldType,
    pub width: u32,
    pub height: u32,
    /// Pixel format the frame was encoded from, when recorded.
    pub input_format: Option<PixelFormat>,
    /// Byte range of the embedded metadata payload.
    pub metadata: Option<Range<usize>>,
}

impl SampleHeader {
    /// The embedded metadata bytes of `sample`, empty when absent.
    pub fn metadata_bytes<'a>(&self, sample: &'a [u8]) -> &'a [u8] {
        self.metadata
            .clone()
            .and_then(|range| sample.get(range))
            .unwrap_or(&[])
    }
}

/// One decode call handed to a transform.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    pub sample: &'a [u8],
    pub header: &'a SampleHeader,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub resolution: DecodedResolution,
    /// Signed row pitch of the output; the output slice is exactly `|pitch| * height` bytes.
    pub pitch: isize,
    /// Effective metadata after track resolution.
    pub metadata: &'a [MetadataEntry],
}

/// One encode call handed to a transform.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub frame: &'a [u8],
    pub pitch: isize,
    pub params: &'a EncodeParams,
    /// Serialized metadata records to embed.
    pub metadata: &'a [u8],
    pub frame_index: u64,
}

/// A small preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub flags: ThumbnailFlags,
    pub pixels: Vec<u8>,
}

/// Compress and decompress single samples.
pub trait Transform: Send {
    /// Parse the sample header.
    fn parse_header(&self, sample: &[u8]) -> Result<SampleHeader>;

    /// Decode into `output`, which holds exactly the rows described by the request.
    fn decode(&mut self, request: &DecodeRequest<'_>, output: &mut [u8]) -> Result<()>;

    /// Encode one frame, appending the sample to `output`.
    fn encode(&mut self, request: &EncodeRequest<'_>, output: &mut Vec<u8>) -> Result<()>;

    /// Extract a thumbnail from an encoded sample.
    fn extract_thumbnail(&self, sample: &[u8], flags: ThumbnailFlags) -> Result<Thumbnail>;
}

/// Run a transform call, turning a panic into [`Error::Internal`].
pub(crate) fn guarded<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("Transform panicked during {}: {}", operation, message);
            Err(Error::internal(format!("{} panicked: {}", operation, message)))
        }
    }
}
