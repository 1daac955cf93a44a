//! Synchronous encoder session.

use crate::session::SessionState;
use crate::transform::{guarded, EncodeRequest, Thumbnail, Transform};
use cfhd_core::{
    image_pitch, image_span, AllocatorRef, EncodedFormat, EncodingFlags, Error, PixelFormat,
    Quality, Result, ThumbnailFlags,
};
use cfhd_metadata::{
    GlobalMetadata, MetadataEntry, MetadataStore, MetadataUpdate, SharedMetadataStore,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Input formats accepted for every non-Bayer encoding.
pub const SUPPORTED_INPUT_FORMATS: &[PixelFormat] = &[
    PixelFormat::Yuy2,
    PixelFormat::Uyvy,
    PixelFormat::V210,
    PixelFormat::Yu64,
    PixelFormat::Bgra,
    PixelFormat::BgraPremultiplied,
    PixelFormat::Rgb24,
    PixelFormat::Rgb48,
    PixelFormat::B64a,
    PixelFormat::Rgb64,
    PixelFormat::R210,
    PixelFormat::Dpx0,
    PixelFormat::Ab10,
    PixelFormat::Ar10,
    PixelFormat::Rg30,
];

/// Input formats accepted for the Bayer encoding.
pub const BAYER_INPUT_FORMATS: &[PixelFormat] = &[PixelFormat::Byr4, PixelFormat::Byr2];

/// Extra bytes reserved in the sample buffer for header and metadata.
const SAMPLE_HEADROOM: usize = 4096;

/// Whether frames of `input` can be encoded as `encoded`.
pub fn is_supported_input(input: PixelFormat, encoded: EncodedFormat) -> bool {
    if encoded == EncodedFormat::Bayer {
        BAYER_INPUT_FORMATS.contains(&input)
    } else {
        SUPPORTED_INPUT_FORMATS.contains(&input)
    }
}

/// Parameters fixed by [`EncoderSession::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub input_format: PixelFormat,
    pub encoded_format: EncodedFormat,
    pub flags: EncodingFlags,
    pub quality: Quality,
}

impl EncodeParams {
    /// Check that a frame buffer covers `height` rows at `pitch`.
    pub fn check_frame(&self, frame_len: usize, pitch: isize) -> Result<()> {
        let row = image_pitch(self.width, self.input_format);
        if pitch.unsigned_abs() < row {
            return Err(Error::invalid_arg(format!(
                "pitch {} is smaller than a row of {} bytes",
                pitch, row
            )));
        }
        let span = image_span(pitch, self.height)
            .ok_or_else(|| Error::invalid_arg("frame size overflows"))?;
        if frame_len < span {
            return Err(Error::invalid_arg(format!(
                "frame buffer holds {} bytes, need {}",
                frame_len, span
            )));
        }
        Ok(())
    }
}

/// Encoder configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
    /// Initial sample buffer size. Zero sizes it for one uncompressed frame.
    pub reserve_sample_bytes: usize,
}

/// One encode context: open, prepare, encode frames, close.
pub struct EncoderSession {
    config: EncoderConfig,
    allocator: AllocatorRef,
    state: SessionState,
    transform: Option<Box<dyn Transform>>,
    params: Option<EncodeParams>,
    global: Arc<GlobalMetadata>,
    local: Vec<MetadataEntry>,
    sample: Vec<u8>,
    has_sample: bool,
    frame_count: u64,
}

impl EncoderSession {
    /// Open a session with the default configuration and system allocator.
    pub fn open(transform: Box<dyn Transform>) -> Self {
        Self::with_config(transform, EncoderConfig::default(), AllocatorRef::default())
    }

    /// Open a session with a custom configuration and allocator.
    pub fn with_config(
        transform: Box<dyn Transform>,
        config: EncoderConfig,
        allocator: AllocatorRef,
    ) -> Self {
        debug!("Encoder session opened");
        EncoderSession {
            config,
            allocator,
            state: SessionState::Created,
            transform: Some(transform),
            params: None,
            global: Arc::new(GlobalMetadata::default()),
            local: Vec::new(),
            sample: Vec::new(),
            has_sample: false,
            frame_count: 0,
        }
    }

    /// Fix the encode parameters.
    ///
    /// May be called again on an open session to change them.
    pub fn prepare(
        &mut self,
        width: u32,
        height: u32,
        input_format: PixelFormat,
        encoded_format: EncodedFormat,
        flags: EncodingFlags,
        quality: Quality,
    ) -> Result<()> {
        self.state.check_open()?;
        if width == 0 || height == 0 {
            return Err(Error::invalid_arg(format!(
                "frame size {}x{} must be non-zero",
                width, height
            )));
        }
        if !is_supported_input(input_format, encoded_format) {
            return Err(Error::UnsupportedFormat(input_format));
        }

        let reserve = match self.config.reserve_sample_bytes {
            0 => image_pitch(width, input_format) * height as usize + SAMPLE_HEADROOM,
            n => n,
        };
        let buffer = self.allocator.allocate(reserve)?;
        self.allocator
            .recycle(std::mem::replace(&mut self.sample, buffer));

        self.params = Some(EncodeParams {
            width,
            height,
            input_format,
            encoded_format,
            flags,
            quality,
        });
        self.has_sample = false;
        self.state = SessionState::Prepared;
        debug!(
            "Encoder prepared: {}x{} {} as {:?}, quality {:?}",
            width, height, input_format, encoded_format, quality
        );
        Ok(())
    }

    /// Drop the prepared parameters, returning to the created state.
    pub(crate) fn unprepare(&mut self) {
        if self.state != SessionState::Closed {
            self.params = None;
            self.has_sample = false;
            self.state = SessionState::Created;
        }
    }

    /// Take pending changes from `store` for the next frame.
    pub fn attach_metadata(&mut self, store: &mut MetadataStore) -> Result<()> {
        self.state.check_open()?;
        match store.take_changes() {
            Some(update) => self.apply_metadata(update),
            None => Ok(()),
        }
    }

    /// Take pending changes from a store shared with other encoders.
    pub fn attach_shared_metadata(&mut self, store: &SharedMetadataStore) -> Result<()> {
        self.state.check_open()?;
        match store.take_changes() {
            Some(update) => self.apply_metadata(update),
            None => Ok(()),
        }
    }

    /// Install a metadata snapshot: global records replace the current set,
    /// local records are added for the next frame only.
    pub fn apply_metadata(&mut self, update: MetadataUpdate) -> Result<()> {
        self.state.check_open()?;
        self.global = Arc::new(update.global);
        self.add_local(update.local);
        Ok(())
    }

    pub(crate) fn set_global(&mut self, global: Arc<GlobalMetadata>) {
        self.global = global;
    }

    pub(crate) fn add_local(&mut self, entries: Vec<MetadataEntry>) {
        for entry in entries {
            match self.local.iter_mut().find(|e| e.tag == entry.tag) {
                Some(existing) => *existing = entry,
                None => self.local.push(entry),
            }
        }
    }

    /// Encode one frame into the internal sample buffer.
    ///
    /// Local metadata is consumed by this call whether or not it succeeds.
    pub fn encode_sample(&mut self, frame: &[u8], pitch: isize) -> Result<()> {
        self.state.check_ready("encode")?;
        let params = self
            .params
            .ok_or_else(|| Error::Unexpected("encoder has no parameters".into()))?;
        params.check_frame(frame.len(), pitch)?;

        let metadata = self.global.frame_payload(&self.local);
        self.local.clear();

        let transform = self.transform.as_mut().ok_or(Error::SessionClosed)?;
        let sample = &mut self.sample;
        sample.clear();
        self.has_sample = false;

        let request = EncodeRequest {
            frame,
            pitch,
            params: &params,
            metadata: &metadata,
            frame_index: self.frame_count,
        };
        guarded("encode", || transform.encode(&request, sample))?;

        self.has_sample = true;
        self.frame_count += 1;
        self.state = SessionState::Active;
        trace!("Encoded frame {} into {} bytes", self.frame_count, self.sample.len());
        Ok(())
    }

    /// The most recently encoded sample.
    pub fn sample_data(&self) -> Result<&[u8]> {
        self.state.check_open()?;
        if !self.has_sample {
            return Err(Error::Unexpected("no sample has been encoded".into()));
        }
        Ok(&self.sample)
    }

    /// Thumbnail of the most recently encoded sample.
    pub fn thumbnail(&self, flags: ThumbnailFlags) -> Result<Thumbnail> {
        let data = self.sample_data()?;
        let transform = self.transform.as_ref().ok_or(Error::SessionClosed)?;
        guarded("thumbnail", || transform.extract_thumbnail(data, flags))
    }

    /// Release the transform. Later calls fail with [`Error::SessionClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.state.check_open()?;
        self.transform = None;
        self.allocator.recycle(std::mem::take(&mut self.sample));
        self.local.clear();
        self.has_sample = false;
        self.state = SessionState::Closed;
        debug!("Encoder session closed after {} frames", self.frame_count);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> Option<&EncodeParams> {
        self.params.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Global records embedded in every frame.
    pub fn global_metadata(&self) -> &GlobalMetadata {
        &self.global
    }

    /// Local records waiting for the next frame.
    pub fn local_metadata(&self) -> &[MetadataEntry] {
        &self.local
    }
}

impl fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderSession")
            .field("state", &self.state)
            .field("params", &self.params)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            warn!("Encoder session dropped without close in state {}", self.state.name());
        }
    }
}
