//! Decoder session: open, prepare from a sample, decode, close.

use crate::negotiate::{compute_output_geometry, propose_output_formats, resolve_requested_format};
use crate::session::SessionState;
use crate::transform::{guarded, DecodeRequest, SampleHeader, Thumbnail, Transform};
use cfhd_core::{
    image_pitch, image_span, DecodedResolution, DecodingFlags, EncodedFormat, Error, PixelFormat,
    Result, ThumbnailFlags,
};
use cfhd_metadata::{
    track, ActiveMetadata, ColorDatabase, MetadataEntry, MetadataTrack, MetadataType,
    SampleMetadata, Tag,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    /// Metadata track used for effective metadata.
    pub track: MetadataTrack,
    /// Consult the colour database when the track allows it.
    pub apply_database: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            track: MetadataTrack::default(),
            apply_database: true,
        }
    }
}

/// Output geometry fixed by [`DecoderSession::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOutput {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Minimum row pitch in bytes.
    pub pitch: usize,
}

impl DecodedOutput {
    /// Minimum buffer size at the minimum pitch.
    pub fn size(&self) -> usize {
        self.pitch * self.height as usize
    }
}

#[derive(Debug, Clone)]
struct DecodeState {
    header: SampleHeader,
    output: DecodedOutput,
    resolution: DecodedResolution,
    flags: DecodingFlags,
}

/// One decode context.
pub struct DecoderSession {
    config: DecoderConfig,
    state: SessionState,
    transform: Option<Box<dyn Transform>>,
    prepared: Option<DecodeState>,
    active: ActiveMetadata,
    database: Option<Arc<dyn ColorDatabase>>,
    frame_count: u64,
}

impl DecoderSession {
    /// Open a session with the default configuration.
    pub fn open(transform: Box<dyn Transform>) -> Self {
        Self::with_config(transform, DecoderConfig::default())
    }

    /// Open a session with a custom configuration.
    pub fn with_config(transform: Box<dyn Transform>, config: DecoderConfig) -> Self {
        debug!("Decoder session opened with track {:?}", config.track);
        DecoderSession {
            config,
            state: SessionState::Created,
            transform: Some(transform),
            prepared: None,
            active: ActiveMetadata::new(),
            database: None,
            frame_count: 0,
        }
    }

    /// Negotiate output format and size from a sample.
    ///
    /// `format` of `None` picks the most preferred candidate. Zero `width` or
    /// `height` derive from the sample size and `resolution`. On error the
    /// session keeps its previous state.
    pub fn prepare(
        &mut self,
        sample: &[u8],
        format: Option<PixelFormat>,
        width: u32,
        height: u32,
        resolution: DecodedResolution,
        flags: DecodingFlags,
    ) -> Result<DecodedOutput> {
        self.state.check_open()?;
        let header = self.sample_info(sample)?;

        let candidates = propose_output_formats(&header);
        let format = resolve_requested_format(format, &candidates)?;
        let (width, height) =
            compute_output_geometry(header.width, header.height, width, height, resolution);
        let pitch = image_pitch(width, format);
        if pitch == 0 {
            return Err(Error::BadFormat(format!("no row layout for {}", format)));
        }

        let output = DecodedOutput {
            width,
            height,
            format,
            pitch,
        };
        self.prepared = Some(DecodeState {
            header,
            output,
            resolution,
            flags,
        });
        self.state = SessionState::Prepared;
        debug!("Decoder prepared: {}x{} {} at {:?}", width, height, format, resolution);
        Ok(output)
    }

    /// Decode one sample into `output`.
    ///
    /// `output` must hold `|pitch| * height` bytes. A negative pitch writes
    /// rows bottom-to-top. Nothing is written unless the buffer is large enough.
    pub fn decode_sample(&mut self, sample: &[u8], output: &mut [u8], pitch: isize) -> Result<()> {
        self.state.check_ready("decode")?;
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| Error::Unexpected("decoder has no output geometry".into()))?;
        let geometry = prepared.output;

        if pitch.unsigned_abs() < geometry.pitch {
            return Err(Error::invalid_arg(format!(
                "pitch {} is smaller than a row of {} bytes",
                pitch, geometry.pitch
            )));
        }
        let needed = image_span(pitch, geometry.height)
            .ok_or_else(|| Error::invalid_arg("output size overflows"))?;
        if output.len() < needed {
            return Err(Error::DecodeBufferSize {
                needed,
                available: output.len(),
            });
        }

        let header = self.sample_info(sample)?;
        if header.width != prepared.header.width || header.height != prepared.header.height {
            return Err(Error::bad_sample(format!(
                "sample is {}x{}, decoder prepared for {}x{}",
                header.width, header.height, prepared.header.width, prepared.header.height
            )));
        }
        let metadata = self.resolve_metadata(&header, sample, prepared.flags)?;

        let request = DecodeRequest {
            sample,
            header: &header,
            format: geometry.format,
            width: geometry.width,
            height: geometry.height,
            resolution: prepared.resolution,
            pitch,
            metadata: &metadata,
        };
        let transform = self.transform.as_mut().ok_or(Error::SessionClosed)?;
        guarded("decode", || transform.decode(&request, &mut output[..needed]))?;

        self.frame_count += 1;
        self.state = SessionState::Active;
        trace!("Decoded sample {}", self.frame_count);
        Ok(())
    }

    /// Parse a sample header. An unknown encoded format reads as 4:2:2.
    pub fn sample_info(&self, sample: &[u8]) -> Result<SampleHeader> {
        self.state.check_open()?;
        if sample.is_empty() {
            return Err(Error::invalid_arg("empty sample"));
        }
        let transform = self.transform.as_ref().ok_or(Error::SessionClosed)?;
        let mut header = guarded("parse header", || transform.parse_header(sample))?;
        if header.encoded_format.is_none() {
            debug!("Unknown encoded format, assuming YUV 4:2:2");
            header.encoded_format = Some(EncodedFormat::Yuv422);
        }
        Ok(header)
    }

    /// Output formats offered for a sample, most preferred first.
    pub fn output_formats(&self, sample: &[u8]) -> Result<Vec<PixelFormat>> {
        self.sample_info(sample)
            .map(|header| propose_output_formats(&header))
    }

    /// Metadata embedded in a sample.
    pub fn sample_metadata(&self, sample: &[u8]) -> Result<SampleMetadata> {
        let header = self.sample_info(sample)?;
        Ok(SampleMetadata::from_bytes(header.metadata_bytes(sample)))
    }

    /// Metadata a decode of `sample` would hand to the transform.
    pub fn effective_metadata(&self, sample: &[u8]) -> Result<Vec<MetadataEntry>> {
        let header = self.sample_info(sample)?;
        let flags = self
            .prepared
            .as_ref()
            .map(|p| p.flags)
            .unwrap_or_default();
        self.resolve_metadata(&header, sample, flags)
    }

    fn resolve_metadata(
        &self,
        header: &SampleHeader,
        sample: &[u8],
        flags: DecodingFlags,
    ) -> Result<Vec<MetadataEntry>> {
        let embedded = SampleMetadata::from_bytes(header.metadata_bytes(sample));
        let track = self.config.track;

        let database = if self.config.apply_database
            && track.applies_database()
            && !flags.contains(DecodingFlags::IGNORE_DATABASE)
        {
            self.database.as_deref()
        } else {
            None
        };
        let active = if track.applies_active()
            && !flags.contains(DecodingFlags::IGNORE_ACTIVE_METADATA)
            && !self.active.is_empty()
        {
            Some(&self.active)
        } else {
            None
        };
        track::resolve(&embedded, track.eye, database, active)
    }

    /// Thumbnail of a sample.
    pub fn thumbnail(&self, sample: &[u8], flags: ThumbnailFlags) -> Result<Thumbnail> {
        self.state.check_open()?;
        let transform = self.transform.as_ref().ok_or(Error::SessionClosed)?;
        guarded("thumbnail", || transform.extract_thumbnail(sample, flags))
    }

    /// Select the metadata track used by later decodes.
    pub fn set_track(&mut self, track: MetadataTrack) -> Result<()> {
        self.state.check_open()?;
        self.config.track = track;
        Ok(())
    }

    pub fn track(&self) -> MetadataTrack {
        self.config.track
    }

    /// Attach or detach the colour database.
    pub fn set_color_database(&mut self, database: Option<Arc<dyn ColorDatabase>>) -> Result<()> {
        self.state.check_open()?;
        self.database = database;
        Ok(())
    }

    /// Stage an override applied to decodes on user-modified tracks.
    ///
    /// Overrides stay staged until cleared.
    pub fn set_active_metadata(&mut self, tag: Tag, ty: MetadataType, data: &[u8]) -> Result<()> {
        self.state.check_open()?;
        if tag.is_null() {
            return Err(Error::invalid_arg("active metadata needs a tag"));
        }
        self.active.set(tag, ty, data)
    }

    pub fn clear_active_metadata(&mut self) -> Result<()> {
        self.state.check_open()?;
        self.active.clear();
        Ok(())
    }

    pub fn active_metadata(&self) -> &ActiveMetadata {
        &self.active
    }

    /// Release the transform. Later calls fail with [`Error::SessionClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.state.check_open()?;
        self.transform = None;
        self.prepared = None;
        self.state = SessionState::Closed;
        debug!("Decoder session closed after {} samples", self.frame_count);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Geometry fixed by the last prepare.
    pub fn output(&self) -> Option<DecodedOutput> {
        self.prepared.as_ref().map(|p| p.output)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl fmt::Debug for DecoderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderSession")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("output", &self.output())
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Drop for DecoderSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            warn!("Decoder session dropped without close in state {}", self.state.name());
        }
    }
}
