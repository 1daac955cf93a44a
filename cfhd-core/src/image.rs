//! Image geometry: pixel sizes, pitches, buffer sizes and decode resolutions.

use crate::format::PixelFormat;

/// Decoded resolution relative to the encoded frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodedResolution {
    #[default]
    Full,
    Half,
    Quarter,
    /// Lowpass band only.
    Thumbnail,
    /// Half width, full height.
    HalfHorizontal,
}

impl DecodedResolution {
    /// Horizontal and vertical divisors applied to the encoded size.
    pub fn divisors(&self) -> (u32, u32) {
        match self {
            DecodedResolution::Full => (1, 1),
            DecodedResolution::Half => (2, 2),
            DecodedResolution::Quarter => (4, 4),
            DecodedResolution::Thumbnail => (8, 8),
            DecodedResolution::HalfHorizontal => (2, 1),
        }
    }

    /// Scale encoded dimensions down by this resolution, never below 1x1.
    pub fn scale(&self, width: u32, height: u32) -> (u32, u32) {
        let (dx, dy) = self.divisors();
        ((width / dx).max(1), (height / dy).max(1))
    }
}

/// Which stereo channel(s) a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VideoSelect {
    #[default]
    Default,
    LeftEye,
    RightEye,
    BothEyes,
}

/// Layout used when both eyes are combined into one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stereo3dType {
    /// Eyes are returned as separate full images.
    #[default]
    Default,
    StackedFull,
    StackedHalf,
    SideBySide,
    Fields,
    Anaglyph,
}

/// Bytes per pixel, or 0 for formats without a byte-aligned pixel (`v210`, unknown codes).
///
/// Size rows with [`image_pitch`], not with this value.
pub fn pixel_size(format: PixelFormat) -> usize {
    match format {
        PixelFormat::Bgra | PixelFormat::BgraPremultiplied => 4,
        PixelFormat::Rgb24 => 3,
        PixelFormat::Yuy2 | PixelFormat::Uyvy => 2,
        PixelFormat::V210 => 0,
        PixelFormat::Yu64 => 4,
        PixelFormat::Rgb48 | PixelFormat::Wp13 => 6,
        PixelFormat::W13a | PixelFormat::Rgb64 | PixelFormat::B64a => 8,
        PixelFormat::R210
        | PixelFormat::Dpx0
        | PixelFormat::Ab10
        | PixelFormat::Ar10
        | PixelFormat::Rg30 => 4,
        PixelFormat::Byr2 | PixelFormat::Byr4 => 2,
        PixelFormat::Other(_) => 0,
    }
}

/// Minimum row size in bytes for `width` pixels of `format`.
///
/// `v210` rows hold groups of 48 pixels in 128 bytes. Unknown formats return 0.
pub fn image_pitch(width: u32, format: PixelFormat) -> usize {
    let width = width as usize;
    match format {
        PixelFormat::V210 => width.div_ceil(48) * 128,
        other => width * pixel_size(other),
    }
}

/// Size in bytes of a decoded image.
///
/// Doubles when both eyes are requested without a combined stereo layout.
pub fn image_size(
    width: u32,
    height: u32,
    format: PixelFormat,
    select: VideoSelect,
    stereo: Stereo3dType,
) -> usize {
    let single = image_pitch(width, format) * height as usize;
    if select == VideoSelect::BothEyes && stereo == Stereo3dType::Default {
        single * 2
    } else {
        single
    }
}

/// Bytes covered by `height` rows at `pitch`, regardless of row order.
///
/// Returns `None` on overflow.
pub fn image_span(pitch: isize, height: u32) -> Option<usize> {
    pitch.unsigned_abs().checked_mul(height as usize)
}

/// Byte offset of `row` in a buffer of `height` rows.
///
/// A negative pitch lays rows out bottom-to-top.
pub fn row_offset(row: u32, height: u32, pitch: isize) -> usize {
    let stride = pitch.unsigned_abs();
    if pitch < 0 {
        (height - 1 - row) as usize * stride
    } else {
        row as usize * stride
    }
}
