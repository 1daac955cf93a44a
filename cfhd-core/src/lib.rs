//! # CFHD Core
//!
//! Core types shared by the CFHD codec engine crates:
//! - Error handling types and public error codes
//! - Four-character codes, pixel formats and encoded formats
//! - Image geometry (pixel size, pitch, image size, signed-pitch row addressing)
//! - Quality levels and option flags
//! - The allocator capability used by sessions and pools

pub mod alloc;
pub mod error;
pub mod format;
pub mod image;
pub mod types;

pub use alloc::{Allocator, AllocatorRef, SystemAllocator};
pub use error::{Error, ErrorCode, Result};
pub use format::{EncodedFormat, FieldType, FourCc, PixelFormat};
pub use image::{
    image_pitch, image_size, image_span, pixel_size, row_offset, DecodedResolution,
    Stereo3dType, VideoSelect,
};
pub use types::{DecodingFlags, EncodingFlags, Quality, ThumbnailFlags};
