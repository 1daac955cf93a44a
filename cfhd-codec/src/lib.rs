// Session entry points mirror the codec's parameter lists
#![allow(clippy::too_many_arguments)]

//! CFHD encode and decode sessions
//!
//! This crate wraps an opaque [`Transform`] in the session state machines of
//! the CFHD codec engine:
//!
//! - [`DecoderSession`]: open, prepare from a sample, decode, close
//! - [`EncoderSession`]: open, prepare, attach metadata, encode, close
//! - [`EncoderPool`]: worker threads that encode submitted frames in parallel
//! - [`negotiate`]: output format and geometry selection for decoders
//!
//! [`PassthroughTransform`] stores frames uncompressed and serves as a
//! reference transform.
//!
//! # Example
//!
//! ```
//! use cfhd_codec::{DecoderSession, EncoderSession, PassthroughTransform};
//! use cfhd_core::{DecodedResolution, DecodingFlags, EncodedFormat, EncodingFlags, PixelFormat, Quality};
//!
//! let mut encoder = EncoderSession::open(Box::new(PassthroughTransform::new()));
//! encoder
//!     .prepare(8, 4, PixelFormat::Bgra, EncodedFormat::Rgb444, EncodingFlags::empty(), Quality::High)
//!     .unwrap();
//! encoder.encode_sample(&[0u8; 8 * 4 * 4], 32).unwrap();
//! let sample = encoder.sample_data().unwrap().to_vec();
//! encoder.close().unwrap();
//!
//! let mut decoder = DecoderSession::open(Box::new(PassthroughTransform::new()));
//! let output = decoder
//!     .prepare(&sample, Some(PixelFormat::Bgra), 0, 0, DecodedResolution::Full, DecodingFlags::empty())
//!     .unwrap();
//! let mut pixels = vec![0u8; output.size()];
//! decoder.decode_sample(&sample, &mut pixels, output.pitch as isize).unwrap();
//! decoder.close().unwrap();
//! ```

pub mod decoder;
pub mod encoder;
pub mod negotiate;
pub mod pool;
pub mod sample;
pub mod session;
pub mod transform;

pub use bytes::Bytes;
pub use decoder::{DecodedOutput, DecoderConfig, DecoderSession};
pub use encoder::{
    is_supported_input, EncodeParams, EncoderConfig, EncoderSession, BAYER_INPUT_FORMATS,
    SUPPORTED_INPUT_FORMATS,
};
pub use pool::{EncoderPool, EncoderPoolConfig, PoolState, PoolStats, SubmitPolicy, MAX_WORKERS};
pub use sample::SampleBuffer;
pub use session::SessionState;
pub use transform::{
    DecodeRequest, EncodeRequest, PassthroughTransform, SampleHeader, Thumbnail, Transform,
};
