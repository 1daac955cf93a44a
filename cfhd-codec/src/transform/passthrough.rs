//! Uncompressed reference transform.
//!
//! Sample layout:
//!
//! ```text
//! "CFHD" | (tag:u16 BE, value:u16 BE)* ... FRAME_HEADER | metadata | rows
//! ```
//!
//! Rows are stored top-to-bottom at the input format's minimum pitch.

use super::{DecodeRequest, EncodeRequest, SampleHeader, Thumbnail, Transform};
use cfhd_core::{
    image_pitch, pixel_size, row_offset, DecodedResolution, EncodedFormat, EncodingFlags, Error,
    FieldType, FourCc, PixelFormat, Result, ThumbnailFlags,
};

/// Sample signature.
pub const SIGNATURE: [u8; 4] = *b"CFHD";

/// Header tag identifiers.
pub mod header_tags {
    /// Sample type, 1 for a frame
    pub const SAMPLE_TYPE: u16 = 0x4001;
    /// Image width tag
    pub const IMAGE_WIDTH: u16 = 0x4003;
    /// Image height tag
    pub const IMAGE_HEIGHT: u16 = 0x4004;
    /// Encoded format tag
    pub const ENCODED_FORMAT: u16 = 0x4009;
    /// Low 16 bits of the frame index
    pub const FRAME_INDEX: u16 = 0x400B;
    /// Quality level tag
    pub const QUALITY_LEVEL: u16 = 0x400C;
    /// Field type tag
    pub const FIELD_TYPE: u16 = 0x4013;
    /// High half of the input pixel format code
    pub const INPUT_FORMAT_HI: u16 = 0x4014;
    /// Low half of the input pixel format code
    pub const INPUT_FORMAT_LO: u16 = 0x4015;
    /// High half of the metadata payload size
    pub const METADATA_SIZE_HI: u16 = 0x4016;
    /// Low half of the metadata payload size
    pub const METADATA_SIZE_LO: u16 = 0x4017;
    /// End of header; metadata and rows follow
    pub const FRAME_HEADER: u16 = 0x4030;
}

const SAMPLE_TYPE_FRAME: u16 = 1;
const NEUTRAL: u8 = 0x80;

/// Transform that stores frames uncompressed.
///
/// Decoding to the input format copies rows, scaling by nearest neighbour for
/// reduced resolutions. Other output formats receive a neutral grey image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

impl PassthroughTransform {
    pub fn new() -> Self {
        PassthroughTransform
    }

    /// Parse the header, returning it with the offset of the first pixel row.
    fn layout(sample: &[u8]) -> Result<(SampleHeader, usize)> {
        if sample.len() < 4 {
            return Err(Error::bad_sample(format!(
                "sample too short: {} bytes",
                sample.len()
            )));
        }
        if sample[..4] != SIGNATURE {
            return Err(Error::bad_sample("invalid sample signature"));
        }

        let mut offset = 4;
        let mut width = 0u32;
        let mut height = 0u32;
        let mut encoded = None;
        let mut field_type = FieldType::Progressive;
        let mut input_hi = None;
        let mut input_lo = None;
        let mut metadata_size = 0usize;
        let mut complete = false;

        while offset + 4 <= sample.len() {
            let tag = u16::from_be_bytes([sample[offset], sample[offset + 1]]);
            let value = u16::from_be_bytes([sample[offset + 2], sample[offset + 3]]);
            offset += 4;

            match tag {
                header_tags::IMAGE_WIDTH => width = value as u32,
                header_tags::IMAGE_HEIGHT => height = value as u32,
                header_tags::ENCODED_FORMAT => encoded = Some(value),
                header_tags::FIELD_TYPE => field_type = FieldType::from_value(value),
                header_tags::INPUT_FORMAT_HI => input_hi = Some(value),
                header_tags::INPUT_FORMAT_LO => input_lo = Some(value),
                header_tags::METADATA_SIZE_HI => {
                    metadata_size = (metadata_size & 0xFFFF) | ((value as usize) << 16)
                }
                header_tags::METADATA_SIZE_LO => {
                    metadata_size = (metadata_size & !0xFFFF) | value as usize
                }
                header_tags::FRAME_HEADER => {
                    complete = true;
                    break;
                }
                _ => {}
            }
        }

        if !complete {
            return Err(Error::bad_sample("missing frame header"));
        }
        if width == 0 || height == 0 {
            return Err(Error::bad_sample("missing width or height"));
        }

        let metadata_end = offset + metadata_size;
        if metadata_end > sample.len() {
            return Err(Error::bad_sample("metadata runs past end of sample"));
        }

        let input_format = match (input_hi, input_lo) {
            (Some(hi), Some(lo)) => Some(PixelFormat::from_fourcc(FourCc(
                ((hi as u32) << 16) | lo as u32,
            ))),
            _ => None,
        };

        let header = SampleHeader {
            // An absent tag reads as 4:2:2, an unrecognised one as unknown.
            encoded_format: match encoded {
                Some(value) => EncodedFormat::from_value(value),
                None => Some(EncodedFormat::Yuv422),
            },
            field_type,
            width,
            height,
            input_format,
            metadata: (metadata_size > 0).then_some(offset..metadata_end),
        };
        Ok((header, metadata_end))
    }

    /// Stored rows of a sample together with their format and pitch.
    fn rows(sample: &[u8]) -> Result<(SampleHeader, PixelFormat, usize, &[u8])> {
        let (header, offset) = Self::layout(sample)?;
        let format = header
            .input_format
            .filter(|f| f.is_known())
            .ok_or_else(|| Error::bad_sample("sample has no known input format"))?;
        let row = image_pitch(header.width, format);
        let size = row * header.height as usize;
        let pixels = sample
            .get(offset..offset + size)
            .ok_or_else(|| Error::bad_sample("truncated pixel data"))?;
        Ok((header, format, row, pixels))
    }
}

/// Bytes that can be moved as one unit when resampling a row.
fn scale_unit(format: PixelFormat) -> Option<usize> {
    match format {
        PixelFormat::V210 | PixelFormat::Other(_) => None,
        PixelFormat::Yuy2 | PixelFormat::Uyvy => Some(4),
        PixelFormat::Yu64 => Some(8),
        other => Some(pixel_size(other)).filter(|&size| size > 0),
    }
}

/// Offset of the most significant luma-ish byte inside a pixel.
fn luma_offset(format: PixelFormat) -> usize {
    match format {
        PixelFormat::Uyvy => 1,
        PixelFormat::Yu64
        | PixelFormat::Rgb48
        | PixelFormat::Wp13
        | PixelFormat::W13a
        | PixelFormat::Rgb64
        | PixelFormat::Byr2
        | PixelFormat::Byr4 => 1,
        _ => 0,
    }
}

fn resample_row(src: &[u8], dst: &mut [u8], unit: usize) {
    let src_units = src.len() / unit;
    let dst_units = dst.len() / unit;
    if src_units == 0 {
        dst.fill(NEUTRAL);
        return;
    }
    for u in 0..dst_units {
        let s = u * src_units / dst_units;
        dst[u * unit..(u + 1) * unit].copy_from_slice(&src[s * unit..(s + 1) * unit]);
    }
    dst[dst_units * unit..].fill(NEUTRAL);
}

impl Transform for PassthroughTransform {
    fn parse_header(&self, sample: &[u8]) -> Result<SampleHeader> {
        Self::layout(sample).map(|(header, _)| header)
    }

    fn decode(&mut self, request: &DecodeRequest<'_>, output: &mut [u8]) -> Result<()> {
        let (header, source, src_row, pixels) = Self::rows(request.sample)?;
        let dst_row = image_pitch(request.width, request.format);
        let same_format = source == request.format;
        let unit = scale_unit(source);

        for row in 0..request.height {
            let offset = row_offset(row, request.height, request.pitch);
            let needed = offset + dst_row;
            let available = output.len();
            let dst = output
                .get_mut(offset..needed)
                .ok_or(Error::DecodeBufferSize { needed, available })?;

            let src_y = (row as u64 * header.height as u64 / request.height as u64) as usize;
            let src = &pixels[src_y * src_row..(src_y + 1) * src_row];

            if !same_format {
                dst.fill(NEUTRAL);
            } else if request.width == header.width {
                dst.copy_from_slice(src);
            } else if let Some(unit) = unit {
                resample_row(src, dst, unit);
            } else {
                dst.fill(NEUTRAL);
            }
        }
        Ok(())
    }

    fn encode(&mut self, request: &EncodeRequest<'_>, output: &mut Vec<u8>) -> Result<()> {
        let params = request.params;
        let width = u16::try_from(params.width)
            .map_err(|_| Error::invalid_arg(format!("width {} exceeds 65535", params.width)))?;
        let height = u16::try_from(params.height)
            .map_err(|_| Error::invalid_arg(format!("height {} exceeds 65535", params.height)))?;
        let metadata_size = u32::try_from(request.metadata.len())
            .map_err(|_| Error::invalid_arg("metadata payload too large"))?;

        let field_type = if !params.flags.contains(EncodingFlags::INTERLACED) {
            FieldType::Progressive
        } else if params.flags.contains(EncodingFlags::BOTTOM_FIELD_FIRST) {
            FieldType::BottomFieldFirst
        } else {
            FieldType::TopFieldFirst
        };
        let input = params.input_format.fourcc().value();

        let row = image_pitch(params.width, params.input_format);
        let pairs = [
            (header_tags::SAMPLE_TYPE, SAMPLE_TYPE_FRAME),
            (header_tags::IMAGE_WIDTH, width),
            (header_tags::IMAGE_HEIGHT, height),
            (header_tags::ENCODED_FORMAT, params.encoded_format.value()),
            (header_tags::FRAME_INDEX, request.frame_index as u16),
            (header_tags::QUALITY_LEVEL, params.quality.to_level() as u16),
            (header_tags::FIELD_TYPE, field_type.value()),
            (header_tags::INPUT_FORMAT_HI, (input >> 16) as u16),
            (header_tags::INPUT_FORMAT_LO, input as u16),
            (header_tags::METADATA_SIZE_HI, (metadata_size >> 16) as u16),
            (header_tags::METADATA_SIZE_LO, metadata_size as u16),
            (header_tags::FRAME_HEADER, 0),
        ];

        output.reserve(4 + pairs.len() * 4 + request.metadata.len() + row * height as usize);
        output.extend_from_slice(&SIGNATURE);
        for (tag, value) in pairs {
            output.extend_from_slice(&tag.to_be_bytes());
            output.extend_from_slice(&value.to_be_bytes());
        }
        output.extend_from_slice(request.metadata);

        for r in 0..params.height {
            let offset = row_offset(r, params.height, request.pitch);
            let src = request
                .frame
                .get(offset..offset + row)
                .ok_or_else(|| Error::invalid_arg("frame buffer too small"))?;
            output.extend_from_slice(src);
        }
        Ok(())
    }

    fn extract_thumbnail(&self, sample: &[u8], flags: ThumbnailFlags) -> Result<Thumbnail> {
        let (header, format, src_row, pixels) = Self::rows(sample)?;
        let (width, height) = DecodedResolution::Thumbnail.scale(header.width, header.height);
        let luma = luma_offset(format);

        let mut out = Vec::with_capacity(width as usize * height as usize * 4);
        for ty in 0..height {
            let sy = (ty as u64 * header.height as u64 / height as u64) as usize;
            let line = &pixels[sy * src_row..(sy + 1) * src_row];
            for tx in 0..width {
                let sx = tx as usize * src_row / header.width as usize;
                let g = line.get(sx + luma).or_else(|| line.get(sx)).copied().unwrap_or(0);
                if flags.contains(ThumbnailFlags::RGB10) {
                    let v = ((g as u32) << 2) | (g as u32 >> 6);
                    out.extend_from_slice(&((v << 20) | (v << 10) | v).to_le_bytes());
                } else {
                    out.extend_from_slice(&[g, g, g, 0xFF]);
                }
            }
        }

        Ok(Thumbnail {
            width,
            height,
            flags,
            pixels: out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeParams;
    use cfhd_core::Quality;

    fn params(width: u32, height: u32, input: PixelFormat) -> EncodeParams {
        EncodeParams {
            width,
            height,
            input_format: input,
            encoded_format: EncodedFormat::Rgb444,
            flags: EncodingFlags::empty(),
            quality: Quality::High,
        }
    }

    fn encode(params: &EncodeParams, frame: &[u8], pitch: isize, metadata: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        PassthroughTransform
            .encode(
                &EncodeRequest {
                    frame,
                    pitch,
                    params,
                    metadata,
                    frame_index: 7,
                },
                &mut out,
            )
            .unwrap();
        out
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height * 4).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_header_roundtrip() {
        let p = params(8, 4, PixelFormat::Bgra);
        let sample = encode(&p, &gradient(8, 4), 32, &[1, 2, 3, 4]);
        let header = PassthroughTransform.parse_header(&sample).unwrap();
        assert_eq!(header.width, 8);
        assert_eq!(header.height, 4);
        assert_eq!(header.encoded_format, Some(EncodedFormat::Rgb444));
        assert_eq!(header.input_format, Some(PixelFormat::Bgra));
        assert_eq!(header.metadata_bytes(&sample), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_bad_samples() {
        let t = PassthroughTransform;
        assert!(matches!(t.parse_header(b"CF"), Err(Error::BadSample(_))));
        assert!(matches!(t.parse_header(b"XXXX\x40\x30\0\0"), Err(Error::BadSample(_))));

        // Zero width
        let mut sample = SIGNATURE.to_vec();
        sample.extend_from_slice(&[0x40, 0x04, 0, 2, 0x40, 0x30, 0, 0]);
        assert!(matches!(t.parse_header(&sample), Err(Error::BadSample(_))));
    }

    #[test]
    fn test_unknown_encoded_format() {
        let mut sample = SIGNATURE.to_vec();
        for (tag, value) in [(0x4003u16, 2u16), (0x4004, 2), (0x4009, 99), (0x4030, 0)] {
            sample.extend_from_slice(&tag.to_be_bytes());
            sample.extend_from_slice(&value.to_be_bytes());
        }
        let header = PassthroughTransform.parse_header(&sample).unwrap();
        assert_eq!(header.encoded_format, None);
    }

    #[test]
    fn test_negative_pitch_stores_top_down() {
        let p = params(2, 2, PixelFormat::Bgra);
        // Bottom-to-top buffer: first 8 bytes are the bottom row.
        let frame = [2u8; 8].iter().chain([1u8; 8].iter()).copied().collect::<Vec<_>>();
        let sample = encode(&p, &frame, -8, &[]);
        let pixels = &sample[sample.len() - 16..];
        assert_eq!(&pixels[..8], &[1u8; 8]);
        assert_eq!(&pixels[8..], &[2u8; 8]);
    }

    #[test]
    fn test_decode_copies_and_scales() {
        let p = params(8, 4, PixelFormat::Bgra);
        let frame = gradient(8, 4);
        let sample = encode(&p, &frame, 32, &[]);
        let header = PassthroughTransform.parse_header(&sample).unwrap();

        let mut out = vec![0u8; 32 * 4];
        let request = DecodeRequest {
            sample: &sample,
            header: &header,
            format: PixelFormat::Bgra,
            width: 8,
            height: 4,
            resolution: DecodedResolution::Full,
            pitch: 32,
            metadata: &[],
        };
        PassthroughTransform.decode(&request, &mut out).unwrap();
        assert_eq!(out, frame);

        let mut half = vec![0u8; 16 * 2];
        let request = DecodeRequest {
            width: 4,
            height: 2,
            resolution: DecodedResolution::Half,
            pitch: 16,
            ..request
        };
        PassthroughTransform.decode(&request, &mut half).unwrap();
        assert_eq!(&half[..4], &frame[..4]);
        assert_eq!(&half[16..20], &frame[64..68]);
    }

    #[test]
    fn test_decode_other_format_is_neutral() {
        let p = params(4, 2, PixelFormat::Bgra);
        let sample = encode(&p, &gradient(4, 2), 16, &[]);
        let header = PassthroughTransform.parse_header(&sample).unwrap();
        let mut out = vec![0u8; 8 * 2];
        let request = DecodeRequest {
            sample: &sample,
            header: &header,
            format: PixelFormat::Yuy2,
            width: 4,
            height: 2,
            resolution: DecodedResolution::Full,
            pitch: 8,
            metadata: &[],
        };
        PassthroughTransform.decode(&request, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == NEUTRAL));
    }

    #[test]
    fn test_thumbnail() {
        let p = params(16, 16, PixelFormat::Bgra);
        let sample = encode(&p, &vec![200u8; 16 * 16 * 4], 64, &[]);
        let thumb = PassthroughTransform
            .extract_thumbnail(&sample, ThumbnailFlags::empty())
            .unwrap();
        assert_eq!((thumb.width, thumb.height), (2, 2));
        assert_eq!(&thumb.pixels[..4], &[200, 200, 200, 255]);

        let thumb = PassthroughTransform
            .extract_thumbnail(&sample, ThumbnailFlags::RGB10)
            .unwrap();
        assert_eq!(thumb.pixels.len(), 16);
    }

    #[test]
    fn test_encode_rejects_short_frame() {
        let p = params(4, 4, PixelFormat::Bgra);
        let mut out = Vec::new();
        let result = PassthroughTransform.encode(
            &EncodeRequest {
                frame: &[0u8; 10],
                pitch: 16,
                params: &p,
                metadata: &[],
                frame_index: 0,
            },
            &mut out,
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
