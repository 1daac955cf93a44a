//! Output format and geometry negotiation for decoders.

use crate::transform::SampleHeader;
use cfhd_core::{DecodedResolution, EncodedFormat, Error, PixelFormat, Result};

use cfhd_core::PixelFormat::*;

const YUV_DIRECT: &[PixelFormat] = &[Yu64, V210, Uyvy, Yuy2];
const RGB_DEEP: &[PixelFormat] = &[Rgb48, Rgb64, B64a, Wp13];
const RGB_10BIT: &[PixelFormat] = &[R210, Dpx0, Rg30, Ab10, Ar10];
const RGB_8BIT: &[PixelFormat] = &[Bgra, Rgb24];

/// Candidate output formats for a sample, most preferred first.
///
/// Formats native to the encoded kind come first and formats needing a
/// colour-space conversion come last. Bayer outputs are only offered for
/// Bayer sources.
pub fn propose_output_formats(header: &SampleHeader) -> Vec<PixelFormat> {
    let encoded = header.encoded_format.unwrap_or(EncodedFormat::Yuv422);
    let groups: &[&[PixelFormat]] = match encoded {
        EncodedFormat::Yuv422 => &[YUV_DIRECT, RGB_DEEP, RGB_10BIT, RGB_8BIT],
        EncodedFormat::Rgb444 => &[RGB_DEEP, RGB_10BIT, RGB_8BIT, YUV_DIRECT],
        EncodedFormat::Rgba4444 => &[
            &[B64a, Rgb64, W13a, Bgra, BgraPremultiplied],
            &[Rgb48, Wp13],
            RGB_10BIT,
            &[Rgb24],
            YUV_DIRECT,
        ],
        EncodedFormat::Yuva4444 => &[
            YUV_DIRECT,
            &[B64a, Rgb64, Bgra, BgraPremultiplied],
            &[Rgb48, Wp13],
            RGB_10BIT,
            &[Rgb24],
        ],
        EncodedFormat::Bayer => &[&[Byr4, Byr2], RGB_DEEP, RGB_10BIT, RGB_8BIT, YUV_DIRECT],
    };

    let mut formats: Vec<PixelFormat> = Vec::new();
    for format in groups.iter().flat_map(|g| g.iter()) {
        if !formats.contains(format) {
            formats.push(*format);
        }
    }
    formats
}

/// Pick the requested format, or the first candidate when none is requested.
pub fn resolve_requested_format(
    requested: Option<PixelFormat>,
    candidates: &[PixelFormat],
) -> Result<PixelFormat> {
    match requested {
        Some(format) if candidates.contains(&format) => Ok(format),
        Some(format) => Err(Error::UnsupportedFormat(format)),
        None => candidates
            .first()
            .copied()
            .ok_or_else(|| Error::BadFormat("no output formats available".into())),
    }
}

/// Output size for a decode.
///
/// A zero requested dimension is derived from the header size and the resolution divisor.
pub fn compute_output_geometry(
    header_width: u32,
    header_height: u32,
    requested_width: u32,
    requested_height: u32,
    resolution: DecodedResolution,
) -> (u32, u32) {
    let (width, height) = resolution.scale(header_width, header_height);
    (
        if requested_width == 0 { width } else { requested_width },
        if requested_height == 0 { height } else { requested_height },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfhd_core::FieldType;

    fn header(encoded: Option<EncodedFormat>) -> SampleHeader {
        SampleHeader {
            encoded_format: encoded,
            field_type: FieldType::Progressive,
            width: 1920,
            height: 1080,
            input_format: None,
            metadata: None,
        }
    }

    #[test]
    fn test_bayer_only_for_bayer() {
        for encoded in [
            EncodedFormat::Yuv422,
            EncodedFormat::Rgb444,
            EncodedFormat::Rgba4444,
            EncodedFormat::Yuva4444,
        ] {
            let formats = propose_output_formats(&header(Some(encoded)));
            assert!(!formats.iter().any(|f| f.is_bayer()), "{:?}", encoded);
        }
        let bayer = propose_output_formats(&header(Some(EncodedFormat::Bayer)));
        assert_eq!(bayer[0], PixelFormat::Byr4);
    }

    #[test]
    fn test_preference_order() {
        let yuv = propose_output_formats(&header(Some(EncodedFormat::Yuv422)));
        assert_eq!(yuv[0], PixelFormat::Yu64);
        assert!(
            yuv.iter().position(|f| *f == PixelFormat::V210)
                < yuv.iter().position(|f| *f == PixelFormat::Bgra)
        );

        let rgb = propose_output_formats(&header(Some(EncodedFormat::Rgb444)));
        assert_eq!(rgb[0], PixelFormat::Rgb48);
        assert_eq!(*rgb.last().unwrap(), PixelFormat::Yuy2);

        let rgba = propose_output_formats(&header(Some(EncodedFormat::Rgba4444)));
        assert!(rgba[0].has_alpha());
    }

    #[test]
    fn test_unknown_defaults_to_422() {
        assert_eq!(
            propose_output_formats(&header(None)),
            propose_output_formats(&header(Some(EncodedFormat::Yuv422)))
        );
    }

    #[test]
    fn test_no_duplicates() {
        let formats = propose_output_formats(&header(Some(EncodedFormat::Rgba4444)));
        for (i, f) in formats.iter().enumerate() {
            assert!(!formats[i + 1..].contains(f));
        }
    }

    #[test]
    fn test_resolve() {
        let candidates = [PixelFormat::Yu64, PixelFormat::Bgra];
        assert_eq!(resolve_requested_format(None, &candidates).unwrap(), PixelFormat::Yu64);
        assert_eq!(
            resolve_requested_format(Some(PixelFormat::Bgra), &candidates).unwrap(),
            PixelFormat::Bgra
        );
        let err = resolve_requested_format(Some(PixelFormat::Byr4), &candidates).unwrap_err();
        assert_eq!(err.code(), cfhd_core::ErrorCode::BadFormat);
        assert!(resolve_requested_format(None, &[]).is_err());
    }

    #[test]
    fn test_geometry() {
        assert_eq!(compute_output_geometry(1920, 1080, 0, 0, DecodedResolution::Full), (1920, 1080));
        assert_eq!(compute_output_geometry(1920, 1080, 0, 0, DecodedResolution::Half), (960, 540));
        assert_eq!(compute_output_geometry(1920, 1080, 0, 0, DecodedResolution::Quarter), (480, 270));
        assert_eq!(compute_output_geometry(1920, 1080, 0, 0, DecodedResolution::Thumbnail), (240, 135));
        assert_eq!(
            compute_output_geometry(1920, 1080, 0, 0, DecodedResolution::HalfHorizontal),
            (960, 1080)
        );
        assert_eq!(compute_output_geometry(1920, 1080, 640, 0, DecodedResolution::Half), (640, 540));
        assert_eq!(compute_output_geometry(4, 4, 0, 0, DecodedResolution::Thumbnail), (1, 1));
    }
}
