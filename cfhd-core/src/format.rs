//! Pixel formats, encoded formats and four-character codes.

use std::fmt;

/// Four-character code packed big-endian into a `u32` (`a<<24 | b<<16 | c<<8 | d`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FourCc(pub u32);

impl FourCc {
    /// Pack four bytes into a code.
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCc(
            (bytes[0] as u32) << 24
                | (bytes[1] as u32) << 16
                | (bytes[2] as u32) << 8
                | bytes[3] as u32,
        )
    }

    /// The four bytes, most significant first.
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Raw packed value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in bytes {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        FourCc(value)
    }
}

/// Pixel format of an uncompressed frame buffer.
///
/// Codes the engine does not know are carried as [`PixelFormat::Other`] and
/// treated as opaque: size them with [`crate::image_pitch`], never by assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// 8-bit BGRA, 32bpp.
    Bgra,
    /// 8-bit BGRA with premultiplied alpha, 32bpp.
    BgraPremultiplied,
    /// 8-bit RGB, 24bpp.
    Rgb24,
    /// 8-bit YUV 4:2:2, YUYV order.
    Yuy2,
    /// 8-bit YUV 4:2:2, UYVY order (`2vuy`).
    Uyvy,
    /// 10-bit YUV 4:2:2 packed, 6 pixels per 16 bytes.
    V210,
    /// 16-bit YUV 4:2:2.
    Yu64,
    /// 16-bit RGB.
    Rgb48,
    /// 13-bit signed RGB in 16-bit words.
    Wp13,
    /// 13-bit signed RGBA in 16-bit words.
    W13a,
    /// 16-bit RGBA.
    Rgb64,
    /// 16-bit ARGB, big-endian.
    B64a,
    /// 10-bit RGB packed, big-endian.
    R210,
    /// 10-bit RGB packed as for DPX.
    Dpx0,
    /// 10-bit ABGR packed.
    Ab10,
    /// 10-bit ARGB packed.
    Ar10,
    /// 10-bit RGB packed, little-endian.
    Rg30,
    /// 16-bit raw Bayer, unpacked.
    Byr2,
    /// 16-bit raw Bayer, camera order.
    Byr4,
    /// Any other code.
    Other(FourCc),
}

impl PixelFormat {
    const KNOWN: [(PixelFormat, [u8; 4]); 19] = [
        (PixelFormat::Bgra, *b"BGRA"),
        (PixelFormat::BgraPremultiplied, *b"BGRa"),
        (PixelFormat::Rgb24, *b"RG24"),
        (PixelFormat::Yuy2, *b"YUY2"),
        (PixelFormat::Uyvy, *b"2vuy"),
        (PixelFormat::V210, *b"v210"),
        (PixelFormat::Yu64, *b"YU64"),
        (PixelFormat::Rgb48, *b"RG48"),
        (PixelFormat::Wp13, *b"WP13"),
        (PixelFormat::W13a, *b"W13A"),
        (PixelFormat::Rgb64, *b"RG64"),
        (PixelFormat::B64a, *b"b64a"),
        (PixelFormat::R210, *b"R210"),
        (PixelFormat::Dpx0, *b"DPX0"),
        (PixelFormat::Ab10, *b"AB10"),
        (PixelFormat::Ar10, *b"AR10"),
        (PixelFormat::Rg30, *b"RG30"),
        (PixelFormat::Byr2, *b"BYR2"),
        (PixelFormat::Byr4, *b"BYR4"),
    ];

    /// Four-character code for this format.
    pub fn fourcc(&self) -> FourCc {
        if let PixelFormat::Other(code) = self {
            return *code;
        }
        Self::KNOWN
            .iter()
            .find(|(format, _)| format == self)
            .map(|(_, bytes)| FourCc::new(*bytes))
            .unwrap_or(FourCc(0))
    }

    /// Map a four-character code to a format.
    pub fn from_fourcc(code: FourCc) -> Self {
        Self::KNOWN
            .iter()
            .find(|(_, bytes)| FourCc::new(*bytes) == code)
            .map(|(format, _)| *format)
            .unwrap_or(PixelFormat::Other(code))
    }

    /// Raw sensor formats.
    pub fn is_bayer(&self) -> bool {
        matches!(self, PixelFormat::Byr2 | PixelFormat::Byr4)
    }

    /// YUV formats.
    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            PixelFormat::Yuy2 | PixelFormat::Uyvy | PixelFormat::V210 | PixelFormat::Yu64
        )
    }

    /// Check if format has alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            PixelFormat::Bgra
                | PixelFormat::BgraPremultiplied
                | PixelFormat::W13a
                | PixelFormat::Rgb64
                | PixelFormat::B64a
        )
    }

    /// Whether this is a code the engine understands.
    pub fn is_known(&self) -> bool {
        !matches!(self, PixelFormat::Other(_))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

/// Internal representation of the compressed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodedFormat {
    /// YUV 4:2:2
    Yuv422,
    /// RGB 4:4:4
    Rgb444,
    /// RGBA 4:4:4:4
    Rgba4444,
    /// Raw Bayer
    Bayer,
    /// YUVA 4:4:4:4
    Yuva4444,
}

impl EncodedFormat {
    /// Wire value of the format.
    pub fn value(&self) -> u16 {
        match self {
            EncodedFormat::Yuv422 => 0,
            EncodedFormat::Rgb444 => 1,
            EncodedFormat::Rgba4444 => 2,
            EncodedFormat::Bayer => 3,
            EncodedFormat::Yuva4444 => 4,
        }
    }

    /// Parse a wire value. Unknown values yield `None`.
    pub fn from_value(value: u16) -> Option<Self> {
        match value {
            0 => Some(EncodedFormat::Yuv422),
            1 => Some(EncodedFormat::Rgb444),
            2 => Some(EncodedFormat::Rgba4444),
            3 => Some(EncodedFormat::Bayer),
            4 => Some(EncodedFormat::Yuva4444),
            _ => None,
        }
    }

    /// Check if the encoding carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(self, EncodedFormat::Rgba4444 | EncodedFormat::Yuva4444)
    }
}

/// Interlacing of the encoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    #[default]
    Progressive,
    TopFieldFirst,
    BottomFieldFirst,
}

impl FieldType {
    /// Wire value.
    pub fn value(&self) -> u16 {
        match self {
            FieldType::Progressive => 0,
            FieldType::TopFieldFirst => 1,
            FieldType::BottomFieldFirst => 2,
        }
    }

    /// Parse a wire value; unknown values read as progressive.
    pub fn from_value(value: u16) -> Self {
        match value {
            1 => FieldType::TopFieldFirst,
            2 => FieldType::BottomFieldFirst,
            _ => FieldType::Progressive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_packing() {
        let code = FourCc::new(*b"YUY2");
        assert_eq!(code.0, (b'Y' as u32) << 24 | (b'U' as u32) << 16 | (b'Y' as u32) << 8 | b'2' as u32);
        assert_eq!(code.to_bytes(), *b"YUY2");
        assert_eq!(code.to_string(), "YUY2");
    }

    #[test]
    fn test_fourcc_display_non_printable() {
        assert_eq!(FourCc(1).to_string(), "0x00000001");
    }

    #[test]
    fn test_pixel_format_fourcc_mapping() {
        assert_eq!(PixelFormat::Uyvy.fourcc(), FourCc::new(*b"2vuy"));
        assert_eq!(PixelFormat::from_fourcc(FourCc::new(*b"b64a")), PixelFormat::B64a);
        let unknown = FourCc::new(*b"ZZZZ");
        assert_eq!(PixelFormat::from_fourcc(unknown), PixelFormat::Other(unknown));
        assert_eq!(PixelFormat::Other(unknown).fourcc(), unknown);
        assert!(!PixelFormat::Other(unknown).is_known());
    }

    #[test]
    fn test_pixel_format_classes() {
        assert!(PixelFormat::Byr4.is_bayer());
        assert!(!PixelFormat::Yuy2.is_bayer());
        assert!(PixelFormat::V210.is_yuv());
        assert!(PixelFormat::B64a.has_alpha());
        assert!(!PixelFormat::Rgb48.has_alpha());
    }

    #[test]
    fn test_encoded_format_values() {
        for format in [
            EncodedFormat::Yuv422,
            EncodedFormat::Rgb444,
            EncodedFormat::Rgba4444,
            EncodedFormat::Bayer,
            EncodedFormat::Yuva4444,
        ] {
            assert_eq!(EncodedFormat::from_value(format.value()), Some(format));
        }
        assert_eq!(EncodedFormat::from_value(99), None);
    }

    #[test]
    fn test_field_type_unknown_is_progressive() {
        assert_eq!(FieldType::from_value(7), FieldType::Progressive);
        assert_eq!(FieldType::from_value(1), FieldType::TopFieldFirst);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_formats_serialize_by_name() {
        let json = serde_json::to_string(&PixelFormat::Uyvy).unwrap();
        let back: PixelFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PixelFormat::Uyvy);
        let json = serde_json::to_string(&EncodedFormat::Bayer).unwrap();
        assert_eq!(serde_json::from_str::<EncodedFormat>(&json).unwrap(), EncodedFormat::Bayer);
    }
}
