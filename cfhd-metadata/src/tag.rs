//! Metadata tag identifiers.

use cfhd_core::FourCc;
use std::fmt;

/// 32-bit tag identifier, conventionally a four-character code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub u32);

impl Tag {
    /// Tag from four characters.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Tag(FourCc::new(bytes).value())
    }

    /// Raw value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The null tag, only valid as a packed-block container.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", FourCc(self.0))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", FourCc(self.0))
    }
}

impl From<u32> for Tag {
    fn from(value: u32) -> Self {
        Tag(value)
    }
}

/// Well-known tags.
pub mod tags {
    use super::Tag;

    /// Clip identity (GUID).
    pub const CLIP_GUID: Tag = Tag::new(*b"GUID");
    /// Selects the global eye scope for following adds (0 mono, 1 left, 2 right).
    pub const SELECT_EYE: Tag = Tag::new(*b"SEYE");
    /// Look/LUT file. Added as a path, stored as the short filename.
    pub const LOOK_FILE: Tag = Tag::new(*b"LOOK");
    /// CRC-32 of the look file contents.
    pub const LOOK_CRC: Tag = Tag::new(*b"LCRC");
    /// Left-eye delta container.
    pub const EYE_DELTA_LEFT: Tag = Tag::new(*b"DLT1");
    /// Right-eye delta container.
    pub const EYE_DELTA_RIGHT: Tag = Tag::new(*b"DLT2");
    /// SMPTE timecode string.
    pub const TIMECODE: Tag = Tag::new(*b"TIMC");
    /// Unique frame number.
    pub const UNIQUE_FRAME: Tag = Tag::new(*b"UFRM");
    /// White balance (float RGB gains).
    pub const WHITE_BALANCE: Tag = Tag::new(*b"WBAL");
    /// Saturation (float).
    pub const SATURATION: Tag = Tag::new(*b"SATU");
    /// Exposure (float).
    pub const EXPOSURE: Tag = Tag::new(*b"EXPS");
    /// Camera or encoder name.
    pub const CAMERA_NAME: Tag = Tag::new(*b"CAMR");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_display() {
        assert_eq!(tags::CLIP_GUID.to_string(), "GUID");
        assert_eq!(format!("{:?}", tags::LOOK_FILE), "Tag(LOOK)");
        assert!(Tag(0).is_null());
        assert!(!tags::SELECT_EYE.is_null());
    }
}
