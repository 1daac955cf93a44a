//! Encode quality levels and option flags.

use bitflags::bitflags;

/// Encoding quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Quality {
    /// Low quality (proxy)
    Low,
    /// Medium quality
    Medium,
    /// High quality
    #[default]
    High,
    /// Film Scan 1 quality
    FilmScan1,
    /// Film Scan 2 quality (highest)
    FilmScan2,
}

impl Quality {
    /// Create from integer quality level (1-5)
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Quality::Low,
            2 => Quality::Medium,
            3 => Quality::High,
            4 => Quality::FilmScan1,
            _ => Quality::FilmScan2,
        }
    }

    /// Convert to integer level
    pub fn to_level(&self) -> u8 {
        match self {
            Quality::Low => 1,
            Quality::Medium => 2,
            Quality::High => 3,
            Quality::FilmScan1 => 4,
            Quality::FilmScan2 => 5,
        }
    }
}

bitflags! {
    /// Options passed to encoder preparation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EncodingFlags: u32 {
        /// Source frames are interlaced, top field first.
        const INTERLACED = 0x0001;
        /// Encode pairs of frames as a two-frame group.
        const TWO_FRAME_GOP = 0x0002;
        /// Source is bottom field first (with `INTERLACED`).
        const BOTTOM_FIELD_FIRST = 0x0004;
    }
}

bitflags! {
    /// Options passed to decoder preparation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct DecodingFlags: u32 {
        /// Skip staged active-metadata overrides for this session.
        const IGNORE_ACTIVE_METADATA = 0x0001;
        /// Skip the external colour database for this session.
        const IGNORE_DATABASE = 0x0002;
    }
}

bitflags! {
    /// Options for thumbnail extraction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ThumbnailFlags: u32 {
        /// 10-bit RGB packed into 32-bit words instead of 8-bit BGRA.
        const RGB10 = 0x0001;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_levels() {
        assert_eq!(Quality::from_level(1), Quality::Low);
        assert_eq!(Quality::from_level(9), Quality::FilmScan2);
        assert_eq!(Quality::High.to_level(), 3);
        assert_eq!(Quality::default(), Quality::High);
    }

    #[test]
    fn test_flag_sets() {
        let flags = EncodingFlags::INTERLACED | EncodingFlags::BOTTOM_FIELD_FIRST;
        assert!(flags.contains(EncodingFlags::INTERLACED));
        assert!(!flags.contains(EncodingFlags::TWO_FRAME_GOP));
        assert!(DecodingFlags::default().is_empty());
    }
}
