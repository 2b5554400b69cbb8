//! Video codec identifiers.

use serde::{Deserialize, Serialize};

/// Video codec identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Human-readable codec name (for display/logging).
    pub fn display_name(self) -> &'static str {
        match self {
            Self::H264 => "H.264/AVC",
            Self::H265 => "H.265/HEVC",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
        }
    }

    /// Whether NAL units of this codec carry the two-byte HEVC header.
    pub fn is_hevc(self) -> bool {
        matches!(self, Self::H265)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_display() {
        assert_eq!(VideoCodec::H264.display_name(), "H.264/AVC");
        assert_eq!(VideoCodec::H265.display_name(), "H.265/HEVC");
    }

    #[test]
    fn only_h265_is_hevc() {
        assert!(VideoCodec::H265.is_hevc());
        assert!(!VideoCodec::H264.is_hevc());
        assert!(!VideoCodec::Av1.is_hevc());
    }
}
