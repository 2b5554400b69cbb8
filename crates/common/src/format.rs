//! Stream descriptions: what the host declares on open, what the session emits.

use crate::codec::VideoCodec;
use crate::color::PixelFormat;
use crate::types::Resolution;

/// Input stream description supplied when a session is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFormat {
    pub codec: VideoCodec,
    /// Geometry declared by the container; may be zero when unknown.
    pub resolution: Resolution,
    /// Out-of-band codec configuration (hvcC record or Annex-B parameter sets).
    pub extradata: Vec<u8>,
    /// Whether the host believes blocks carry length-prefixed NAL units.
    pub packetized: bool,
}

impl InputFormat {
    /// An HEVC stream with no extradata, declared as Annex-B.
    pub fn hevc(resolution: Resolution) -> Self {
        Self {
            codec: VideoCodec::H265,
            resolution,
            extradata: Vec::new(),
            packetized: false,
        }
    }

    pub fn with_extradata(mut self, extradata: impl Into<Vec<u8>>) -> Self {
        self.extradata = extradata.into();
        self
    }

    pub fn with_packetized(mut self, packetized: bool) -> Self {
        self.packetized = packetized;
        self
    }
}

/// Negotiated output geometry and layout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VideoFormat {
    pub pixel_format: PixelFormat,
    /// Allocated picture size.
    pub resolution: Resolution,
    /// Displayed region, starting at the top-left corner.
    pub visible: Resolution,
}

impl VideoFormat {
    pub fn i420(resolution: Resolution) -> Self {
        Self {
            pixel_format: PixelFormat::I420,
            resolution,
            visible: resolution,
        }
    }

    pub fn plane_count(&self) -> usize {
        self.pixel_format.plane_count()
    }

    /// Width in pixels and visible line count of `plane`.
    pub fn plane_size(&self, plane: usize) -> (u32, u32) {
        self.pixel_format
            .plane_size(plane, self.visible.width, self.visible.height)
    }
}
