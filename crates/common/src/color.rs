//! Chroma subsampling and output pixel format types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chroma subsampling of a decoded image, as reported by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromaFormat {
    /// Luma only.
    Monochrome,
    /// Chroma at half resolution in both directions.
    Yuv420,
    /// Chroma at half horizontal resolution.
    Yuv422,
    /// Chroma at full resolution.
    Yuv444,
}

impl ChromaFormat {
    /// The only layout the materializer can copy into an output picture.
    pub const SUPPORTED: Self = Self::Yuv420;

    pub fn is_supported(self) -> bool {
        self == Self::SUPPORTED
    }

    /// Horizontal and vertical chroma subsampling shifts.
    pub fn subsampling(self) -> (u32, u32) {
        match self {
            Self::Monochrome | Self::Yuv444 => (0, 0),
            Self::Yuv420 => (1, 1),
            Self::Yuv422 => (1, 0),
        }
    }
}

impl fmt::Display for ChromaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monochrome => "4:0:0",
            Self::Yuv420 => "4:2:0",
            Self::Yuv422 => "4:2:2",
            Self::Yuv444 => "4:4:4",
        };
        f.write_str(name)
    }
}

/// Pixel format of an output picture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar 8-bit YUV 4:2:0: Y, then U, then V, each its own plane.
    #[default]
    I420,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            Self::I420 => 3,
        }
    }

    /// Chroma layout this pixel format stores.
    pub fn chroma(self) -> ChromaFormat {
        match self {
            Self::I420 => ChromaFormat::Yuv420,
        }
    }

    /// Visible width and line count of `plane` for a `width`x`height` frame.
    pub fn plane_size(self, plane: usize, width: u32, height: u32) -> (u32, u32) {
        if plane == 0 {
            return (width, height);
        }
        let (sx, sy) = self.chroma().subsampling();
        (
            (width + (1 << sx) - 1) >> sx,
            (height + (1 << sy) - 1) >> sy,
        )
    }
}
