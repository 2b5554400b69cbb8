//! Output pictures — owned planar frame buffers handed back to the host.

use crate::format::VideoFormat;
use crate::types::Timestamp;

/// Row alignment used by [`Picture::new`].
pub const PICTURE_ALIGN: usize = 32;

/// One plane of an output picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    /// Bytes from the start of one line to the start of the next.
    pub pitch: usize,
    /// Number of lines the picture displays.
    pub visible_lines: usize,
    /// `pitch * visible_lines` bytes of storage.
    pub pixels: Vec<u8>,
}

impl Plane {
    pub fn new(pitch: usize, visible_lines: usize) -> Self {
        Self {
            pitch,
            visible_lines,
            pixels: vec![0u8; pitch * visible_lines],
        }
    }

    /// Bytes of line `line`, including any padding up to `pitch`.
    pub fn line(&self, line: usize) -> &[u8] {
        let start = line * self.pitch;
        &self.pixels[start..start + self.pitch]
    }
}

/// A decoded frame owned by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    pub format: VideoFormat,
    pub planes: Vec<Plane>,
    pub pts: Timestamp,
    /// Always true: the engine produces frames, never fields.
    pub progressive: bool,
}

impl Picture {
    /// Allocate a picture with each plane's pitch rounded up to [`PICTURE_ALIGN`].
    pub fn new(format: &VideoFormat) -> Self {
        let planes = (0..format.plane_count())
            .map(|p| {
                let (width, lines) = format.plane_size(p);
                let pitch = (width as usize).next_multiple_of(PICTURE_ALIGN);
                Plane::new(pitch, lines as usize)
            })
            .collect();
        Self {
            format: *format,
            planes,
            pts: Timestamp::ZERO,
            progressive: false,
        }
    }

    /// Allocate a picture with caller-chosen pitches, one per plane.
    ///
    /// Returns `None` if the pitch count does not match the format's planes.
    pub fn with_pitches(format: &VideoFormat, pitches: &[usize]) -> Option<Self> {
        if pitches.len() != format.plane_count() {
            return None;
        }
        let planes = pitches
            .iter()
            .enumerate()
            .map(|(p, &pitch)| {
                let (_, lines) = format.plane_size(p);
                Plane::new(pitch, lines as usize)
            })
            .collect();
        Some(Self {
            format: *format,
            planes,
            pts: Timestamp::ZERO,
            progressive: false,
        })
    }

    /// Append the visible region of every plane, tightly packed, to `out`.
    pub fn write_packed(&self, out: &mut Vec<u8>) {
        for (p, plane) in self.planes.iter().enumerate() {
            let (width, _) = self.format.plane_size(p);
            let width = (width as usize).min(plane.pitch);
            for line in 0..plane.visible_lines {
                out.extend_from_slice(&plane.line(line)[..width]);
            }
        }
    }
}
