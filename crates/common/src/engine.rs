//! Decode engine abstraction.
//!
//! The session programs against these traits, never against a concrete
//! engine. `hs-decoder` binds them to libde265 and ships a scriptable mock
//! for tests.

use crate::color::ChromaFormat;
use crate::error::EngineError;
use crate::types::Timestamp;

/// Result of one incremental decode step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The engine did work; stepping again may produce more.
    Progressed,
    /// Output buffer full or waiting for input. Not an error: stop stepping.
    Stalled,
}

/// One plane of a decoded image, borrowed from the engine.
#[derive(Copy, Clone, Debug)]
pub struct ImagePlane<'a> {
    /// Plane storage, at least `stride * lines` bytes.
    pub data: &'a [u8],
    /// Bytes between the starts of successive lines.
    pub stride: usize,
}

/// A decoded image owned by the engine.
///
/// Handles are only valid until the engine is called again; [`DecodeEngine`]
/// enforces that by borrowing the engine for the image's lifetime.
pub trait DecodedImage {
    /// Luma width in pixels.
    fn width(&self) -> u32;

    /// Luma height in lines.
    fn height(&self) -> u32;

    fn chroma(&self) -> ChromaFormat;

    /// Presentation timestamp carried through from the push that produced it.
    fn pts(&self) -> Timestamp;

    /// Plane `index` (0 = Y, 1 = U, 2 = V), if the image has it.
    fn plane(&self, index: usize) -> Option<ImagePlane<'_>>;
}

/// Push/step/pull interface of an HEVC decoding engine.
///
/// Nothing here blocks: an engine that would wait for input returns
/// [`StepOutcome::Stalled`] instead.
pub trait DecodeEngine {
    type Image<'a>: DecodedImage
    where
        Self: 'a;

    /// Push a chunk of an Annex-B byte stream.
    fn push(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError>;

    /// Push exactly one NAL unit, without start code or length prefix.
    fn push_nal(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError>;

    /// Mark the end of the NAL unit currently being pushed.
    fn push_end_of_nal(&mut self);

    /// Advance decoding by one step.
    fn step(&mut self) -> Result<StepOutcome, EngineError>;

    /// Take the next finished image out of the engine, if any.
    fn pull_image(&mut self) -> Option<Self::Image<'_>>;

    /// Signal end of stream so buffered pictures can be drained.
    fn flush(&mut self) -> Result<(), EngineError>;

    /// Drop all buffered input and pending images.
    fn reset(&mut self);

    /// Start `count` internal worker threads.
    fn start_workers(&mut self, count: u32) -> Result<(), EngineError>;

    /// Engine name and version, for logging.
    fn version(&self) -> String {
        "unknown".to_string()
    }
}
