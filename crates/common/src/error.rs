//! Central error types for the decode adapter (thiserror-based).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::codec::VideoCodec;
use crate::color::ChromaFormat;

/// A length prefix declared more bytes than the block still holds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("NAL length {declared} at offset {offset} exceeds the {remaining} bytes left in the block")]
pub struct FramingError {
    /// Offset of the NAL payload (just past its length prefix) in the block.
    pub offset: usize,
    /// Length read from the prefix.
    pub declared: usize,
    /// Bytes actually available after the prefix.
    pub remaining: usize,
}

/// Engine entry point that reported a failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EngineOp {
    PushData,
    PushNal,
    Decode,
    Flush,
    StartWorkers,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PushData => "push data",
            Self::PushNal => "push NAL",
            Self::Decode => "decode",
            Self::Flush => "flush",
            Self::StartWorkers => "start worker threads",
        };
        f.write_str(name)
    }
}

/// Decode engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to {op}: {text} ({code})")]
    Rejected {
        op: EngineOp,
        code: i32,
        text: String,
    },

    #[error("Input of {len} bytes exceeds the engine's length limit")]
    InputTooLarge { len: usize },

    #[error("Decode engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Engine-specific status code, if the engine reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Policy-driven abandonment of a block under sustained lateness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverloadDrop {
    #[error("more than {ceiling:?} of late video ({late_frames} late frames), dropping frame (computer too slow?)")]
    TooSlow { late_frames: u32, ceiling: Duration },

    #[error("{late_frames} late frames exceed the hard limit of {limit}, dropping frame")]
    HardDrop { late_frames: u32, limit: u32 },
}

/// Why a single decode call produced no picture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Unsupported output colorspace {0}")]
    UnsupportedChroma(ChromaFormat),

    #[error("Overload: {0}")]
    Overload(#[from] OverloadDrop),

    #[error("Discontinuity: engine reset, block dropped")]
    Discontinuity,

    #[error("Corrupted block dropped")]
    Corrupted,

    #[error("Host could not provide an output picture")]
    PictureUnavailable,
}

impl DecodeError {
    /// True for intentional abandonment (flags, lateness) rather than a failure.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            Self::Overload(_) | Self::Discontinuity | Self::Corrupted
        )
    }
}

/// Fatal errors opening a decoder session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unsupported codec {}: only HEVC input is decoded", .0.display_name())]
    UnsupportedCodec(VideoCodec),

    #[error("Failed to initialize decoder: {0}")]
    EngineInit(#[source] EngineError),

    #[error("Invalid session config: {0}")]
    InvalidConfig(String),

    #[error("Decode engine library unavailable: {0}")]
    LibraryUnavailable(String),
}
