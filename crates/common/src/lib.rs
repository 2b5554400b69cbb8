//! `hs-common` — Shared types, traits, and errors for the HEVC stream decoder.
//!
//! This crate is the foundation the demuxer, decoder and player depend on.
//! It defines the core abstractions:
//!
//! - **Types**: `Timestamp`, `Resolution`, `Rational`, `SessionId` (newtypes for safety)
//! - **Data flow**: `Block` (compressed input), `Picture` (decoded output), `VideoFormat`, `InputFormat`
//! - **Engine traits**: `DecodeEngine`, `DecodedImage` (opaque decoding engine)
//! - **Host trait**: `DecoderHost` (clock, pacing, picture allocation)
//! - **Errors**: `FramingError`, `EngineError`, `DecodeError`, `SessionError` (thiserror-based)
//! - **Config**: `SessionConfig`, `WorkerPolicy`, `LatenessPolicy`

pub mod block;
pub mod codec;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod host;
pub mod picture;
pub mod types;

// Re-export commonly used items at crate root
pub use block::{Block, BlockFlags};
pub use codec::VideoCodec;
pub use color::{ChromaFormat, PixelFormat};
pub use config::{LatenessPolicy, SessionConfig, WorkerPolicy, DEFAULT_LENGTH_SIZE};
pub use engine::{DecodeEngine, DecodedImage, ImagePlane, StepOutcome};
pub use error::{
    DecodeError, EngineError, EngineOp, FramingError, OverloadDrop, SessionError,
};
pub use format::{InputFormat, VideoFormat};
pub use host::DecoderHost;
pub use picture::{Picture, Plane, PICTURE_ALIGN};
pub use types::{Rational, Resolution, SessionId, Timestamp};
