//! `hs-decoder` — Paced HEVC decoding on top of libde265.
//!
//! Turns an arbitrary stream of compressed blocks into decoded pictures,
//! keeping up with a presentation clock by dropping work under sustained
//! lateness.
//!
//! # Architecture
//!
//! The decode loop is written against the `DecodeEngine` trait from
//! `hs-common`. The one real engine is libde265, loaded dynamically at
//! runtime so hosts without it can still start and report the problem.
//!
//! ## Module Overview
//!
//! - [`de265`] — libde265 binding
//!   - [`de265::ffi`] — Raw FFI bindings (loaded via `libloading`)
//!   - [`de265::engine`] — Decoder context implementing `DecodeEngine`
//! - [`admission`] — Late-frame admission control
//! - [`materialize`] — Plane copy into output pictures, geometry renegotiation
//! - [`session`] — The per-stream decode loop
//! - [`manager`] — Library loading and session bookkeeping
//! - [`testing`] — Mock engine and host for deterministic tests
//!
//! ## Usage
//!
//! ```ignore
//! use hs_decoder::manager::DecoderManager;
//! use hs_common::{Block, InputFormat, Resolution, SessionConfig, SessionId};
//!
//! let mut manager = DecoderManager::new(SessionConfig::default());
//! let session = manager.open_session(
//!     SessionId::new("camera-1"),
//!     my_host,
//!     &InputFormat::hevc(Resolution::HD),
//! )?;
//!
//! for block in blocks {
//!     if let Some(picture) = session.decode(Some(block)) {
//!         present(picture);
//!     }
//! }
//! for picture in session.drain()? {
//!     present(picture);
//! }
//! ```

pub mod admission;
pub mod de265;
pub mod error;
pub mod manager;
pub mod materialize;
pub mod session;
pub mod testing;

pub use admission::{Admission, AdmissionController, LatenessState};
pub use de265::{De265Engine, De265Library};
pub use error::De265LoadError;
pub use manager::{De265Session, DecoderManager};
pub use session::{DecoderSession, SessionStats};
