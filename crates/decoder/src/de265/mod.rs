//! libde265 software HEVC decoder binding.
//!
//! libde265 is loaded dynamically at runtime, so a missing library is a
//! reportable condition rather than a link failure.
//!
//! # Module Structure
//!
//! - [`ffi`] — Raw FFI bindings (loaded via `libloading`).
//! - [`engine`] — Safe decoder context implementing `DecodeEngine`, with RAII cleanup.
//!
//! # Usage
//!
//! ```ignore
//! use hs_decoder::de265::{De265Engine, De265Library};
//! use std::sync::Arc;
//!
//! // Load once, share across sessions
//! let lib = Arc::new(De265Library::load()?);
//! let engine = De265Engine::new(lib.clone())?;
//! ```

pub mod engine;
pub mod ffi;

pub use engine::{De265Engine, De265Image};
pub use ffi::De265Library;
