//! Raw FFI bindings for libde265.
//!
//! These bindings are loaded dynamically at runtime via `libloading`. They
//! cover the push/decode/pull subset of the public C API (`libde265/de265.h`).

use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

use crate::error::De265LoadError;

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

/// `de265_decoder_context*`.
pub type De265Context = *mut c_void;

/// `const struct de265_image*`.
pub type De265ImagePtr = *const c_void;

/// `de265_PTS`.
pub type De265Pts = i64;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// `de265_error`.
pub type De265Error = c_int;

pub const DE265_OK: De265Error = 0;
pub const DE265_ERROR_OUT_OF_MEMORY: De265Error = 7;
/// Output queue is full; pull images before decoding further.
pub const DE265_ERROR_IMAGE_BUFFER_FULL: De265Error = 9;
pub const DE265_ERROR_CANNOT_START_THREADPOOL: De265Error = 10;
/// All pushed data is consumed.
pub const DE265_ERROR_WAITING_FOR_INPUT_DATA: De265Error = 13;
/// First warning code; everything at or above it is not an error.
pub const DE265_FIRST_WARNING: De265Error = 1000;

/// Same rule as `de265_isOK()`: success or a warning.
pub fn status_is_ok(status: De265Error) -> bool {
    status == DE265_OK || status >= DE265_FIRST_WARNING
}

// ---------------------------------------------------------------------------
// Chroma formats
// ---------------------------------------------------------------------------

pub const DE265_CHROMA_MONO: c_int = 0;
pub const DE265_CHROMA_420: c_int = 1;
pub const DE265_CHROMA_422: c_int = 2;
pub const DE265_CHROMA_444: c_int = 3;

// ---------------------------------------------------------------------------
// Function table
// ---------------------------------------------------------------------------

/// libde265 entry points used by the engine.
#[allow(non_snake_case)]
pub struct De265Api {
    pub de265_get_version: unsafe extern "C" fn() -> *const c_char,
    pub de265_get_error_text: unsafe extern "C" fn(err: De265Error) -> *const c_char,

    pub de265_new_decoder: unsafe extern "C" fn() -> De265Context,
    pub de265_start_worker_threads:
        unsafe extern "C" fn(ctx: De265Context, number_of_threads: c_int) -> De265Error,
    pub de265_free_decoder: unsafe extern "C" fn(ctx: De265Context) -> De265Error,

    pub de265_push_data: unsafe extern "C" fn(
        ctx: De265Context,
        data: *const c_void,
        length: c_int,
        pts: De265Pts,
        user_data: *mut c_void,
    ) -> De265Error,
    pub de265_push_NAL: unsafe extern "C" fn(
        ctx: De265Context,
        data: *const c_void,
        length: c_int,
        pts: De265Pts,
        user_data: *mut c_void,
    ) -> De265Error,
    pub de265_push_end_of_NAL: unsafe extern "C" fn(ctx: De265Context),
    pub de265_flush_data: unsafe extern "C" fn(ctx: De265Context) -> De265Error,

    pub de265_decode: unsafe extern "C" fn(ctx: De265Context, more: *mut c_int) -> De265Error,
    pub de265_reset: unsafe extern "C" fn(ctx: De265Context),
    pub de265_get_next_picture: unsafe extern "C" fn(ctx: De265Context) -> De265ImagePtr,

    pub de265_get_image_width: unsafe extern "C" fn(img: De265ImagePtr, channel: c_int) -> c_int,
    pub de265_get_image_height: unsafe extern "C" fn(img: De265ImagePtr, channel: c_int) -> c_int,
    pub de265_get_chroma_format: unsafe extern "C" fn(img: De265ImagePtr) -> c_int,
    pub de265_get_image_plane: unsafe extern "C" fn(
        img: De265ImagePtr,
        channel: c_int,
        out_stride: *mut c_int,
    ) -> *const u8,
    pub de265_get_image_PTS: unsafe extern "C" fn(img: De265ImagePtr) -> De265Pts,
}

impl std::fmt::Debug for De265Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("De265Api").field("loaded", &true).finish()
    }
}

// ---------------------------------------------------------------------------
// Dynamic library wrapper
// ---------------------------------------------------------------------------

/// Dynamically loaded libde265 with its function table.
pub struct De265Library {
    /// The loaded library handle; must outlive every call through `api`.
    _lib: Library,
    pub api: De265Api,
}

// SAFETY: the function pointers are plain C entry points; libde265 keeps no
// global mutable state outside decoder contexts, and each context is used by
// one engine at a time.
unsafe impl Send for De265Library {}
unsafe impl Sync for De265Library {}

impl std::fmt::Debug for De265Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("De265Library")
            .field("version", &self.version())
            .finish()
    }
}

impl De265Library {
    /// Load libde265 from the default system search path.
    pub fn load() -> Result<Self, De265LoadError> {
        let lib_name = Self::library_name();
        info!(library = %lib_name, "Loading libde265");

        // SAFETY: loading a well-known system library whose initializers only
        // set up decoder tables.
        let lib = unsafe { Library::new(lib_name) }.map_err(|e| {
            De265LoadError::LibraryNotFound(format!(
                "Failed to load {lib_name}: {e}. Is libde265 installed?"
            ))
        })?;

        Self::load_functions(lib)
    }

    /// Load from a specific path (non-standard installs, bundled builds).
    pub fn load_from(path: &Path) -> Result<Self, De265LoadError> {
        info!(path = %path.display(), "Loading libde265 from custom path");

        // SAFETY: the caller asserts this is a libde265 build.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            De265LoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display()))
        })?;

        Self::load_functions(lib)
    }

    fn load_functions(lib: Library) -> Result<Self, De265LoadError> {
        // SAFETY: every lookup below names a public libde265 function and the
        // field it is stored in has the signature from `de265.h`. `_lib` keeps
        // the library mapped for as long as the pointers live.
        let api = unsafe {
            De265Api {
                de265_get_version: symbol(&lib, "de265_get_version")?,
                de265_get_error_text: symbol(&lib, "de265_get_error_text")?,
                de265_new_decoder: symbol(&lib, "de265_new_decoder")?,
                de265_start_worker_threads: symbol(&lib, "de265_start_worker_threads")?,
                de265_free_decoder: symbol(&lib, "de265_free_decoder")?,
                de265_push_data: symbol(&lib, "de265_push_data")?,
                de265_push_NAL: symbol(&lib, "de265_push_NAL")?,
                de265_push_end_of_NAL: symbol(&lib, "de265_push_end_of_NAL")?,
                de265_flush_data: symbol(&lib, "de265_flush_data")?,
                de265_decode: symbol(&lib, "de265_decode")?,
                de265_reset: symbol(&lib, "de265_reset")?,
                de265_get_next_picture: symbol(&lib, "de265_get_next_picture")?,
                de265_get_image_width: symbol(&lib, "de265_get_image_width")?,
                de265_get_image_height: symbol(&lib, "de265_get_image_height")?,
                de265_get_chroma_format: symbol(&lib, "de265_get_chroma_format")?,
                de265_get_image_plane: symbol(&lib, "de265_get_image_plane")?,
                de265_get_image_PTS: symbol(&lib, "de265_get_image_PTS")?,
            }
        };

        debug!("All libde265 symbols loaded successfully");
        Ok(Self { _lib: lib, api })
    }

    /// Library version string, e.g. "1.0.15".
    pub fn version(&self) -> String {
        // SAFETY: returns a pointer to a static string or null.
        let ptr = unsafe { (self.api.de265_get_version)() };
        c_string(ptr).unwrap_or_else(|| "unknown".to_string())
    }

    /// Human-readable text for a status code.
    pub fn error_text(&self, status: De265Error) -> String {
        // SAFETY: returns a pointer to a static string or null for any code.
        let ptr = unsafe { (self.api.de265_get_error_text)(status) };
        c_string(ptr).unwrap_or_else(|| de265_status_name(status).to_string())
    }

    /// Get the platform-specific library filename.
    fn library_name() -> &'static str {
        if cfg!(target_os = "windows") {
            "libde265.dll"
        } else if cfg!(target_os = "macos") {
            "libde265.0.dylib"
        } else {
            "libde265.so.0"
        }
    }
}

/// Look up `name` and copy out the raw function pointer.
///
/// # Safety
/// `T` must be the exact C signature of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, De265LoadError> {
    let symbol_name = format!("{name}\0");
    // SAFETY: upheld by the caller.
    unsafe { lib.get::<T>(symbol_name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|e| De265LoadError::SymbolNotFound(format!("{name}: {e}")))
}

/// Copy a NUL-terminated C string owned by the library.
fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointers passed here come from libde265 and point at
    // static NUL-terminated strings.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Fallback name for a status code when the library gives no text.
pub fn de265_status_name(status: De265Error) -> &'static str {
    match status {
        0 => "DE265_OK",
        1 => "DE265_ERROR_NO_SUCH_FILE",
        4 => "DE265_ERROR_COEFFICIENT_OUT_OF_IMAGE_BOUNDS",
        5 => "DE265_ERROR_CHECKSUM_MISMATCH",
        6 => "DE265_ERROR_CTB_OUTSIDE_IMAGE_AREA",
        7 => "DE265_ERROR_OUT_OF_MEMORY",
        8 => "DE265_ERROR_CODED_PARAMETER_OUT_OF_RANGE",
        9 => "DE265_ERROR_IMAGE_BUFFER_FULL",
        10 => "DE265_ERROR_CANNOT_START_THREADPOOL",
        11 => "DE265_ERROR_LIBRARY_INITIALIZATION_FAILED",
        12 => "DE265_ERROR_LIBRARY_NOT_INITIALIZED",
        13 => "DE265_ERROR_WAITING_FOR_INPUT_DATA",
        14 => "DE265_ERROR_CANNOT_PROCESS_SEI",
        15 => "DE265_ERROR_PARAMETER_PARSING",
        16 => "DE265_ERROR_NO_INITIAL_SLICE_HEADER",
        17 => "DE265_ERROR_PREMATURE_END_OF_SLICE",
        18 => "DE265_ERROR_UNSPECIFIED_DECODING_ERROR",
        502 => "DE265_ERROR_NOT_IMPLEMENTED_YET",
        s if s >= DE265_FIRST_WARNING => "DE265_WARNING",
        _ => "DE265_ERROR_UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_count_as_ok() {
        assert!(status_is_ok(DE265_OK));
        assert!(status_is_ok(1000));
        assert!(status_is_ok(1025));
        assert!(!status_is_ok(DE265_ERROR_OUT_OF_MEMORY));
        assert!(!status_is_ok(DE265_ERROR_WAITING_FOR_INPUT_DATA));
        assert!(!status_is_ok(-1));
    }

    #[test]
    fn status_names() {
        assert_eq!(de265_status_name(9), "DE265_ERROR_IMAGE_BUFFER_FULL");
        assert_eq!(de265_status_name(1003), "DE265_WARNING");
        assert_eq!(de265_status_name(99), "DE265_ERROR_UNKNOWN");
    }

    #[test]
    fn library_name_is_platform_specific() {
        let name = De265Library::library_name();
        assert!(name.contains("de265"));
    }

    #[test]
    #[ignore = "requires libde265"]
    fn load_system_library() {
        let lib = De265Library::load().expect("libde265 should load");
        assert!(!lib.version().is_empty());
        assert_eq!(lib.error_text(DE265_OK), "no error");
    }
}
