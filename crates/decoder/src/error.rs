//! Decoder-specific error types.
//!
//! These cover loading the engine library. Everything a session reports at
//! runtime uses the common errors in `hs-common`.

use thiserror::Error;

/// Errors that can occur when loading the libde265 library.
#[derive(Debug, Error)]
pub enum De265LoadError {
    #[error("libde265 library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_display() {
        let err = De265LoadError::LibraryNotFound("libde265.so.0".to_string());
        assert!(err.to_string().contains("libde265.so.0"));

        let err = De265LoadError::SymbolNotFound("de265_decode".to_string());
        assert_eq!(err.to_string(), "Required symbol not found: de265_decode");
    }
}
