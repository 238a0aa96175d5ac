//! Binary <-> text conversions.
//!
//! Export blobs travel as URL-safe Base64 without padding so they can be
//! pasted into a URL, a query string or a file without escaping.

use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{ExportError, Result};

/// Encode bytes as URL-safe Base64 (`-` and `_`, no trailing `=`).
pub fn bytes_to_url_safe_text(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

// Unused low bits of the last character are ignored, as a padded
// standard decoder would.
const URL_SAFE_LENIENT: GeneralPurpose =
    GeneralPurpose::new(&URL_SAFE, NO_PAD.with_decode_allow_trailing_bits(true));

/// Decode URL-safe Base64 without padding.
///
/// The implied padding is reconstructed by the engine. Only characters
/// outside the URL-safe alphabet (padding, whitespace, `+`, `/`) and lengths
/// no padding could explain (`len % 4 == 1`) are rejected.
pub fn url_safe_text_to_bytes(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(text)
        .map_err(|e| ExportError::Decode(e.to_string()))
}

pub fn text_to_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decode UTF-8, failing on malformed sequences.
pub fn bytes_to_text(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ExportError::Encoding)
}
