use crate::error::{ExportError, Result};

/// XOR two equal-length byte arrays.
///
/// XOR is its own inverse, so the same call encrypts and decrypts.
pub fn xor(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(ExportError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}
