//! HMAC computation and verification.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use super::registry::HashFunction;
use crate::error::{ExportError, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

fn keyed<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<M> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| ExportError::Derivation(e.to_string()))?;
    mac.update(message);
    Ok(mac)
}

/// Compute `HMAC(hash, key, message)`.
pub fn hmac(hash: HashFunction, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let tag = match hash {
        HashFunction::Sha256 => keyed::<HmacSha256>(key, message)?
            .finalize()
            .into_bytes()
            .to_vec(),
        HashFunction::Sha512 => keyed::<HmacSha512>(key, message)?
            .finalize()
            .into_bytes()
            .to_vec(),
    };
    Ok(tag)
}

/// Recompute the tag and compare it with `expected` in constant time.
///
/// A tag of the wrong length never verifies.
pub fn verify(hash: HashFunction, key: &[u8], message: &[u8], expected: &[u8]) -> Result<bool> {
    let ok = match hash {
        HashFunction::Sha256 => keyed::<HmacSha256>(key, message)?
            .verify_slice(expected)
            .is_ok(),
        HashFunction::Sha512 => keyed::<HmacSha512>(key, message)?
            .verify_slice(expected)
            .is_ok(),
    };
    Ok(ok)
}
