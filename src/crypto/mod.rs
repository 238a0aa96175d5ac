//! Cryptographic primitives for export blobs.
//!
//! Provides the algorithm registry, key derivation, keystream, XOR transform
//! and HMAC integrity checks. Nothing in here touches I/O.

pub mod kdf;
pub mod mac;
pub mod registry;
pub mod stream;
pub mod xor;

#[cfg(feature = "native-kdf")]
pub use kdf::NativeKdf;
pub use kdf::{
    BackendKind, DerivedKey, KdfBackend, PendingKey, PortableKdf, derive_key, spawn_derivation,
};
pub use mac::{hmac, verify};
pub use registry::{AlgorithmId, AlgorithmParams, HashFunction, algorithms, resolve};
pub use stream::keystream;
pub use xor::xor;

use crate::error::{ExportError, Result};
use getrandom::fill;

/// Length of the per-export salt (32 bytes).
pub const SALT_LEN: usize = 32;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| ExportError::Random)
}

/// Generate a fresh salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}
