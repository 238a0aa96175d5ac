//! Export blob format.
//!
//! Provides version-aware parsing and serialization of the binary blob and
//! its URL-safe text form.

use crate::codec::{bytes_to_url_safe_text, url_safe_text_to_bytes};
use crate::crypto::AlgorithmId;
use crate::error::{ExportError, Result};

pub mod v1;

/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest format version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

/// A parsed or freshly sealed export blob.
///
/// Holds everything needed to re-derive the key and check the tag. None of
/// it is secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBlob {
    version: u8,
    algorithm: AlgorithmId,
    salt: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl ExportBlob {
    pub(crate) fn new(
        algorithm: AlgorithmId,
        salt: Vec<u8>,
        ciphertext: Vec<u8>,
        tag: Vec<u8>,
    ) -> Self {
        Self {
            version: CURRENT_VERSION,
            algorithm,
            salt,
            ciphertext,
            tag,
        }
    }

    /// Builds a blob at the current version, computing its tag with `sign`
    /// over the authenticated bytes.
    pub fn seal(
        algorithm: AlgorithmId,
        salt: Vec<u8>,
        ciphertext: Vec<u8>,
        sign: impl FnOnce(&[u8]) -> Result<Vec<u8>>,
    ) -> Result<Self> {
        let authenticated = v1::authenticated_bytes(algorithm, &salt, &ciphertext)?;
        let tag = sign(&authenticated)?;
        Ok(Self::new(algorithm, salt, ciphertext, tag))
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    /// Bytes covered by the integrity tag.
    pub fn authenticated_bytes(&self) -> Result<Vec<u8>> {
        match self.version {
            1 => v1::authenticated_bytes(self.algorithm, &self.salt, &self.ciphertext),
            v => Err(unsupported(v)),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(bytes_to_url_safe_text(&serialize(self)?))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        parse(&url_safe_text_to_bytes(text)?)
    }
}

fn unsupported(version: u8) -> ExportError {
    ExportError::Decode(format!("unsupported format version: {version}"))
}

/// Parses a binary blob, dispatching on its version byte.
///
/// # Errors
///
/// Returns [`ExportError::Decode`] if the data is empty, the version is
/// unknown or the version-specific layout does not match.
pub fn parse(data: &[u8]) -> Result<ExportBlob> {
    if data.len() < VER_LEN {
        return Err(ExportError::Decode("blob is empty".to_string()));
    }

    match data[0] {
        1 => v1::parse(data),
        v => Err(unsupported(v)),
    }
}

/// Serializes a blob in the layout of its own version.
pub fn serialize(blob: &ExportBlob) -> Result<Vec<u8>> {
    match blob.version() {
        1 => v1::serialize(blob),
        v => Err(unsupported(v)),
    }
}
