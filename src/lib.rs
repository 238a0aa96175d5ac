//! Password-protected export blobs.
//!
//! An export derives a key from the password with PBKDF2, XORs the payload
//! with an HMAC keystream, tags the result and encodes everything as a
//! single URL-safe string:
//!
//! ```no_run
//! let text = pwexport::export("correct horse battery staple", b"payload")?;
//! let plaintext = pwexport::import("correct horse battery staple", &text)?;
//! assert_eq!(&plaintext[..], b"payload");
//! # Ok::<(), pwexport::ExportError>(())
//! ```

pub mod codec;
pub mod crypto;
mod error;
pub mod format;
pub mod pipeline;
pub mod storage;

use std::sync::Arc;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::codec::bytes_to_text;
pub use crate::crypto::{AlgorithmId, BackendKind, HashFunction, KdfBackend};
pub use crate::error::{ExportError, Result};
pub use crate::format::ExportBlob;
pub use crate::pipeline::{ExportJob, ExportState, ImportJob, ImportState};
pub use crate::storage::Storage;

/// Settings for an [`Exporter`].
#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    /// Algorithm used for new exports. Imports follow the blob.
    pub algorithm: AlgorithmId,
    pub backend: BackendKind,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmId::CURRENT,
            backend: BackendKind::preferred(),
        }
    }
}

pub struct Exporter {
    algorithm: AlgorithmId,
    backend: Arc<dyn KdfBackend>,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Result<Self> {
        Self::with_backend(config.algorithm, config.backend.backend()?)
    }

    /// Fails early if `algorithm` is not registered.
    pub fn with_backend(algorithm: AlgorithmId, backend: Arc<dyn KdfBackend>) -> Result<Self> {
        algorithm.resolve()?;
        Ok(Self { algorithm, backend })
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn export(&self, password: &str, plaintext: &[u8]) -> Result<String> {
        ExportJob::new(self.backend.as_ref(), self.algorithm).run(password, plaintext)
    }

    pub fn import(&self, password: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
        ImportJob::new(self.backend.as_ref()).run(password, text)
    }

    pub fn export_text(&self, password: &str, plaintext: &str) -> Result<String> {
        self.export(password, &codec::text_to_bytes(plaintext))
    }

    /// Like [`Exporter::import`], but the payload must be UTF-8.
    pub fn import_text(&self, password: &str, text: &str) -> Result<Zeroizing<String>> {
        let plaintext = self.import(password, text)?;
        Ok(Zeroizing::new(bytes_to_text(&plaintext)?))
    }
}

impl Default for Exporter {
    fn default() -> Self {
        let backend = BackendKind::preferred()
            .backend()
            .unwrap_or_else(|_| Arc::new(crypto::PortableKdf) as Arc<dyn KdfBackend>);

        Self {
            algorithm: AlgorithmId::CURRENT,
            backend,
        }
    }
}

/// Export with the default configuration.
pub fn export(password: &str, plaintext: &[u8]) -> Result<String> {
    Exporter::default().export(password, plaintext)
}

/// Import with the default configuration.
pub fn import(password: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
    Exporter::default().import(password, text)
}

/// Non-secret header fields of an export, readable without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobSummary {
    pub format_version: u8,
    pub algorithm: AlgorithmId,
    pub algorithm_known: bool,
    pub hash: Option<HashFunction>,
    pub iterations: Option<u32>,
    pub derived_key_len: Option<usize>,
    pub salt_len: usize,
    pub ciphertext_len: usize,
    pub tag_len: usize,
}

pub fn inspect(text: &str) -> Result<BlobSummary> {
    let blob = ExportBlob::from_text(text)?;
    let params = blob.algorithm().resolve().ok();

    Ok(BlobSummary {
        format_version: blob.version(),
        algorithm: blob.algorithm(),
        algorithm_known: params.is_some(),
        hash: params.map(|p| p.hash()),
        iterations: params.map(|p| p.iterations()),
        derived_key_len: params.map(|p| p.derived_key_len()),
        salt_len: blob.salt().len(),
        ciphertext_len: blob.ciphertext().len(),
        tag_len: blob.tag().len(),
    })
}
