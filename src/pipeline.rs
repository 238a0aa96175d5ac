//! Export and import state machines.
//!
//! Export: `Idle -> DerivingKey -> Transforming -> Tagging -> Encoded`.
//! Import: `Idle -> Decoding -> DerivingKey -> Verifying -> Transformed`,
//! or `Rejected` from any step when something fails. A rejected import
//! never hands out plaintext.

use tracing::debug;
use zeroize::Zeroizing;

use crate::codec::text_to_bytes;
use crate::crypto::{self, AlgorithmId, KdfBackend, derive_key, hmac, keystream, verify, xor};
use crate::error::{ExportError, Result};
use crate::format::ExportBlob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    DerivingKey,
    Transforming,
    Tagging,
    Encoded,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        self == ExportState::Encoded
    }

    fn can_advance_to(self, next: ExportState) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Idle, DerivingKey)
                | (DerivingKey, Transforming)
                | (Transforming, Tagging)
                | (Tagging, Encoded)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    Decoding,
    DerivingKey,
    Verifying,
    Transformed,
    Rejected,
}

impl ImportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ImportState::Transformed | ImportState::Rejected)
    }

    fn can_advance_to(self, next: ImportState) -> bool {
        use ImportState::*;
        match (self, next) {
            (Idle, Decoding)
            | (Decoding, DerivingKey)
            | (DerivingKey, Verifying)
            | (Verifying, Transformed) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One export operation. Single use.
pub struct ExportJob<'a> {
    backend: &'a dyn KdfBackend,
    algorithm: AlgorithmId,
    state: ExportState,
}

impl<'a> ExportJob<'a> {
    pub fn new(backend: &'a dyn KdfBackend, algorithm: AlgorithmId) -> Self {
        Self {
            backend,
            algorithm,
            state: ExportState::Idle,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    fn advance(&mut self, next: ExportState) {
        assert!(
            self.state.can_advance_to(next),
            "illegal export transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Encrypt `plaintext` under `password` with a fresh salt.
    pub fn run(&mut self, password: &str, plaintext: &[u8]) -> Result<String> {
        let salt = crypto::generate_salt()?;
        self.run_with_salt(password, plaintext, salt.to_vec())
    }

    pub(crate) fn run_with_salt(
        &mut self,
        password: &str,
        plaintext: &[u8],
        salt: Vec<u8>,
    ) -> Result<String> {
        if u32::try_from(plaintext.len()).is_err() {
            return Err(ExportError::TooLarge(plaintext.len()));
        }

        self.advance(ExportState::DerivingKey);
        let params = self.algorithm.resolve()?;
        let password = Zeroizing::new(text_to_bytes(password));
        let key = derive_key(self.backend, self.algorithm, &salt, &password)?;
        drop(password);

        self.advance(ExportState::Transforming);
        let (enc_key, mac_key) = key.split();
        let stream = keystream(params.hash(), enc_key, plaintext.len())?;
        let ciphertext = xor(plaintext, &stream)?;

        self.advance(ExportState::Tagging);
        let blob = ExportBlob::seal(self.algorithm, salt, ciphertext, |data| {
            hmac(params.hash(), mac_key, data)
        })?;
        let text = blob.to_text()?;

        self.advance(ExportState::Encoded);
        debug!(
            algorithm = %self.algorithm,
            backend = %self.backend.kind(),
            plaintext_len = plaintext.len(),
            text_len = text.len(),
            "export encoded"
        );

        Ok(text)
    }
}

/// One import operation. Single use.
pub struct ImportJob<'a> {
    backend: &'a dyn KdfBackend,
    state: ImportState,
}

impl<'a> ImportJob<'a> {
    pub fn new(backend: &'a dyn KdfBackend) -> Self {
        Self {
            backend,
            state: ImportState::Idle,
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    fn advance(&mut self, next: ImportState) {
        assert!(
            self.state.can_advance_to(next),
            "illegal import transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Decode, verify and decrypt `text`.
    ///
    /// Any failure moves the job to [`ImportState::Rejected`].
    pub fn run(&mut self, password: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
        match self.run_steps(password, text) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                debug!(failed_in = ?self.state, error = %e, "import rejected");
                self.advance(ImportState::Rejected);
                Err(e)
            }
        }
    }

    fn run_steps(&mut self, password: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.advance(ImportState::Decoding);
        let blob = ExportBlob::from_text(text)?;
        let params = blob.algorithm().resolve()?;

        self.advance(ImportState::DerivingKey);
        let password = Zeroizing::new(text_to_bytes(password));
        let key = derive_key(self.backend, blob.algorithm(), blob.salt(), &password)?;
        drop(password);

        self.advance(ImportState::Verifying);
        let (enc_key, mac_key) = key.split();
        let authenticated = blob.authenticated_bytes()?;
        if !verify(params.hash(), mac_key, &authenticated, blob.tag())? {
            return Err(ExportError::Integrity);
        }

        let stream = keystream(params.hash(), enc_key, blob.ciphertext().len())?;
        let plaintext = Zeroizing::new(xor(blob.ciphertext(), &stream)?);

        self.advance(ImportState::Transformed);
        debug!(
            algorithm = %blob.algorithm(),
            backend = %self.backend.kind(),
            plaintext_len = plaintext.len(),
            "import verified"
        );

        Ok(plaintext)
    }
}
