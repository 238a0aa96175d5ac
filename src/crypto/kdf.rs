//! PBKDF2 key derivation with interchangeable backends.
//!
//! [`NativeKdf`] delegates to the RustCrypto `pbkdf2` crate and is compiled
//! in by the `native-kdf` feature. [`PortableKdf`] is a self-contained PBKDF2
//! loop over `hmac` and is always available. Both must produce the same bytes
//! for the same input; exports written with one are imported with the other.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::registry::{AlgorithmId, AlgorithmParams, HashFunction};
use crate::error::{ExportError, Result};

/// Key material produced by a derivation. Wiped on drop.
pub struct DerivedKey(Zeroizing<Vec<u8>>);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into `(encryption_key, mac_key)` halves.
    pub fn split(&self) -> (&[u8], &[u8]) {
        self.0.split_at(self.0.len() / 2)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED; {}])", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Portable,
}

impl BackendKind {
    /// Native when compiled in, portable otherwise.
    pub fn preferred() -> Self {
        if cfg!(feature = "native-kdf") {
            BackendKind::Native
        } else {
            BackendKind::Portable
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Native => cfg!(feature = "native-kdf"),
            BackendKind::Portable => true,
        }
    }

    pub fn backend(self) -> Result<Arc<dyn KdfBackend>> {
        match self {
            #[cfg(feature = "native-kdf")]
            BackendKind::Native => Ok(Arc::new(NativeKdf)),
            #[cfg(not(feature = "native-kdf"))]
            BackendKind::Native => Err(ExportError::Derivation(
                "native backend not compiled in".to_string(),
            )),
            BackendKind::Portable => Ok(Arc::new(PortableKdf)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => f.write_str("native"),
            BackendKind::Portable => f.write_str("portable"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "portable" => Ok(BackendKind::Portable),
            other => Err(format!("unknown backend '{other}' (expected native or portable)")),
        }
    }
}

/// A PBKDF2 implementation.
pub trait KdfBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fill `out` with PBKDF2(`hash`, `password`, `salt`, `iterations`).
    ///
    /// Parameters have already been checked by [`derive_key`].
    fn pbkdf2(
        &self,
        hash: HashFunction,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<()>;
}

#[cfg(feature = "native-kdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKdf;

#[cfg(feature = "native-kdf")]
impl KdfBackend for NativeKdf {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn pbkdf2(
        &self,
        hash: HashFunction,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<()> {
        match hash {
            HashFunction::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, out),
            HashFunction::Sha512 => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, out),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortableKdf;

impl KdfBackend for PortableKdf {
    fn kind(&self) -> BackendKind {
        BackendKind::Portable
    }

    fn pbkdf2(
        &self,
        hash: HashFunction,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<()> {
        match hash {
            HashFunction::Sha256 => pbkdf2_blocks::<Hmac<Sha256>>(password, salt, iterations, out),
            HashFunction::Sha512 => pbkdf2_blocks::<Hmac<Sha512>>(password, salt, iterations, out),
        }
    }
}

/// RFC 8018 section 5.2: `T_i = U_1 ^ U_2 ^ ... ^ U_c` with
/// `U_1 = PRF(P, S || INT_BE(i))` and `U_j = PRF(P, U_{j-1})`.
fn pbkdf2_blocks<M>(password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) -> Result<()>
where
    M: Mac + KeyInit + Clone,
{
    let prf = <M as Mac>::new_from_slice(password)
        .map_err(|e| ExportError::Derivation(e.to_string()))?;
    let block_len = <M as hmac::digest::OutputSizeUser>::output_size();

    for (index, block) in out.chunks_mut(block_len).enumerate() {
        let counter = u32::try_from(index + 1)
            .map_err(|_| ExportError::Derivation("derived key too long".to_string()))?;

        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&counter.to_be_bytes());
        let mut u = mac.finalize().into_bytes();
        let mut t = u.clone();

        for _ in 1..iterations {
            let mut mac = prf.clone();
            mac.update(&u);
            u = mac.finalize().into_bytes();
            t.iter_mut().zip(u.iter()).for_each(|(t, u)| *t ^= u);
        }

        block.copy_from_slice(&t[..block.len()]);
        u.as_mut_slice().zeroize();
        t.as_mut_slice().zeroize();
    }

    Ok(())
}

fn validate(params: &AlgorithmParams, salt: &[u8]) -> Result<()> {
    if params.iterations() < 1 {
        return Err(ExportError::Derivation(
            "iteration count must be >= 1".to_string(),
        ));
    }
    if params.derived_key_len() == 0 {
        return Err(ExportError::Derivation(
            "derived key length must be >= 1".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(ExportError::Derivation("salt must not be empty".to_string()));
    }
    Ok(())
}

/// Derive the key for `algorithm` from `password` and `salt`.
///
/// Unknown algorithm ids fail before any work is done.
pub fn derive_key(
    backend: &dyn KdfBackend,
    algorithm: AlgorithmId,
    salt: &[u8],
    password: &[u8],
) -> Result<DerivedKey> {
    let params = algorithm.resolve()?;
    derive_with_params(backend, params, salt, password)
}

pub(crate) fn derive_with_params(
    backend: &dyn KdfBackend,
    params: &AlgorithmParams,
    salt: &[u8],
    password: &[u8],
) -> Result<DerivedKey> {
    validate(params, salt)?;

    debug!(
        backend = %backend.kind(),
        hash = ?params.hash(),
        iterations = params.iterations(),
        key_len = params.derived_key_len(),
        "deriving key"
    );

    let mut key = Zeroizing::new(vec![0u8; params.derived_key_len()]);
    backend.pbkdf2(params.hash(), password, salt, params.iterations(), &mut key)?;
    Ok(DerivedKey(key))
}

/// A derivation running on a worker thread.
///
/// Dropping the handle discards the result; the worker still runs to
/// completion and wipes its copy of the password.
pub struct PendingKey {
    rx: Receiver<Result<DerivedKey>>,
}

impl PendingKey {
    /// Block until the derivation completes.
    pub fn wait(self) -> Result<DerivedKey> {
        self.rx.recv().map_err(|_| worker_gone())?
    }

    /// Return the result if it is ready, without blocking.
    pub fn try_take(&self) -> Option<Result<DerivedKey>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }
}

fn worker_gone() -> ExportError {
    ExportError::Derivation("derivation worker exited without a result".to_string())
}

/// Start a derivation off the calling thread.
pub fn spawn_derivation(
    backend: Arc<dyn KdfBackend>,
    algorithm: AlgorithmId,
    salt: Vec<u8>,
    password: Zeroizing<Vec<u8>>,
) -> PendingKey {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let result = derive_key(backend.as_ref(), algorithm, &salt, &password);
        drop(password);
        // receiver may be gone; the result is discarded then
        let _ = tx.send(result);
    });

    PendingKey { rx }
}
