//! Algorithm registry.
//!
//! Every id that has ever been written into an export blob must stay in
//! [`REGISTRY`] with exactly the same parameters, otherwise old exports can
//! no longer be opened. New parameter sets get a new id appended at the end.

use serde::Serialize;

use crate::error::{ExportError, Result};

/// Hash function used for HMAC, PBKDF2 and the keystream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashFunction {
    Sha256,
    Sha512,
}

impl HashFunction {
    /// Output length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            HashFunction::Sha256 => 32,
            HashFunction::Sha512 => 64,
        }
    }
}

/// Identifier stored in every blob that selects its KDF parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AlgorithmId(pub u8);

impl AlgorithmId {
    /// PBKDF2-HMAC-SHA512, 1000 rounds, 64-byte key.
    pub const PBKDF2_SHA512_1000: AlgorithmId = AlgorithmId(0);

    /// Id used for new exports.
    pub const CURRENT: AlgorithmId = AlgorithmId::PBKDF2_SHA512_1000;

    pub fn resolve(self) -> Result<&'static AlgorithmParams> {
        resolve(self)
    }
}

impl std::fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmParams {
    hash: HashFunction,
    iterations: u32,
    derived_key_len: usize,
}

impl AlgorithmParams {
    pub const fn new(hash: HashFunction, iterations: u32, derived_key_len: usize) -> Self {
        Self {
            hash,
            iterations,
            derived_key_len,
        }
    }

    pub fn hash(&self) -> HashFunction {
        self.hash
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn derived_key_len(&self) -> usize {
        self.derived_key_len
    }
}

// Append only. Never edit or remove an entry.
const REGISTRY: &[(AlgorithmId, AlgorithmParams)] = &[(
    AlgorithmId::PBKDF2_SHA512_1000,
    AlgorithmParams::new(HashFunction::Sha512, 1000, 64),
)];

/// Look up the parameters for `id`, failing closed on unknown ids.
pub fn resolve(id: AlgorithmId) -> Result<&'static AlgorithmParams> {
    REGISTRY
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, params)| params)
        .ok_or(ExportError::UnknownAlgorithm(id.0))
}

/// All registered algorithms in id order.
pub fn algorithms() -> impl Iterator<Item = (AlgorithmId, &'static AlgorithmParams)> {
    REGISTRY.iter().map(|(id, params)| (*id, params))
}
