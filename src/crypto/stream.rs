//! Keystream expansion for format version 1.
//!
//! Block `i` of the keystream is `HMAC(hash, enc_key, u64_le(i))`. Blocks
//! are concatenated and cut to the plaintext length. This layout is part of
//! the v1 blob format and must not change.

use zeroize::{Zeroize, Zeroizing};

use super::mac::hmac;
use super::registry::HashFunction;
use crate::error::Result;

pub fn keystream(hash: HashFunction, enc_key: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut stream = Zeroizing::new(Vec::with_capacity(len));
    let mut counter: u64 = 0;

    while stream.len() < len {
        let mut block = hmac(hash, enc_key, &counter.to_le_bytes())?;
        let take = block.len().min(len - stream.len());
        stream.extend_from_slice(&block[..take]);
        block.zeroize();
        counter += 1;
    }

    Ok(stream)
}
