//! Blob format v1.
//!
//! V1 layout (integers little-endian):
//! ```text
//! VERSION (1) | ALGORITHM (1) | SALT_LEN (1) | SALT | CT_LEN (4) | CIPHERTEXT | TAG_LEN (1) | TAG
//! ```
//! The tag covers every byte before TAG_LEN. The keystream and key split
//! that go with this version are defined in `crypto::stream` and
//! `DerivedKey::split`.

use super::{ExportBlob, VER_LEN};
use crate::crypto::AlgorithmId;
use crate::error::{ExportError, Result};

pub const VERSION_V1: u8 = 1;

const ALG_LEN: usize = 1;
const SALT_LEN_LEN: usize = 1;
const CT_LEN_LEN: usize = 4;
const TAG_LEN_LEN: usize = 1;

const MIN_LEN: usize = VER_LEN + ALG_LEN + SALT_LEN_LEN + CT_LEN_LEN + TAG_LEN_LEN;

/// Serializes the authenticated prefix: everything up to the tag.
pub fn authenticated_bytes(
    algorithm: AlgorithmId,
    salt: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let salt_len = u8::try_from(salt.len()).map_err(|_| ExportError::TooLarge(salt.len()))?;
    let ct_len =
        u32::try_from(ciphertext.len()).map_err(|_| ExportError::TooLarge(ciphertext.len()))?;

    let mut buf = Vec::with_capacity(MIN_LEN + salt.len() + ciphertext.len());

    buf.push(VERSION_V1);
    buf.push(algorithm.0);

    buf.push(salt_len);
    buf.extend_from_slice(salt);

    buf.extend_from_slice(&ct_len.to_le_bytes());
    buf.extend_from_slice(ciphertext);

    Ok(buf)
}

/// Serializes a v1 blob.
///
/// # Errors
///
/// Returns an error if the blob is not v1 or a field overflows its length
/// prefix.
pub fn serialize(blob: &ExportBlob) -> Result<Vec<u8>> {
    if blob.version() != VERSION_V1 {
        return Err(ExportError::Decode(
            "wrong version for v1 serializer".to_string(),
        ));
    }

    let tag_len =
        u8::try_from(blob.tag().len()).map_err(|_| ExportError::TooLarge(blob.tag().len()))?;

    let mut buf = authenticated_bytes(blob.algorithm(), blob.salt(), blob.ciphertext())?;
    buf.push(tag_len);
    buf.extend_from_slice(blob.tag());

    Ok(buf)
}

fn take<'a>(data: &'a [u8], offset: &mut usize, len: usize, field: &str) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| ExportError::Decode(format!("truncated {field}")))?;

    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}

/// Parses a v1 blob.
///
/// The algorithm id is not resolved here; that happens before derivation.
///
/// # Errors
///
/// Returns [`ExportError::Decode`] on truncated fields, an empty salt or
/// trailing bytes.
pub fn parse(data: &[u8]) -> Result<ExportBlob> {
    if data.len() < MIN_LEN {
        return Err(ExportError::Decode("blob too short for v1".to_string()));
    }

    let mut offset = VER_LEN;

    let algorithm = AlgorithmId(take(data, &mut offset, ALG_LEN, "algorithm")?[0]);

    let salt_len = take(data, &mut offset, SALT_LEN_LEN, "salt length")?[0] as usize;
    if salt_len == 0 {
        return Err(ExportError::Decode("empty salt".to_string()));
    }
    let salt = take(data, &mut offset, salt_len, "salt")?.to_vec();

    let ct_len = u32::from_le_bytes(
        take(data, &mut offset, CT_LEN_LEN, "ciphertext length")?
            .try_into()
            .map_err(|_| ExportError::Decode("truncated ciphertext length".to_string()))?,
    ) as usize;
    let ciphertext = take(data, &mut offset, ct_len, "ciphertext")?.to_vec();

    let tag_len = take(data, &mut offset, TAG_LEN_LEN, "tag length")?[0] as usize;
    let tag = take(data, &mut offset, tag_len, "tag")?.to_vec();

    if offset != data.len() {
        return Err(ExportError::Decode(format!(
            "{} trailing bytes",
            data.len() - offset
        )));
    }

    Ok(ExportBlob::new(algorithm, salt, ciphertext, tag))
}
