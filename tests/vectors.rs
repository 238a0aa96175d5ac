//! Fixed vectors that pin the wire format. Changing any of these breaks
//! every export already written.

use std::sync::Arc;

use pwexport::codec::{bytes_to_url_safe_text, url_safe_text_to_bytes};
use pwexport::crypto::{
    self, AlgorithmId, BackendKind, HashFunction, KdfBackend, PortableKdf, derive_key, hmac,
    spawn_derivation, verify, xor,
};
use pwexport::{ExportError, ExportJob, Exporter, ImportJob, ImportState, format};
use zeroize::Zeroizing;

const PASSWORD: &str = "correct horse battery staple";

const SALT: [u8; 32] = [
    249, 222, 39, 45, 138, 76, 162, 1, 58, 133, 114, 25, 155, 230, 53, 69, 70, 86, 71, 13, 67, 20,
    31, 114, 54, 212, 140, 210, 73, 113, 159, 42,
];

const DERIVED: [u8; 64] = [
    48, 187, 136, 114, 157, 183, 46, 234, 79, 28, 129, 167, 193, 163, 64, 247, 225, 177, 128, 107,
    165, 148, 22, 244, 105, 58, 92, 117, 51, 64, 167, 48, 170, 18, 86, 112, 231, 115, 99, 59, 58,
    122, 59, 138, 176, 106, 236, 106, 137, 83, 53, 32, 192, 217, 56, 55, 226, 93, 180, 31, 61, 148,
    56, 172,
];

const PAYLOAD: &str = r#"{"entries":[{"name":"github","user":"octocat"},{"name":"mail","user":"me@example.com"}]}"#;

const KNOWN_EXPORT: &str = "AQAg-d4nLYpMogE6hXIZm-Y1RUZWRw1DFB9yNtSM0klxnypYAAAAfBCJEdMyURA8CEmqoE69gqamF0QyCO0BfGslCILdNW8HhE5AyLGjpklJZ4terWJPhSUnjYOrxZmKcxj-ivru-bcgk2UEB5PkfPSmQZgNyY53GQUi3RpunEAVs5dUuUYK7VyqQUPGKGfn3Nco3XZD1UekhSp7_0jV3wg3SkzxdoFxGGiwU9so194wLj1kZOJDrb7rEl_V46RT";

const KNOWN_EMPTY_EXPORT: &str = "AQAg-d4nLYpMogE6hXIZm-Y1RUZWRw1DFB9yNtSM0klxnyoAAAAAQKv31eMfvP5PH5BUXCrR9m1r0-M8zLcac-IJRy4pzPrAVrAoqh4j2ynop6CAMtzmeVG5Oh9CfLQgNGltwGAfemQ";

/// Fails the test if any derivation reaches it.
struct NeverDerives;

impl KdfBackend for NeverDerives {
    fn kind(&self) -> BackendKind {
        BackendKind::Portable
    }

    fn pbkdf2(
        &self,
        _hash: HashFunction,
        _password: &[u8],
        _salt: &[u8],
        _iterations: u32,
        _out: &mut [u8],
    ) -> pwexport::Result<()> {
        panic!("key derivation ran for an unregistered algorithm");
    }
}

fn crafted_blob(algorithm: u8) -> String {
    let mut bytes = vec![1, algorithm, 4, 0xde, 0xad, 0xbe, 0xef];
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.push(0);
    bytes_to_url_safe_text(&bytes)
}

fn backends() -> Vec<Arc<dyn KdfBackend>> {
    [BackendKind::Native, BackendKind::Portable]
        .into_iter()
        .filter(|kind| kind.is_available())
        .map(|kind| kind.backend().unwrap())
        .collect()
}

fn known_blob_bytes() -> Vec<u8> {
    url_safe_text_to_bytes(KNOWN_EXPORT).unwrap()
}

fn import_bytes(bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, ExportError> {
    pwexport::import(PASSWORD, &bytes_to_url_safe_text(bytes))
}

#[test]
fn salt_encodes_to_known_text() {
    assert_eq!(
        bytes_to_url_safe_text(&SALT),
        "-d4nLYpMogE6hXIZm-Y1RUZWRw1DFB9yNtSM0klxnyo"
    );
}

#[test]
fn hmac_sha256_rfc4231_case_2() {
    let tag = hmac(
        HashFunction::Sha256,
        b"Jefe",
        b"what do ya want for nothing?",
    )
    .unwrap();
    assert_eq!(
        hex::encode(&tag),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
    assert!(verify(
        HashFunction::Sha256,
        b"Jefe",
        b"what do ya want for nothing?",
        &tag
    )
    .unwrap());
}

#[test]
fn every_backend_derives_the_known_key() {
    for backend in backends() {
        let key = derive_key(
            backend.as_ref(),
            AlgorithmId::PBKDF2_SHA512_1000,
            &SALT,
            PASSWORD.as_bytes(),
        )
        .unwrap();
        assert_eq!(key.as_bytes(), DERIVED, "backend {}", backend.kind());

        let pending = spawn_derivation(
            backend,
            AlgorithmId::PBKDF2_SHA512_1000,
            SALT.to_vec(),
            Zeroizing::new(PASSWORD.as_bytes().to_vec()),
        );
        assert_eq!(pending.wait().unwrap().as_bytes(), DERIVED);
    }
}

#[test]
fn xor_known_vector() {
    assert_eq!(
        xor(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], &[0, 1, 2, 3, 4, 5, 4, 3, 2, 1]).unwrap(),
        [0, 0, 0, 0, 0, 0, 2, 4, 10, 8]
    );
}

#[test]
fn known_export_imports_on_every_backend() {
    for backend in backends() {
        let exporter = Exporter::with_backend(AlgorithmId::CURRENT, backend).unwrap();
        let plaintext = exporter.import_text(PASSWORD, KNOWN_EXPORT).unwrap();
        assert_eq!(plaintext.as_str(), PAYLOAD);
    }
}

#[test]
fn known_empty_export_imports() {
    let plaintext = pwexport::import(PASSWORD, KNOWN_EMPTY_EXPORT).unwrap();
    assert!(plaintext.is_empty());
}

#[test]
fn known_export_layout() {
    let bytes = known_blob_bytes();
    let blob = format::parse(&bytes).unwrap();

    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[1], 0);
    assert_eq!(bytes[2] as usize, SALT.len());
    assert_eq!(blob.salt(), SALT);
    assert_eq!(blob.ciphertext().len(), PAYLOAD.len());
    assert_eq!(blob.tag().len(), 64);
    assert_eq!(bytes.len(), 3 + 32 + 4 + PAYLOAD.len() + 1 + 64);
    assert_eq!(format::serialize(&blob).unwrap(), bytes);
}

#[test]
fn wrong_password_fails_integrity() {
    assert!(matches!(
        pwexport::import("Correct horse battery staple", KNOWN_EXPORT),
        Err(ExportError::Integrity)
    ));
}

#[test]
fn any_flipped_byte_is_rejected() {
    let bytes = known_blob_bytes();
    // skip version and algorithm, which fail earlier with their own errors
    for index in [2usize, 10, 34, 40, 60, 126, 127, 191] {
        let mut tampered = bytes.clone();
        tampered[index] ^= 0x01;
        match import_bytes(&tampered) {
            Err(ExportError::Integrity) | Err(ExportError::Decode(_)) => {}
            other => panic!("byte {index}: expected rejection, got {other:?}"),
        }
    }
}

#[test]
fn flipped_ciphertext_or_tag_fails_integrity() {
    let bytes = known_blob_bytes();
    let ct_start = 3 + 32 + 4;
    let tag_end = bytes.len() - 1;

    for index in [ct_start, ct_start + 40, tag_end] {
        let mut tampered = bytes.clone();
        tampered[index] ^= 0x80;
        assert!(matches!(
            import_bytes(&tampered),
            Err(ExportError::Integrity)
        ));
    }
}

#[test]
fn truncated_tag_fails() {
    let mut bytes = known_blob_bytes();
    bytes.pop();
    let tag_len_at = bytes.len() - 64;
    bytes[tag_len_at] = 63;

    assert!(matches!(import_bytes(&bytes), Err(ExportError::Integrity)));
}

#[test]
fn unknown_algorithm_id_is_refused() {
    let mut bytes = known_blob_bytes();
    bytes[1] = 9;

    assert!(matches!(
        import_bytes(&bytes),
        Err(ExportError::UnknownAlgorithm(9))
    ));
}

#[test]
fn crafted_blob_with_unknown_algorithm() {
    let text = crafted_blob(42);

    let summary = pwexport::inspect(&text).unwrap();
    assert!(!summary.algorithm_known);
    assert!(matches!(
        pwexport::import(PASSWORD, &text),
        Err(ExportError::UnknownAlgorithm(42))
    ));
}

#[test]
fn unknown_algorithm_never_reaches_the_backend() {
    let mut job = ImportJob::new(&NeverDerives);
    assert!(matches!(
        job.run(PASSWORD, &crafted_blob(42)),
        Err(ExportError::UnknownAlgorithm(42))
    ));
    assert_eq!(job.state(), ImportState::Rejected);

    assert!(matches!(
        ExportJob::new(&NeverDerives, AlgorithmId(42)).run(PASSWORD, b"data"),
        Err(ExportError::UnknownAlgorithm(42))
    ));
    assert!(matches!(
        Exporter::with_backend(AlgorithmId(42), Arc::new(NeverDerives)),
        Err(ExportError::UnknownAlgorithm(42))
    ));

    let pending = spawn_derivation(
        Arc::new(NeverDerives),
        AlgorithmId(42),
        SALT.to_vec(),
        Zeroizing::new(PASSWORD.as_bytes().to_vec()),
    );
    assert!(matches!(
        pending.wait(),
        Err(ExportError::UnknownAlgorithm(42))
    ));
}

#[test]
fn truncated_blobs_fail_to_decode() {
    let bytes = known_blob_bytes();
    for len in [0, 1, 5, 38, 100, bytes.len() - 1] {
        assert!(
            matches!(import_bytes(&bytes[..len]), Err(ExportError::Decode(_))),
            "len {len}"
        );
    }
}

#[test]
fn portable_export_reimports_on_every_backend() {
    let text = Exporter::with_backend(AlgorithmId::CURRENT, Arc::new(PortableKdf))
        .unwrap()
        .export(PASSWORD, PAYLOAD.as_bytes())
        .unwrap();

    for backend in backends() {
        let exporter = Exporter::with_backend(AlgorithmId::CURRENT, backend).unwrap();
        assert_eq!(*exporter.import(PASSWORD, &text).unwrap(), PAYLOAD.as_bytes());
    }
}

#[test]
fn salt_is_fresh_per_export() {
    let a = crypto::generate_salt().unwrap();
    let b = crypto::generate_salt().unwrap();
    assert_ne!(a, b);
}
