use std::fs;
use std::io::Cursor;

use cellar::{CHUNK_OVERHEAD, Cellar, CellarError, CellarOptions, Cipher};
use tempfile::tempdir;

fn sealed(cellar: &Cellar, msg: &[u8]) -> Vec<u8> {
    let mut ct = Vec::new();
    cellar.encrypt_stream(Cursor::new(msg), &mut ct).unwrap();
    ct
}

fn open(cellar: &Cellar, ct: &[u8]) -> Result<Vec<u8>, CellarError> {
    let mut pt = Vec::new();
    cellar.decrypt_stream(Cursor::new(ct), &mut pt).map(|_| pt)
}

/// Flip one byte in every position class (nonce, tag, body) and expect rejection.
#[test]
fn tamper_stream_bytes_fails() {
    for cipher in [Cipher::XSalsa20Poly1305, Cipher::XChaCha20Poly1305] {
        let cellar = Cellar::new(b"pw", CellarOptions::default().with_cipher(cipher)).unwrap();
        let ct = sealed(&cellar, b"message to protect");

        for pos in [0, 23, 24, 39, 40, ct.len() - 1] {
            let mut bad = ct.clone();
            bad[pos] ^= 0x01;
            assert!(
                matches!(open(&cellar, &bad), Err(CellarError::Authentication)),
                "{cipher} pos {pos}"
            );
        }
    }
}

/// Cutting a stream in the middle of a frame breaks that frame's tag.
#[test]
fn truncated_stream_fails() {
    let cellar = Cellar::new(b"pw", CellarOptions::default().with_block_size(16)).unwrap();
    let ct = sealed(&cellar, &[7u8; 40]);
    assert_eq!(ct.len(), 2 * (16 + CHUNK_OVERHEAD) + 8 + CHUNK_OVERHEAD);

    let cut = &ct[..16 + CHUNK_OVERHEAD + 30];
    assert!(matches!(open(&cellar, cut), Err(CellarError::Authentication)));
}

/// Bytes appended to the final frame break its tag.
#[test]
fn appended_bytes_fail() {
    let cellar = Cellar::new(b"pw", CellarOptions::default()).unwrap();
    let mut ct = sealed(&cellar, b"short");
    ct.extend_from_slice(b"junk");
    assert!(matches!(open(&cellar, &ct), Err(CellarError::Authentication)));
}

/// Wrong key must fail even if ciphertext is intact.
#[test]
fn wrong_key_still_fails() {
    let right = Cellar::new(b"right", CellarOptions::default()).unwrap();
    let wrong = Cellar::new(b"wrong", CellarOptions::default()).unwrap();
    let ct = sealed(&right, b"not so secret");
    assert!(matches!(open(&wrong, &ct), Err(CellarError::Authentication)));
}

/// A tampered file leaves no plaintext behind under its final name.
#[test]
fn tampered_file_leaves_no_output() {
    let dir = tempdir().unwrap();
    let cellar = Cellar::new(b"pw", CellarOptions::default().with_preserve(true)).unwrap();
    let plain = dir.path().join("secret.txt");
    fs::write(&plain, b"the plans").unwrap();

    let enc = cellar.encrypt_file(&plain).unwrap();
    fs::remove_file(&plain).unwrap();
    let mut bytes = fs::read(&enc).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;
    fs::write(&enc, &bytes).unwrap();

    let err = cellar.decrypt_file(&enc).unwrap_err();
    assert!(matches!(err, CellarError::Authentication), "{err:?}");
    assert!(!plain.exists());
    assert!(enc.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
