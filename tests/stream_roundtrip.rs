//! Property-based streaming roundtrip for both ciphers and small block sizes.

use std::io::Cursor;

use cellar::{CHUNK_OVERHEAD, Cellar, CellarOptions, Cipher};

use proptest::prelude::*;

fn pattern(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i as u32).wrapping_mul(1103515245).wrapping_add(12345) as u8;
    }
    data
}

/// Sealed length of `len` plaintext bytes at `block` bytes per chunk.
fn expected_len(len: usize, block: usize) -> usize {
    let chunks = len.div_ceil(block);
    len + chunks * CHUNK_OVERHEAD
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_round_trip_streaming(
        size in 0usize..4096,
        block in 1usize..600,
        cipher in prop_oneof![Just(Cipher::XSalsa20Poly1305), Just(Cipher::XChaCha20Poly1305)],
    ) {
        let cellar = Cellar::new(
            b"proptest-stream",
            CellarOptions::default().with_cipher(cipher).with_block_size(block),
        ).unwrap();
        let data = pattern(size);

        let mut ct = Vec::new();
        let enc = cellar.encrypt_stream(Cursor::new(&data), &mut ct).unwrap();
        prop_assert_eq!(ct.len(), expected_len(size, block));
        prop_assert_eq!(enc.chunks as usize, size.div_ceil(block));

        let mut round = Vec::new();
        let dec = cellar.decrypt_stream(Cursor::new(&ct), &mut round).unwrap();
        prop_assert_eq!(dec.chunks, enc.chunks);
        prop_assert_eq!(round, data);
    }
}

#[test]
fn block_boundaries_round_trip() {
    let block = 64;
    let cellar = Cellar::new(b"k", CellarOptions::default().with_block_size(block)).unwrap();

    for size in [0, 1, block - 1, block, block + 1, 3 * block, 3 * block + 1] {
        let data = pattern(size);
        let mut ct = Vec::new();
        cellar.encrypt_stream(Cursor::new(&data), &mut ct).unwrap();
        assert_eq!(ct.len(), expected_len(size, block), "size={size}");

        let mut back = Vec::new();
        cellar.decrypt_stream(Cursor::new(&ct), &mut back).unwrap();
        assert_eq!(back, data, "size={size}");
    }
}

#[test]
fn default_block_spans_multiple_chunks() {
    let cellar = Cellar::new(b"k", CellarOptions::default()).unwrap();
    let data = pattern(cellar::BLOCK_SIZE * 2 + 17);

    let mut ct = Vec::new();
    let stats = cellar.encrypt_stream(Cursor::new(&data), &mut ct).unwrap();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.plaintext_bytes, data.len() as u64);
    assert_eq!(stats.ciphertext_bytes, ct.len() as u64);

    let mut back = Vec::new();
    cellar.decrypt_stream(Cursor::new(&ct), &mut back).unwrap();
    assert_eq!(back, data);
}
