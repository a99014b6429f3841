//! Chunked streaming encryption and decryption in constant memory.
//!
//! Frames carry no length prefix. Every sealed frame except the last is exactly
//! `block_size + CHUNK_OVERHEAD` bytes, so the reader always knows how much to pull.

use std::io::{self, Read, Write};

use tracing::trace;
use zeroize::Zeroizing;

use crate::crypto::ChunkCodec;
use crate::types::{CHUNK_OVERHEAD, CellarError, MAX_BLOCK_SIZE, StreamStats};

/// Reject block sizes that cannot frame a stream.
///
/// The block size must be in `1..=MAX_BLOCK_SIZE`; one block is allocated up front for
/// every stream.
pub fn validate_block_size(block_size: usize) -> Result<(), CellarError> {
    if block_size == 0 {
        return Err(CellarError::Usage("block size must be > 0"));
    }
    if block_size > MAX_BLOCK_SIZE {
        return Err(CellarError::Usage("block size too large"));
    }
    Ok(())
}

/// Fill `buf` with up to `len` bytes, retrying short reads until EOF.
fn read_block<R: Read>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> io::Result<usize> {
    buf.clear();
    reader.by_ref().take(len as u64).read_to_end(buf)
}

/// Seal `reader` into `writer` chunk by chunk. Empty input writes nothing.
pub fn encrypt_stream<R: Read, W: Write>(
    codec: &ChunkCodec,
    block_size: usize,
    mut reader: R,
    mut writer: W,
) -> Result<StreamStats, CellarError> {
    validate_block_size(block_size)?;
    let mut stats = StreamStats::default();
    let mut buf = Zeroizing::new(Vec::with_capacity(block_size));

    loop {
        let n = read_block(&mut reader, &mut buf, block_size)?;
        if n == 0 {
            break;
        }
        let ct = codec.seal(&buf)?;
        writer.write_all(&ct)?;

        stats.chunks += 1;
        stats.plaintext_bytes += n as u64;
        stats.ciphertext_bytes += ct.len() as u64;
        trace!(chunk = stats.chunks, len = n, "sealed chunk");

        if n < block_size {
            break;
        }
    }
    writer.flush()?;
    Ok(stats)
}

/// Open a stream produced by [`encrypt_stream`] with the same `block_size`.
///
/// # Errors
///
/// `CellarError::Authentication` on the first frame that fails to verify. Plaintext of
/// earlier frames has already been written by then.
pub fn decrypt_stream<R: Read, W: Write>(
    codec: &ChunkCodec,
    block_size: usize,
    mut reader: R,
    mut writer: W,
) -> Result<StreamStats, CellarError> {
    validate_block_size(block_size)?;
    let frame_len = block_size + CHUNK_OVERHEAD;
    let mut stats = StreamStats::default();
    let mut buf = Vec::with_capacity(frame_len);

    loop {
        let n = read_block(&mut reader, &mut buf, frame_len)?;
        if n == 0 {
            break;
        }
        let pt = Zeroizing::new(codec.open(&buf)?);
        writer.write_all(&pt)?;

        stats.chunks += 1;
        stats.plaintext_bytes += pt.len() as u64;
        stats.ciphertext_bytes += n as u64;
        trace!(chunk = stats.chunks, len = n, "opened chunk");

        if n < frame_len {
            break;
        }
    }
    writer.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::types::{Cipher, KEY_SIZE, NONCE_SIZE};
    use base64::{Engine as _, engine::general_purpose::URL_SAFE};
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(out.len()).min(self.data.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn codec() -> ChunkCodec {
        ChunkCodec::new(Cipher::default(), &Key::new(b"stream key")).unwrap()
    }

    #[test]
    fn fixture_stream_is_a_single_frame() {
        let c = ChunkCodec::new(Cipher::XSalsa20Poly1305, &Key::new(&[b'k'; KEY_SIZE]))
            .unwrap()
            .with_fixed_nonce([b'r'; NONCE_SIZE]);
        let mut out = Vec::new();
        encrypt_stream(&c, crate::BLOCK_SIZE, Cursor::new(b"foobar"), &mut out).unwrap();
        assert_eq!(
            URL_SAFE.encode(&out),
            "cnJycnJycnJycnJycnJycnJycnJycnJycmDkEdGyR-6iWE3_Mg-GuZ7Ny_qVjg=="
        );

        let mut back = Vec::new();
        decrypt_stream(&c, crate::BLOCK_SIZE, Cursor::new(&out), &mut back).unwrap();
        assert_eq!(back, b"foobar");
    }

    #[test]
    fn short_reads_do_not_change_framing() {
        let c = codec();
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let mut ct = Vec::new();
        let stats = encrypt_stream(&c, 64, Trickle { data: &data, step: 7 }, &mut ct).unwrap();
        assert_eq!(stats.chunks, 16);
        assert_eq!(ct.len(), 1000 + 16 * CHUNK_OVERHEAD);

        let mut back = Vec::new();
        decrypt_stream(&c, 64, Trickle { data: &ct, step: 13 }, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let c = codec();
        let res = encrypt_stream(&c, 0, Cursor::new(b"x"), Vec::new());
        assert!(matches!(res, Err(CellarError::Usage(_))));
    }

    #[test]
    fn oversized_block_is_rejected_before_allocating() {
        let c = codec();
        for size in [MAX_BLOCK_SIZE + 1, usize::MAX - CHUNK_OVERHEAD, usize::MAX] {
            assert!(matches!(
                validate_block_size(size),
                Err(CellarError::Usage("block size too large"))
            ));
            let res = encrypt_stream(&c, size, Cursor::new(b"x"), Vec::new());
            assert!(matches!(res, Err(CellarError::Usage(_))), "size={size}");
            let res = decrypt_stream(&c, size, Cursor::new(b"x"), Vec::new());
            assert!(matches!(res, Err(CellarError::Usage(_))), "size={size}");
        }
        assert!(validate_block_size(MAX_BLOCK_SIZE).is_ok());
    }

    #[test]
    fn mismatched_block_size_fails_authentication() {
        let c = codec();
        let mut ct = Vec::new();
        encrypt_stream(&c, 64, Cursor::new(vec![1u8; 200]), &mut ct).unwrap();
        let res = decrypt_stream(&c, 32, Cursor::new(&ct), Vec::new());
        assert!(matches!(res, Err(CellarError::Authentication)));
    }
}
