//! Chunk codec: one seal/open per unit of data.
//!
//! Wire layout of a sealed unit is `nonce (24 bytes) || AEAD output (payload + 16-byte tag)`.
//! With the default XSalsa20-Poly1305 cipher the AEAD output is NaCl `secretbox` output
//! (`tag || ciphertext`), so sealed chunks are interchangeable with libsodium.

use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, generic_array::GenericArray};
use crypto_secretbox::XSalsa20Poly1305;
use getrandom::fill as getrandom;

use crate::key::Key;
use crate::types::{CHUNK_OVERHEAD, CellarError, Cipher, NONCE_SIZE};

enum Engine {
    XSalsa(XSalsa20Poly1305),
    XChaCha(XChaCha20Poly1305),
}

/// Where nonces come from. Only tests can pin the nonce.
#[derive(Clone, Copy)]
enum NonceSource {
    Os,
    #[cfg(test)]
    Fixed([u8; NONCE_SIZE]),
}

/// Seals and opens single chunks under one key.
///
/// Immutable after construction and safe to share across threads.
pub struct ChunkCodec {
    cipher: Cipher,
    engine: Engine,
    nonces: NonceSource,
}

impl ChunkCodec {
    pub fn new(cipher: Cipher, key: &Key) -> Result<Self, CellarError> {
        let engine = match cipher {
            Cipher::XSalsa20Poly1305 => Engine::XSalsa(
                XSalsa20Poly1305::new_from_slice(key.as_bytes())
                    .map_err(|_| CellarError::Crypto)?,
            ),
            Cipher::XChaCha20Poly1305 => Engine::XChaCha(
                XChaCha20Poly1305::new_from_slice(key.as_bytes())
                    .map_err(|_| CellarError::Crypto)?,
            ),
        };
        Ok(Self {
            cipher,
            engine,
            nonces: NonceSource::Os,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_fixed_nonce(mut self, nonce: [u8; NONCE_SIZE]) -> Self {
        self.nonces = NonceSource::Fixed(nonce);
        self
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_SIZE], CellarError> {
        match self.nonces {
            NonceSource::Os => {
                let mut nonce = [0u8; NONCE_SIZE];
                getrandom(&mut nonce).map_err(|_| CellarError::Crypto)?;
                Ok(nonce)
            }
            #[cfg(test)]
            NonceSource::Fixed(nonce) => Ok(nonce),
        }
    }

    /// Seal `plaintext` under a fresh nonce, returning `nonce || sealed`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CellarError> {
        let nonce = self.fresh_nonce()?;
        let nonce_ga = GenericArray::from_slice(&nonce[..]);
        let sealed = match &self.engine {
            Engine::XSalsa(c) => c.encrypt(nonce_ga, plaintext),
            Engine::XChaCha(c) => c.encrypt(nonce_ga, plaintext),
        }
        .map_err(|_| CellarError::Crypto)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a unit produced by [`ChunkCodec::seal`].
    ///
    /// # Errors
    ///
    /// Returns `CellarError::Authentication` for a wrong key, tampered bytes or a unit
    /// too short to hold a nonce and tag.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CellarError> {
        if ciphertext.len() < CHUNK_OVERHEAD {
            return Err(CellarError::Authentication);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        let nonce_ga = GenericArray::from_slice(nonce);
        match &self.engine {
            Engine::XSalsa(c) => c.decrypt(nonce_ga, sealed),
            Engine::XChaCha(c) => c.decrypt(nonce_ga, sealed),
        }
        .map_err(|_| CellarError::Authentication)
    }
}

impl std::fmt::Debug for ChunkCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCodec")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
