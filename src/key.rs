//! Symmetric key handling.
//!
//! Keys are used as-is: no password hashing. Input of the wrong length is zero-padded or
//! truncated to [`KEY_SIZE`] with a warning, never rejected.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::types::{CellarError, KEY_SIZE, KeyFit};

/// A fixed-size secret key, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Fit arbitrary key material to [`KEY_SIZE`] bytes.
    pub fn new(material: &[u8]) -> Self {
        Self::fit(material).0
    }

    /// Like [`Key::new`], also reporting whether padding or truncation happened.
    pub fn fit(material: &[u8]) -> (Self, KeyFit) {
        let mut key = [0u8; KEY_SIZE];
        let fit = match material.len() {
            n if n < KEY_SIZE => {
                warn!(len = n, "key too short, padding to {KEY_SIZE} bytes");
                KeyFit::Padded(n)
            }
            n if n > KEY_SIZE => {
                warn!(len = n, "key too long, truncating to {KEY_SIZE} bytes");
                KeyFit::Truncated(n)
            }
            _ => KeyFit::Exact,
        };
        let take = material.len().min(KEY_SIZE);
        key[..take].copy_from_slice(&material[..take]);
        (Self(key), fit)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

/// Read key material from a key file.
///
/// With a non-zero `offset`, only the [`KEY_SIZE`] bytes starting at that offset are
/// used, so one large random file can hold many keys.
pub fn read_key_file(path: &Path, offset: u64) -> Result<Zeroizing<Vec<u8>>, CellarError> {
    let mut file = File::open(path)?;
    let mut material = Zeroizing::new(Vec::new());
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
        file.take(KEY_SIZE as u64).read_to_end(&mut material)?;
    } else {
        file.read_to_end(&mut material)?;
    }
    Ok(material)
}
