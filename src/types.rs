//! Core types, constants and errors for cellar.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Key length in bytes expected by every supported cipher.
pub const KEY_SIZE: usize = 32;

/// Nonce length in bytes (XSalsa20 and XChaCha20 both use 192-bit nonces).
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes added to every sealed chunk: the leading nonce plus the tag.
pub const CHUNK_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Default plaintext chunk size for streaming (1 MiB).
pub const BLOCK_SIZE: usize = 1 << 20;

/// Largest accepted plaintext chunk size (1 GiB). Each stream holds one chunk in memory.
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

/// Literal prefix marking an obfuscated path segment.
pub const MARKER_PREFIX: &str = ".enc.";

/// Longest file name, in bytes, that common filesystems accept.
pub const MAX_NAME_LEN: usize = 255;

/// Supported AEAD ciphers.
///
/// Both take a 32-byte key and a 24-byte nonce and produce a 16-byte tag, so the chunk
/// framing does not depend on the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cipher {
    /// XSalsa20-Poly1305, NaCl `secretbox` layout (tag precedes the ciphertext).
    #[default]
    XSalsa20Poly1305,
    /// XChaCha20-Poly1305 (tag follows the ciphertext).
    XChaCha20Poly1305,
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cipher::XSalsa20Poly1305 => f.write_str("xsalsa20-poly1305"),
            Cipher::XChaCha20Poly1305 => f.write_str("xchacha20-poly1305"),
        }
    }
}

/// Engine configuration, fixed for the lifetime of a [`Cellar`](crate::Cellar).
#[derive(Debug, Clone)]
pub struct CellarOptions {
    pub cipher: Cipher,
    /// Plaintext bytes per chunk. Must match between encryption and decryption.
    pub block_size: usize,
    /// Keep the source file or tree after a successful transform.
    pub preserve: bool,
    /// Worker threads for tree operations. `None` lets rayon pick.
    pub jobs: Option<usize>,
}

impl Default for CellarOptions {
    fn default() -> Self {
        Self {
            cipher: Cipher::default(),
            block_size: BLOCK_SIZE,
            preserve: false,
            jobs: None,
        }
    }
}

impl CellarOptions {
    pub fn with_cipher(mut self, cipher: Cipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_preserve(mut self, on: bool) -> Self {
        self.preserve = on;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

/// How a caller-supplied key was fitted to [`KEY_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFit {
    Exact,
    /// Zero-padded on the right; holds the original length.
    Padded(usize),
    /// Cut down to `KEY_SIZE`; holds the original length.
    Truncated(usize),
}

/// Library error type (no panics for expected failures).
#[derive(Error, Debug)]
pub enum CellarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decryption failed: authentication tag mismatch (is the key correct?)")]
    Authentication,
    #[error("encryption failure")]
    Crypto,
    #[error("refusing to overwrite existing path {}", .0.display())]
    Collision(PathBuf),
    #[error("malformed encrypted name {0:?}")]
    InvalidName(String),
    #[error("encrypted name for {0:?} would exceed 255 bytes")]
    NameTooLong(String),
    #[error("invalid usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Tree(TreeFailures),
}

/// Every per-file failure of a tree operation.
#[derive(Debug, Default)]
pub struct TreeFailures {
    pub failures: Vec<(PathBuf, CellarError)>,
}

impl TreeFailures {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when every failure is an authentication failure (wrong key, tampering).
    pub fn all_authentication(&self) -> bool {
        self.failures
            .iter()
            .all(|(_, e)| matches!(e, CellarError::Authentication))
    }
}

impl fmt::Display for TreeFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} file(s) failed, source left in place", self.failures.len())?;
        for (path, err) in &self.failures {
            write!(f, "\n  {}: {err}", path.display())?;
        }
        Ok(())
    }
}

/// Counters for one stream transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub plaintext_bytes: u64,
    pub ciphertext_bytes: u64,
}

/// Outcome of a successful tree operation.
#[derive(Debug, Clone, Default)]
pub struct TreeReport {
    /// Root of the tree that was written.
    pub root: PathBuf,
    /// Files transformed.
    pub files: usize,
    /// Entries left alone: marked entries on encrypt, unmarked entries on decrypt.
    pub skipped: Vec<PathBuf>,
    /// Whether the source tree was removed.
    pub removed_source: bool,
}
