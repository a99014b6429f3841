#![forbid(unsafe_code)]
//! # cellar: symmetric encryption for files and whole directory trees.
//!
//! `cellar` encrypts file content in fixed-size authenticated chunks and hides file and
//! directory names behind sealed, filesystem-safe tokens. Encryption and decryption run
//! in constant memory, and an encrypted tree decrypts to a byte-identical copy of the
//! original.
//!
//! ## Features
//! - **Chunked streaming** over any `Read`/`Write` pair (one chunk in memory at a time)
//! - **Name obfuscation**: every path segment sealed on its own, marked with `.enc.`
//! - **Tree transforms** with a parallel worker pool; the source is removed only after
//!   every file succeeded
//! - **Two AEAD ciphers**: XSalsa20-Poly1305 (NaCl `secretbox` compatible, default) and
//!   XChaCha20-Poly1305
//!
//! ## Example: encrypt and decrypt a stream
//! ```no_run
//! use cellar::{Cellar, CellarOptions};
//! use std::io::Cursor;
//!
//! let cellar = Cellar::new(b"my 32 byte secret key material!!", CellarOptions::default()).unwrap();
//! let mut sealed = Vec::new();
//! cellar.encrypt_stream(Cursor::new(b"hello"), &mut sealed).unwrap();
//! let mut plain = Vec::new();
//! cellar.decrypt_stream(Cursor::new(&sealed), &mut plain).unwrap();
//! assert_eq!(plain, b"hello");
//! ```
//!
//! ## Example: encrypt a directory tree
//! ```no_run
//! use cellar::{Cellar, CellarOptions};
//! use std::path::Path;
//!
//! let cellar = Cellar::new(b"key", CellarOptions::default().with_preserve(true)).unwrap();
//! let report = cellar.encrypt_dir(Path::new("photos")).unwrap();
//! println!("wrote {} files under {}", report.files, report.root.display());
//! ```
//!
//! Keys are used as given (no password hashing). Short keys are zero-padded and long keys
//! truncated to 32 bytes, with a warning.
//!
//! Safety notes
//! - The crate is not audited or reviewed! Protects data at rest. Does not defend against compromised hosts/side channels.

mod crypto;
mod file;
mod key;
mod names;
mod streaming;
mod tree;
mod types;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use crypto::ChunkCodec;
pub use key::{Key, read_key_file};
pub use names::{deobfuscate, is_obfuscated, obfuscate};
pub use streaming::validate_block_size;
pub use types::*;

/// An encryption engine bound to one key and one set of options.
///
/// Create one per invocation and share it by reference; it holds no mutable state.
#[derive(Debug)]
pub struct Cellar {
    codec: ChunkCodec,
    opts: CellarOptions,
}

impl Cellar {
    /// Build an engine from raw key material (fitted to [`KEY_SIZE`]).
    pub fn new(key: &[u8], opts: CellarOptions) -> Result<Self, CellarError> {
        Self::with_key(&Key::new(key), opts)
    }

    /// Build an engine from an already fitted [`Key`].
    ///
    /// # Errors
    ///
    /// `CellarError::Usage` if `opts.block_size` is 0 or above [`MAX_BLOCK_SIZE`].
    pub fn with_key(key: &Key, opts: CellarOptions) -> Result<Self, CellarError> {
        validate_block_size(opts.block_size)?;
        Ok(Self {
            codec: ChunkCodec::new(opts.cipher, key)?,
            opts,
        })
    }

    pub fn options(&self) -> &CellarOptions {
        &self.opts
    }

    /// Seal one buffer: `nonce || sealed`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CellarError> {
        self.codec.seal(plaintext)
    }

    /// Open one buffer produced by [`Cellar::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CellarError> {
        self.codec.open(ciphertext)
    }

    /// Obfuscated form of a single path segment.
    pub fn encrypt_name(&self, segment: &[u8]) -> Result<String, CellarError> {
        obfuscate(&self.codec, segment)
    }

    /// Original bytes of an obfuscated path segment.
    pub fn decrypt_name(&self, name: &str) -> Result<Vec<u8>, CellarError> {
        deobfuscate(&self.codec, name)
    }

    /// Encrypt everything `reader` yields into `writer`, one chunk at a time.
    ///
    /// Empty input writes nothing. Content only, no names are involved.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: R,
        writer: W,
    ) -> Result<StreamStats, CellarError> {
        streaming::encrypt_stream(&self.codec, self.opts.block_size, reader, writer)
    }

    /// Decrypt a stream written by [`Cellar::encrypt_stream`] with the same block size.
    ///
    /// # Errors
    ///
    /// `CellarError::Authentication` at the first chunk that does not verify. Plaintext of
    /// the chunks before it has already been written to `writer`.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: R,
        writer: W,
    ) -> Result<StreamStats, CellarError> {
        streaming::decrypt_stream(&self.codec, self.opts.block_size, reader, writer)
    }

    /// Encrypt a file next to itself under an obfuscated name.
    pub fn encrypt_file(&self, path: &Path) -> Result<PathBuf, CellarError> {
        file::encrypt_file(&self.codec, &self.opts, path)
    }

    /// Decrypt an obfuscated file next to itself under its original name.
    pub fn decrypt_file(&self, path: &Path) -> Result<PathBuf, CellarError> {
        file::decrypt_file(&self.codec, &self.opts, path)
    }

    /// Encrypt content only, to an explicit destination. The source is kept.
    pub fn encrypt_file_to(&self, src: &Path, dest: &Path) -> Result<StreamStats, CellarError> {
        file::encrypt_file_to(&self.codec, self.opts.block_size, src, dest)
    }

    /// Decrypt content only, to an explicit destination. The source is kept.
    pub fn decrypt_file_to(&self, src: &Path, dest: &Path) -> Result<StreamStats, CellarError> {
        file::decrypt_file_to(&self.codec, self.opts.block_size, src, dest)
    }

    /// Encrypt every file under `root` into a sibling tree with obfuscated names.
    ///
    /// # Errors
    ///
    /// Planning errors (`Usage` for an already encrypted root, `NameTooLong`, `Collision`)
    /// are returned before anything is written. Per-file failures are collected into
    /// `CellarError::Tree`, and the source is kept.
    pub fn encrypt_dir(&self, root: &Path) -> Result<TreeReport, CellarError> {
        tree::encrypt_dir(&self.codec, &self.opts, root)
    }

    /// Decrypt an obfuscated tree into a sibling tree with the original names.
    ///
    /// # Errors
    ///
    /// A root or interior name that does not verify fails the plan with
    /// `Authentication` or `InvalidName` before anything is written. Per-file failures are
    /// collected into `CellarError::Tree`, and the encrypted tree is kept.
    pub fn decrypt_dir(&self, root: &Path) -> Result<TreeReport, CellarError> {
        tree::decrypt_dir(&self.codec, &self.opts, root)
    }

    /// Encrypt a file or a directory, whichever `path` is.
    pub fn encrypt_path(&self, path: &Path) -> Result<PathBuf, CellarError> {
        if path.is_dir() {
            self.encrypt_dir(path).map(|r| r.root)
        } else if path.is_file() {
            self.encrypt_file(path)
        } else {
            Err(CellarError::Usage("path is neither a file nor a directory"))
        }
    }

    /// Decrypt a file or a directory, whichever `path` is.
    pub fn decrypt_path(&self, path: &Path) -> Result<PathBuf, CellarError> {
        if path.is_dir() {
            self.decrypt_dir(path).map(|r| r.root)
        } else if path.is_file() {
            self.decrypt_file(path)
        } else {
            Err(CellarError::Usage("path is neither a file nor a directory"))
        }
    }

    /// Original relative paths under an encrypted file or tree, without decrypting
    /// content.
    pub fn list(&self, path: &Path) -> Result<Vec<PathBuf>, CellarError> {
        if path.is_dir() {
            tree::list_dir(&self.codec, path)
        } else if path.is_file() {
            Ok(vec![file::list_file(&self.codec, path)?])
        } else {
            Err(CellarError::Usage("path is neither a file nor a directory"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_small_default() {
        let cellar = Cellar::new(b"key1", CellarOptions::default()).unwrap();
        let ct = cellar.encrypt(b"foobar").unwrap();
        assert_eq!(cellar.decrypt(&ct).unwrap(), b"foobar");
    }

    #[test]
    fn wrong_key_fails() {
        let ct = Cellar::new(b"key1", CellarOptions::default())
            .unwrap()
            .encrypt(b"foobar")
            .unwrap();
        let bad = Cellar::new(&b"key2".repeat(100), CellarOptions::default()).unwrap();
        assert!(matches!(bad.decrypt(&ct), Err(CellarError::Authentication)));
    }

    #[test]
    fn authentication_message_points_at_the_key() {
        let msg = CellarError::Authentication.to_string();
        assert!(msg.contains("decryption failed"));
        assert!(msg.contains("key"));
    }

    #[test]
    fn zero_block_size_is_a_usage_error() {
        let res = Cellar::new(b"k", CellarOptions::default().with_block_size(0));
        assert!(matches!(res, Err(CellarError::Usage(_))));
    }

    #[test]
    fn names_round_trip_through_facade() {
        let cellar = Cellar::new(b"key1", CellarOptions::default()).unwrap();
        let name = cellar.encrypt_name("naïve ünïcode.txt".as_bytes()).unwrap();
        assert!(name.starts_with(MARKER_PREFIX));
        assert_eq!(cellar.decrypt_name(&name).unwrap(), "naïve ünïcode.txt".as_bytes());
    }

    #[test]
    fn stream_through_facade() {
        let cellar = Cellar::new(b"key1", CellarOptions::default().with_block_size(4)).unwrap();
        let mut ct = Vec::new();
        let stats = cellar.encrypt_stream(Cursor::new(b"0123456789"), &mut ct).unwrap();
        assert_eq!(stats.chunks, 3);
        let mut pt = Vec::new();
        cellar.decrypt_stream(Cursor::new(&ct), &mut pt).unwrap();
        assert_eq!(pt, b"0123456789");
    }
}
