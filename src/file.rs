//! Single-file encryption and decryption.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::crypto::ChunkCodec;
use crate::names::{deobfuscate_os, is_obfuscated, obfuscate_os};
use crate::streaming::{decrypt_stream, encrypt_stream};
use crate::types::{CellarError, CellarOptions, StreamStats};

/// Atomically move a finished temp file to `out`, never replacing an existing path.
fn persist_noclobber(tmp: NamedTempFile, out: &Path) -> Result<(), CellarError> {
    tmp.persist_noclobber(out).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            CellarError::Collision(out.to_path_buf())
        } else {
            CellarError::Io(e.error)
        }
    })?;
    Ok(())
}

fn file_name(path: &Path) -> Result<&OsStr, CellarError> {
    path.file_name()
        .ok_or(CellarError::Usage("path has no file name"))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Stream-transform `src` into a temp file next to `dest`, then persist it.
///
/// `dest` must not exist. On any failure the temp file is discarded and `dest` is left
/// untouched, so a half-written output never appears under its final name.
fn transform_to<F>(src: &Path, dest: &Path, transform: F) -> Result<StreamStats, CellarError>
where
    F: FnOnce(File, &mut NamedTempFile) -> Result<StreamStats, CellarError>,
{
    if dest.exists() {
        return Err(CellarError::Collision(dest.to_path_buf()));
    }
    let input = File::open(src)?;
    let parent = parent_dir(dest);
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    let stats = transform(input, &mut tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    persist_noclobber(tmp, dest)?;
    Ok(stats)
}

/// Encrypt the content of `src` into `dest`. Names are not touched.
pub fn encrypt_file_to(
    codec: &ChunkCodec,
    block_size: usize,
    src: &Path,
    dest: &Path,
) -> Result<StreamStats, CellarError> {
    transform_to(src, dest, |input, tmp| {
        encrypt_stream(codec, block_size, input, tmp)
    })
}

/// Decrypt the content of `src` into `dest`. Names are not touched.
pub fn decrypt_file_to(
    codec: &ChunkCodec,
    block_size: usize,
    src: &Path,
    dest: &Path,
) -> Result<StreamStats, CellarError> {
    transform_to(src, dest, |input, tmp| {
        decrypt_stream(codec, block_size, input, tmp)
    })
}

/// Encrypt `path` next to itself under an obfuscated name.
///
/// The plaintext file is removed after success unless `opts.preserve` is set. Returns the
/// path of the encrypted file.
///
/// # Errors
///
/// `CellarError::Usage` if `path` already carries the marker prefix,
/// `CellarError::NameTooLong` if its sealed name would not fit, `CellarError::Collision`
/// if the destination exists.
pub fn encrypt_file(
    codec: &ChunkCodec,
    opts: &CellarOptions,
    path: &Path,
) -> Result<PathBuf, CellarError> {
    let name = file_name(path)?;
    if is_obfuscated(name) {
        return Err(CellarError::Usage("file is already encrypted"));
    }
    let dest = parent_dir(path).join(obfuscate_os(codec, name)?);
    let stats = encrypt_file_to(codec, opts.block_size, path, &dest)?;
    debug!(
        src = %path.display(),
        dest = %dest.display(),
        chunks = stats.chunks,
        "encrypted file"
    );
    if !opts.preserve {
        fs::remove_file(path)?;
    }
    Ok(dest)
}

/// Decrypt an obfuscated file next to itself under its original name.
///
/// The encrypted file is removed after success unless `opts.preserve` is set. Returns the
/// path of the plaintext file.
pub fn decrypt_file(
    codec: &ChunkCodec,
    opts: &CellarOptions,
    path: &Path,
) -> Result<PathBuf, CellarError> {
    let dest = parent_dir(path).join(deobfuscate_os(codec, file_name(path)?)?);
    let stats = decrypt_file_to(codec, opts.block_size, path, &dest)?;
    debug!(
        src = %path.display(),
        dest = %dest.display(),
        chunks = stats.chunks,
        "decrypted file"
    );
    if !opts.preserve {
        fs::remove_file(path)?;
    }
    Ok(dest)
}

/// Original name of an obfuscated file, without touching its content.
pub fn list_file(codec: &ChunkCodec, path: &Path) -> Result<PathBuf, CellarError> {
    Ok(PathBuf::from(deobfuscate_os(codec, file_name(path)?)?))
}
