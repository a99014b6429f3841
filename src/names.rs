//! Path-segment obfuscation.
//!
//! A segment is sealed on its own (fresh nonce each time), encoded with the URL-safe
//! base64 alphabet and prefixed with [`MARKER_PREFIX`]. Segments are byte strings inside
//! the crate; `OsStr` conversion happens only in the `*_os` helpers below.

use std::ffi::{OsStr, OsString};

use base64::{Engine, engine::general_purpose::URL_SAFE};

use crate::crypto::ChunkCodec;
use crate::types::{CellarError, MARKER_PREFIX, MAX_NAME_LEN};

/// True if `name` carries the marker prefix.
pub fn is_obfuscated(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(MARKER_PREFIX.as_bytes())
}

/// Seal one path segment into a filesystem-safe name.
///
/// # Errors
///
/// `CellarError::NameTooLong` when the result would not fit in [`MAX_NAME_LEN`] bytes
/// (segments longer than 146 bytes).
pub fn obfuscate(codec: &ChunkCodec, segment: &[u8]) -> Result<String, CellarError> {
    let sealed = codec.seal(segment)?;
    let name = format!("{MARKER_PREFIX}{}", URL_SAFE.encode(sealed));
    if name.len() > MAX_NAME_LEN {
        return Err(CellarError::NameTooLong(
            String::from_utf8_lossy(segment).into_owned(),
        ));
    }
    Ok(name)
}

/// Recover the segment sealed by [`obfuscate`].
///
/// # Errors
///
/// `CellarError::InvalidName` when the prefix or encoding is wrong or the recovered bytes
/// are not a usable path segment, `CellarError::Authentication` when the seal does not
/// verify.
pub fn deobfuscate(codec: &ChunkCodec, name: &str) -> Result<Vec<u8>, CellarError> {
    let encoded = name
        .strip_prefix(MARKER_PREFIX)
        .ok_or_else(|| CellarError::InvalidName(name.to_owned()))?;
    let sealed = URL_SAFE
        .decode(encoded)
        .map_err(|_| CellarError::InvalidName(name.to_owned()))?;
    let segment = codec.open(&sealed)?;
    if !is_valid_segment(&segment) {
        return Err(CellarError::InvalidName(name.to_owned()));
    }
    Ok(segment)
}

/// A single component that cannot escape or alias its parent directory.
fn is_valid_segment(segment: &[u8]) -> bool {
    !segment.is_empty()
        && segment != b"."
        && segment != b".."
        && !segment.iter().any(|&b| b == b'/' || b == 0)
        && !(cfg!(windows) && segment.contains(&b'\\'))
}

pub fn obfuscate_os(codec: &ChunkCodec, segment: &OsStr) -> Result<OsString, CellarError> {
    obfuscate(codec, &segment_bytes(segment)?).map(OsString::from)
}

pub fn deobfuscate_os(codec: &ChunkCodec, name: &OsStr) -> Result<OsString, CellarError> {
    let name = name
        .to_str()
        .ok_or_else(|| CellarError::InvalidName(name.to_string_lossy().into_owned()))?;
    segment_from_bytes(deobfuscate(codec, name)?)
}

#[cfg(unix)]
fn segment_bytes(segment: &OsStr) -> Result<Vec<u8>, CellarError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(segment.as_bytes().to_vec())
}

#[cfg(not(unix))]
fn segment_bytes(segment: &OsStr) -> Result<Vec<u8>, CellarError> {
    segment
        .to_str()
        .map(|s| s.as_bytes().to_vec())
        .ok_or(CellarError::Usage("file name is not valid UTF-8"))
}

#[cfg(unix)]
fn segment_from_bytes(bytes: Vec<u8>) -> Result<OsString, CellarError> {
    use std::os::unix::ffi::OsStringExt;
    Ok(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn segment_from_bytes(bytes: Vec<u8>) -> Result<OsString, CellarError> {
    String::from_utf8(bytes)
        .map(OsString::from)
        .map_err(|e| CellarError::InvalidName(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}
