//! Textual armoring of the encrypted blob
//!
//! The on-disk representation of an encrypted state file is the standard
//! (padded) base64 encoding of the raw binary blob, with no surrounding
//! framing. There is deliberately no magic marker or version byte: the
//! fixed layout is the compatibility contract with existing encrypted
//! state files, and the parser in `secretcrypt` relies on fixed offsets.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{ErrorCategory, ErrorKind, Result, StateboxError};

/// Wrap raw bytes in armor, returning the text to be written to disk.
pub fn wrap(body: &[u8]) -> String {
    STANDARD.encode(body)
}

/// Unwrap armored file contents, returning the raw bytes.
///
/// Accepts raw file bytes rather than a `str`: anything that is not valid
/// base64 (including non-UTF-8 garbage) is rejected here, before any
/// cryptographic work happens.
pub fn unwrap(armored: &[u8]) -> Result<Vec<u8>> {
    STANDARD.decode(armored).map_err(|e| {
        StateboxError::new(
            ErrorCategory::User,
            format!("input is not valid base64; not an encrypted state file? ({e})"),
        )
        .kind(ErrorKind::EncodingInvalid)
        .because(e)
    })
}
