//! Encryption/decryption using PBKDF2 + AES-256-GCM
//!
//! This module implements passphrase-based encryption using:
//! - PBKDF2-HMAC-SHA256 for key derivation from passphrase
//! - AES-256-GCM for authenticated encryption
//!
//! The binary format is:
//! - salt: 16 bytes
//! - nonce: 12 bytes
//! - sealed box: variable length (ciphertext plus 16-byte GCM tag)
//!
//! Decryption re-derives the key from the salt carried in-band, so the
//! derivation parameters are fixed constants: changing them would orphan
//! every previously encrypted file.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, StateboxError};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of nonce in bytes (AES-GCM standard)
pub const NONCE_LEN: usize = 12;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count. Fixed on purpose; see module docs.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 32-byte key from a passphrase and salt using PBKDF2-HMAC-SHA256.
///
/// The key is wiped from memory when the returned guard is dropped.
fn derive_key(passphrase: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// Encrypt plaintext with a passphrase using random salt and nonce
///
/// Returns the binary format: salt(16) + nonce(12) + sealedbox(variable)
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(passphrase, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random
/// salt/nonce. A nonce reused under the same key voids GCM's guarantees.
pub fn encrypt_deterministic(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(passphrase, salt);

    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|e| {
        StateboxError::new(
            ErrorCategory::Internal,
            format!("failed to construct cipher: {e}"),
        )
        .kind(ErrorKind::CipherFailure)
    })?;

    let sealed_box = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| {
            StateboxError::new(ErrorCategory::Internal, format!("encryption failed: {e}"))
                .kind(ErrorKind::CipherFailure)
        })?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed_box.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Decrypt ciphertext with a passphrase
///
/// The input must be the exact binary format produced by [`encrypt`]. All
/// structural validation happens before any key derivation or cipher work.
pub fn decrypt(passphrase: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(StateboxError::new(
            ErrorCategory::User,
            "input shorter than salt, nonce, and tag; likely truncated",
        )
        .kind(ErrorKind::TruncatedInput));
    }

    let (salt, rest) = ciphertext.split_at(SALT_LEN);
    let (nonce, sealed_box) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|e| {
        StateboxError::new(
            ErrorCategory::Internal,
            format!("failed to construct cipher: {e}"),
        )
        .kind(ErrorKind::CipherFailure)
    })?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed_box)
        .map_err(|_| {
            StateboxError::new(
                ErrorCategory::User,
                "corrupt input, tampered-with data, or bad passphrase",
            )
            .kind(ErrorKind::AuthenticationFailed)
        })?;

    Ok(plaintext)
}
