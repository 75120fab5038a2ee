//! In-place state file encryption/decryption
//!
//! Both operations transform the file at its own path: encrypt replaces
//! plaintext with the armored blob, decrypt replaces the armored blob with
//! the recovered plaintext. A missing file is a silent no-op, which makes
//! the operations safe to run unconditionally as protect/unprotect steps
//! around state access (including the first run, before any state exists).
//!
//! Writes go through a tempfile-and-rename sequence, so a crash mid-write
//! never leaves a half-transformed file, and a failed decrypt leaves the
//! file byte-identical.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::armor;
use crate::error::{ErrorCategory, ErrorKind, Result, StateboxError};
use crate::passphrase::PassphraseReader;
use crate::secretcrypt;

/// Encrypt the state file in place
///
/// Reads the plaintext at `state_path`, encrypts it using a passphrase from
/// `passphrase_reader`, and replaces the file with the armored ciphertext.
/// Returns success without touching anything if the file does not exist.
///
/// The replacement file is created with mode 0o600 (read/write for owner
/// only) on Unix systems.
pub fn encrypt_file(
    state_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    if !file_present(state_path)? {
        return Ok(());
    }

    let plaintext = fs::read(state_path).map_err(|e| read_error(state_path, e))?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let blob = secretcrypt::encrypt(&passphrase, &plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;
    let armored = armor::wrap(&blob);
    replace_file_atomic(state_path, armored.as_bytes()).map_err(|e| {
        e.with_context(format!(
            "failed to write encrypted state to {}",
            state_path.display()
        ))
    })?;

    Ok(())
}

/// Decrypt the state file in place
///
/// Reads the armored ciphertext at `state_path`, decrypts it using a
/// passphrase from `passphrase_reader`, and replaces the file with the
/// recovered plaintext. Returns success without touching anything if the
/// file does not exist.
///
/// Nothing is written until the plaintext has been authenticated: on a
/// wrong passphrase, tampered data, or a format error the file is left
/// exactly as it was.
pub fn decrypt_file(
    state_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    if !file_present(state_path)? {
        return Ok(());
    }

    let armored = fs::read(state_path).map_err(|e| read_error(state_path, e))?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let blob = armor::unwrap(&armored).map_err(|e| e.with_context("failed to unarmor"))?;
    let plaintext = secretcrypt::decrypt(&passphrase, &blob)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    replace_file_atomic(state_path, &plaintext).map_err(|e| {
        e.with_context(format!(
            "failed to write decrypted state to {}",
            state_path.display()
        ))
    })?;

    Ok(())
}

/// Existence guard shared by both operations.
///
/// Only a confirmed NotFound counts as absent. Any other stat failure
/// (e.g. permission denied on a parent directory) propagates; reporting
/// absence there would silently skip protecting the file.
fn file_present(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StateboxError::new(
            ErrorCategory::Internal,
            format!("failed to stat {}", path.display()),
        )
        .kind(ErrorKind::Io)
        .because(e)),
    }
}

/// Replace `path` with `contents` atomically: tempfile in the same
/// directory, flush, fsync, then rename over the target. The rename either
/// happens fully or not at all, so readers never observe a partial file.
fn replace_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        StateboxError::new(ErrorCategory::Internal, "failed to create tempfile")
            .kind(ErrorKind::Io)
            .because(e)
    })?;

    temp_file.write_all(contents).map_err(|e| {
        StateboxError::new(ErrorCategory::Internal, "failed to write to tempfile")
            .kind(ErrorKind::Io)
            .because(e)
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        StateboxError::new(ErrorCategory::Internal, "failed to flush tempfile")
            .kind(ErrorKind::Io)
            .because(e)
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        StateboxError::new(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
        )
        .kind(ErrorKind::Io)
        .because(e)
    })?;

    // Persist with restrictive permissions; the file holds secret material
    // on at least one side of the transform.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                StateboxError::new(ErrorCategory::Internal, "failed to get tempfile metadata")
                    .kind(ErrorKind::Io)
                    .because(e)
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            StateboxError::new(ErrorCategory::Internal, "failed to set tempfile permissions")
                .kind(ErrorKind::Io)
                .because(e)
        })?;
    }
    temp_file.persist(path).map_err(|e| {
        StateboxError::new(
            ErrorCategory::Internal,
            format!("failed to rename to target file {}", path.display()),
        )
        .kind(ErrorKind::Io)
        .because(e)
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> StateboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    StateboxError::new(category, format!("failed to read from {}", path.display()))
        .kind(ErrorKind::Io)
        .because(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::passphrase::ConstantPassphraseReader;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn reader(passphrase: &[u8]) -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(passphrase.to_vec())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        let plaintext = br#"{"version":4,"serial":7,"resources":[]}"#;
        fs::write(&state_path, plaintext).unwrap();

        encrypt_file(&state_path, &mut reader(b"test password")).unwrap();
        let encrypted = fs::read(&state_path).unwrap();
        assert_ne!(encrypted, plaintext.to_vec());

        decrypt_file(&state_path, &mut reader(b"test password")).unwrap();
        let decrypted = fs::read(&state_path).unwrap();
        assert_eq!(decrypted, plaintext.to_vec());
    }

    #[test]
    fn test_missing_file_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("does-not-exist.tfstate");

        encrypt_file(&state_path, &mut reader(b"test")).unwrap();
        assert!(!state_path.exists(), "encrypt must not create the file");

        decrypt_file(&state_path, &mut reader(b"test")).unwrap();
        assert!(!state_path.exists(), "decrypt must not create the file");
    }

    #[test]
    fn test_encrypted_file_is_armored() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        let plaintext = br#"{"version":4}"#;
        fs::write(&state_path, plaintext).unwrap();
        encrypt_file(&state_path, &mut reader(b"correct-horse")).unwrap();

        // The file content is a single base64 token decoding to at least
        // salt + nonce + plaintext + tag bytes.
        let encrypted = fs::read(&state_path).unwrap();
        let blob = crate::armor::unwrap(&encrypted).unwrap();
        assert_eq!(
            blob.len(),
            crate::secretcrypt::SALT_LEN
                + crate::secretcrypt::NONCE_LEN
                + plaintext.len()
                + crate::secretcrypt::TAG_LEN
        );

        decrypt_file(&state_path, &mut reader(b"correct-horse")).unwrap();
        assert_eq!(fs::read(&state_path).unwrap(), plaintext.to_vec());
    }

    #[test]
    fn test_wrong_passphrase_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        fs::write(&state_path, br#"{"version":4}"#).unwrap();
        encrypt_file(&state_path, &mut reader(b"correct-horse")).unwrap();
        let before = fs::read(&state_path).unwrap();

        let err = decrypt_file(&state_path, &mut reader(b"wrong-horse"))
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));

        let after = fs::read(&state_path).unwrap();
        assert_eq!(before, after, "failed decrypt must not modify the file");
    }

    #[test]
    fn test_tampered_armor_fails_authentication() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        fs::write(&state_path, br#"{"version":4}"#).unwrap();
        encrypt_file(&state_path, &mut reader(b"test")).unwrap();
        let before = fs::read(&state_path).unwrap();

        // Swap the first armor character for a different one from the
        // alphabet: still valid base64, but the decoded salt changes, so
        // the derived key no longer matches and authentication must fail.
        let mut tampered = before.clone();
        tampered[0] = if tampered[0] == b'A' { b'B' } else { b'A' };
        fs::write(&state_path, &tampered).unwrap();

        let err = decrypt_file(&state_path, &mut reader(b"test"))
            .expect_err("tampering went undetected");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(fs::read(&state_path).unwrap(), tampered);
    }

    #[test]
    fn test_garbage_file_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        let garbage: &[u8] = b"this was never encrypted $$";
        fs::write(&state_path, garbage).unwrap();

        let err = decrypt_file(&state_path, &mut reader(b"test"))
            .expect_err("expected format error");
        assert_eq!(err.kind, Some(ErrorKind::EncodingInvalid));
        assert_eq!(fs::read(&state_path).unwrap(), garbage.to_vec());
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        // Valid base64, but far too short to contain salt + nonce + tag.
        fs::write(&state_path, crate::armor::wrap(b"short")).unwrap();

        let err = decrypt_file(&state_path, &mut reader(b"test"))
            .expect_err("expected truncation error");
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_double_encrypt_round_trips() {
        // Encrypting twice without decrypting in between is caller misuse,
        // but it must stay well-defined: the second encrypt treats the
        // armored text as opaque plaintext, and two decrypts undo it.
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        let plaintext = br#"{"version":4}"#;
        fs::write(&state_path, plaintext).unwrap();

        encrypt_file(&state_path, &mut reader(b"test")).unwrap();
        encrypt_file(&state_path, &mut reader(b"test")).unwrap();

        decrypt_file(&state_path, &mut reader(b"test")).unwrap();
        decrypt_file(&state_path, &mut reader(b"test")).unwrap();

        assert_eq!(fs::read(&state_path).unwrap(), plaintext.to_vec());
    }

    #[test]
    fn test_two_encryptions_differ() {
        let temp_dir = TempDir::new().unwrap();
        let path_a = temp_dir.path().join("a.tfstate");
        let path_b = temp_dir.path().join("b.tfstate");

        let plaintext = br#"{"version":4}"#;
        fs::write(&path_a, plaintext).unwrap();
        fs::write(&path_b, plaintext).unwrap();

        encrypt_file(&path_a, &mut reader(b"test")).unwrap();
        encrypt_file(&path_b, &mut reader(b"test")).unwrap();

        // Fresh salt and nonce per call: identical input, distinct output.
        assert_ne!(fs::read(&path_a).unwrap(), fs::read(&path_b).unwrap());
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("empty.tfstate");

        fs::write(&state_path, b"").unwrap();

        encrypt_file(&state_path, &mut reader(b"test")).unwrap();
        assert!(!fs::read(&state_path).unwrap().is_empty());

        decrypt_file(&state_path, &mut reader(b"test")).unwrap();
        assert_eq!(fs::read(&state_path).unwrap(), b"");
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("terraform.tfstate");

        fs::write(&state_path, b"test").unwrap();
        encrypt_file(&state_path, &mut reader(b"test")).unwrap();

        let mode = fs::metadata(&state_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_parent_is_an_error_not_absence() {
        // The guard treats only NotFound as absence. A stat failure caused
        // by permissions must surface instead of silently succeeding.
        let temp_dir = TempDir::new().unwrap();
        let locked_dir = temp_dir.path().join("locked");
        fs::create_dir(&locked_dir).unwrap();
        let state_path = locked_dir.join("terraform.tfstate");
        fs::write(&state_path, b"{}").unwrap();

        let mut perms = fs::metadata(&locked_dir).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(&locked_dir, perms).unwrap();

        let result = encrypt_file(&state_path, &mut reader(b"test"));

        // Restore permissions so TempDir can clean up. Stat of the locked
        // directory itself only needs search permission on its parent.
        let mut perms = fs::metadata(&locked_dir).unwrap().permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&locked_dir, perms).unwrap();

        // Root bypasses permission checks (common in containers); only
        // assert when the restriction actually applied.
        if let Err(err) = result {
            assert_eq!(err.kind, Some(ErrorKind::Io));
        }
    }
}
