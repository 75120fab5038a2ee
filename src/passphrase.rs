//! Passphrase acquisition
//!
//! The passphrase is never accepted as a command-line argument (it would be
//! visible in process listings). The primary source is the
//! `TFSTATE_PASSPHRASE` environment variable; stdin and an interactive
//! no-echo terminal prompt are available as alternatives.

use std::env;
use std::io::{self, IsTerminal, Read, Write};

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, StateboxError};

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads the passphrase from an environment variable.
///
/// An unset or empty variable is a configuration error, reported
/// immediately; nothing in statebox falls back to another source.
pub struct EnvPassphraseReader {
    var: String,
}

impl EnvPassphraseReader {
    /// The variable consulted by default.
    pub const DEFAULT_VAR: &'static str = "TFSTATE_PASSPHRASE";

    pub fn new() -> Self {
        Self::from_var(Self::DEFAULT_VAR)
    }

    /// Reads from a caller-chosen variable instead of [`Self::DEFAULT_VAR`].
    pub fn from_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for EnvPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value.into_bytes())),
            Ok(_) | Err(env::VarError::NotPresent) => Err(StateboxError::new(
                ErrorCategory::User,
                format!("passphrase not set in {} environment variable", self.var),
            )
            .kind(ErrorKind::PassphraseUnavailable)),
            Err(e @ env::VarError::NotUnicode(_)) => Err(StateboxError::new(
                ErrorCategory::User,
                format!("{} environment variable is not valid unicode", self.var),
            )
            .kind(ErrorKind::PassphraseUnavailable)
            .because(e)),
        }
    }
}

/// Reads passphrase from any io::Read source
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            StateboxError::new(
                ErrorCategory::Internal,
                format!("error reading passphrase: {e}"),
            )
            .kind(ErrorKind::Io)
            .because(e)
        })?;
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library
    /// constraints. For non-UTF-8 passphrases, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(StateboxError::new(
                ErrorCategory::User,
                "cannot read passphrase from terminal - stdin is not a terminal",
            )
            .kind(ErrorKind::PassphraseUnavailable));
        }

        io::stderr()
            .write_all(b"Passphrase (statebox): ")
            .and_then(|()| io::stderr().flush())
            .map_err(|e| {
                StateboxError::new(
                    ErrorCategory::Internal,
                    format!("failed to write prompt: {e}"),
                )
                .kind(ErrorKind::Io)
                .because(e)
            })?;

        // Read password *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let passphrase = rpassword::read_password().map_err(|e| {
            StateboxError::new(
                ErrorCategory::Internal,
                format!("failure reading passphrase: {e}"),
            )
            .kind(ErrorKind::PassphraseUnavailable)
            .because(e)
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}
