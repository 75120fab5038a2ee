//! Error type shared by all statebox operations.
//!
//! Every failure carries a broad [`ErrorCategory`], an optional
//! machine-checkable [`ErrorKind`], and the originating source error when
//! one exists. Callers branching on failures must tolerate a missing kind.

use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// A failure that cannot be confidently attributed to user action.
    /// Use of Internal is never a guarantee that the error is not, in
    /// fact, caused by the user - merely that the code cannot tell.
    Internal,

    /// The user provided invalid input or requested something impossible.
    User,
}

/// Fine-grained condition tags for consumers that branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The passphrase could not be obtained from the configured source
    /// (unset environment variable, unreadable stdin, no terminal).
    PassphraseUnavailable,
    /// Base64 decoding of the on-disk blob failed.
    EncodingInvalid,
    /// The decoded blob ended before salt, nonce, and tag could be read.
    TruncatedInput,
    /// AEAD authentication failed: wrong passphrase, tampering, or corruption.
    AuthenticationFailed,
    /// AES-GCM failed to seal, or the cipher could not be constructed.
    CipherFailure,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct StateboxError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional condition tag. Absent when no specific kind applies.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl StateboxError {
    /// Creates a new error with a required category and display message.
    /// Tag and source are attached with [`kind`](Self::kind) and
    /// [`because`](Self::because).
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Tags the error with a condition kind.
    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attaches the originating source error.
    pub fn because(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Wraps the error with a higher-level message, keeping the original
    /// as source and preserving its category and kind tag.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        Self {
            category: self.category,
            kind: self.kind,
            msg: msg.into(),
            source: Some(Box::new(self)),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Renders the message followed by each source in the chain,
    /// ": "-separated. Intended for one-line CLI diagnostics.
    pub fn render_chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut cur = StdError::source(self);
        while let Some(err) = cur {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cur = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StateboxError>;
