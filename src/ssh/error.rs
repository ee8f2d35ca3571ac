// ABOUTME: SSH-specific error types.
// ABOUTME: Covers handshake, host key, authentication, forwarding, and key loading failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SSH handshake failed: {0}")]
    Handshake(#[source] russh::Error),

    #[error("host key {fingerprint} rejected by pinned fingerprint")]
    HostKeyRejected { fingerprint: String },

    #[error("authentication failed for user {user}: key rejected by server")]
    AuthenticationFailed { user: String },

    #[error("authentication error for user {user}: {source}")]
    Authentication {
        user: String,
        #[source]
        source: russh::Error,
    },

    #[error("server refused forwarding to {target}: {reason}")]
    ForwardRefused { target: String, reason: String },

    #[error("forwarding to {target} failed: {source}")]
    ForwardFailed {
        target: String,
        #[source]
        source: russh::Error,
    },

    #[error("failed to read key from {path}: {source}")]
    KeyLoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse private key {path}: {source}")]
    KeyParse {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },
}

/// Failure category, aligned with the stages a session reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed framing or key exchange failure.
    Protocol,
    /// Host key or credential rejected.
    Auth,
    /// Server would not or could not open the forwarded channel.
    Forward,
    /// Local credential could not be loaded.
    Credential,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Handshake(_) => ErrorKind::Protocol,
            Error::HostKeyRejected { .. }
            | Error::AuthenticationFailed { .. }
            | Error::Authentication { .. } => ErrorKind::Auth,
            Error::ForwardRefused { .. } | Error::ForwardFailed { .. } => ErrorKind::Forward,
            Error::KeyLoadFailed { .. } | Error::KeyParse { .. } => ErrorKind::Credential,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
