// ABOUTME: Session error types with SNAFU pattern.
// ABOUTME: Each variant names the setup stage that failed for log attribution.

use std::fmt;
use std::time::Duration;

use snafu::Snafu;

use crate::ssh;
use crate::tunnel::TunnelDialError;

/// Setup stages of a session, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dial,
    Authenticate,
    OpenChannel,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Dial => write!(f, "tunnel dial"),
            Stage::Authenticate => write!(f, "SSH authentication"),
            Stage::OpenChannel => write!(f, "channel open"),
        }
    }
}

/// Session-scoped failure. Never crosses into other sessions.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    #[snafu(display("tunnel dial failed: {source}"))]
    Dial { source: TunnelDialError },

    #[snafu(display("SSH authentication failed: {source}"))]
    Authenticate { source: ssh::Error },

    #[snafu(display("opening channel to {target} failed: {source}"))]
    OpenChannel { target: String, source: ssh::Error },

    #[snafu(display("{stage} timed out after {after:?}"))]
    Timeout { stage: Stage, after: Duration },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Bastion unreachable or caller unauthorized.
    TunnelDial,
    /// Host key or credential rejected.
    Auth,
    /// Malformed SSH framing or key exchange failure.
    Protocol,
    /// Server refused or could not reach the target.
    Forward,
    /// A setup stage exceeded its deadline.
    Timeout,
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::Dial { .. } => SessionErrorKind::TunnelDial,
            SessionError::Authenticate { source } => match source.kind() {
                ssh::ErrorKind::Protocol => SessionErrorKind::Protocol,
                _ => SessionErrorKind::Auth,
            },
            SessionError::OpenChannel { .. } => SessionErrorKind::Forward,
            SessionError::Timeout { .. } => SessionErrorKind::Timeout,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            SessionError::Dial { .. } => Stage::Dial,
            SessionError::Authenticate { .. } => Stage::Authenticate,
            SessionError::OpenChannel { .. } => Stage::OpenChannel,
            SessionError::Timeout { stage, .. } => *stage,
        }
    }
}
