// ABOUTME: Forwarding target the bastion connects to on our behalf.
// ABOUTME: Either a TCP host and port or a Unix socket path on the bastion.

use super::ConfigError;
use std::fmt;

/// Transport requested from the SSH server for a forwarded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// `direct-tcpip` channel to a host and port.
    Tcp,
    /// `direct-streamlocal` channel to a Unix socket on the bastion.
    Unix,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Unix => write!(f, "unix"),
        }
    }
}

/// Final service reached through the SSH session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardTarget {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl ForwardTarget {
    pub fn tcp(host: &str, port: u16) -> Result<Self, ConfigError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::InvalidTarget(
                "target host cannot be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(ConfigError::InvalidPort("target port"));
        }
        Ok(ForwardTarget::Tcp {
            host: host.to_string(),
            port,
        })
    }

    pub fn unix(path: &str) -> Result<Self, ConfigError> {
        if path.is_empty() {
            return Err(ConfigError::InvalidTarget(
                "socket path cannot be empty".to_string(),
            ));
        }
        Ok(ForwardTarget::Unix {
            path: path.to_string(),
        })
    }

    pub fn network(&self) -> Network {
        match self {
            ForwardTarget::Tcp { .. } => Network::Tcp,
            ForwardTarget::Unix { .. } => Network::Unix,
        }
    }
}

impl fmt::Display for ForwardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardTarget::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            ForwardTarget::Tcp { host, port } => write!(f, "{host}:{port}"),
            ForwardTarget::Unix { path } => write!(f, "unix:{path}"),
        }
    }
}
