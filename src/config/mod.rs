// ABOUTME: Immutable tunnel configuration built once at startup.
// ABOUTME: Shared read-only across every session through an Arc.

mod host_key;
mod identity;
mod target;

pub use host_key::HostKeyPolicy;
pub use identity::SshIdentity;
pub use target::{ForwardTarget, Network};

use crate::types::{ResourceName, ResourceNameError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASTION_PORT: u16 = 22;
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Name(#[from] ResourceNameError),

    #[error("{0} must be between 1 and 65535")]
    InvalidPort(&'static str),

    #[error("invalid forwarding target: {0}")]
    InvalidTarget(String),

    #[error("invalid host key fingerprint {0:?}: expected SHA256:<base64>")]
    InvalidFingerprint(String),
}

/// Coordinates of the bastion VM the secure tunnel lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bastion {
    pub project: ResourceName,
    pub zone: ResourceName,
    pub instance: ResourceName,
    /// Port on the bastion the tunnel connects to (its SSH daemon).
    pub port: u16,
}

impl Bastion {
    pub fn new(project: &str, zone: &str, instance: &str, port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort("bastion port"));
        }
        Ok(Self {
            project: ResourceName::new("project", project)?,
            zone: ResourceName::new("zone", zone)?,
            instance: ResourceName::new("instance", instance)?,
            port,
        })
    }
}

impl fmt::Display for Bastion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} in {}/{}",
            self.instance, self.port, self.project, self.zone
        )
    }
}

/// Everything a session needs, validated up front.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub bastion: Bastion,
    pub target: ForwardTarget,
    pub identity: SshIdentity,
    pub host_key: HostKeyPolicy,
    /// Deadline for each setup stage. `None` waits indefinitely.
    pub setup_timeout: Option<Duration>,
}

impl TunnelConfig {
    pub fn new(bastion: Bastion, target: ForwardTarget, identity: SshIdentity) -> Self {
        Self {
            bastion,
            target,
            identity,
            host_key: HostKeyPolicy::default(),
            setup_timeout: Some(DEFAULT_SETUP_TIMEOUT),
        }
    }

    pub fn host_key(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key = policy;
        self
    }

    pub fn setup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.setup_timeout = timeout;
        self
    }
}
