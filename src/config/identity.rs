// ABOUTME: SSH principal plus the private key it signs with.
// ABOUTME: Debug output shows the key's fingerprint, never its material.

use super::ConfigError;
use crate::types::ResourceName;
use russh::keys::PrivateKey;
use russh::keys::ssh_key::HashAlg;
use std::fmt;
use std::sync::Arc;

/// Who we authenticate as on the bastion.
#[derive(Clone)]
pub struct SshIdentity {
    user: ResourceName,
    key: Arc<PrivateKey>,
}

impl SshIdentity {
    pub fn new(user: &str, key: PrivateKey) -> Result<Self, ConfigError> {
        Ok(Self {
            user: ResourceName::new("ssh user", user)?,
            key: Arc::new(key),
        })
    }

    pub fn user(&self) -> &str {
        self.user.as_str()
    }

    pub fn key(&self) -> &Arc<PrivateKey> {
        &self.key
    }

    /// SHA-256 fingerprint of the public half, for logs.
    pub fn fingerprint(&self) -> String {
        self.key.public_key().fingerprint(HashAlg::Sha256).to_string()
    }
}

impl fmt::Debug for SshIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshIdentity")
            .field("user", &self.user)
            .field("key", &self.fingerprint())
            .finish()
    }
}
