// ABOUTME: Host key trust policy for the bastion's SSH server.
// ABOUTME: Either trusts the outer tunnel's authentication or pins a SHA-256 fingerprint.

use super::ConfigError;

const FINGERPRINT_PREFIX: &str = "SHA256:";

/// How the SSH layer decides whether to accept the bastion's host key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key. The outer tunnel has already authenticated the
    /// bastion, so no known_hosts lookup is attempted.
    #[default]
    TrustTunnel,
    /// Accept only a key whose SHA-256 fingerprint matches, in the
    /// `SHA256:<base64>` form printed by `ssh-keygen -l`.
    Pinned(String),
}

impl HostKeyPolicy {
    pub fn pinned(fingerprint: &str) -> Result<Self, ConfigError> {
        let fingerprint = fingerprint.trim();
        let digest = fingerprint
            .strip_prefix(FINGERPRINT_PREFIX)
            .ok_or_else(|| ConfigError::InvalidFingerprint(fingerprint.to_string()))?;

        let valid = !digest.is_empty()
            && digest
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
        if !valid {
            return Err(ConfigError::InvalidFingerprint(fingerprint.to_string()));
        }

        Ok(HostKeyPolicy::Pinned(fingerprint.to_string()))
    }

    /// Whether a host key with the given SHA-256 fingerprint is acceptable.
    pub fn accepts(&self, fingerprint: &str) -> bool {
        match self {
            HostKeyPolicy::TrustTunnel => true,
            HostKeyPolicy::Pinned(expected) => {
                // Padding is optional in the base64 form.
                expected.trim_end_matches('=') == fingerprint.trim_end_matches('=')
            }
        }
    }
}
