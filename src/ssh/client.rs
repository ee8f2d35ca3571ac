// ABOUTME: SSH client over an already-connected stream using russh.
// ABOUTME: Handles host key policy, public-key authentication, and forwarded channels.

use super::error::{Error, Result};
use super::traits::{SshClient, SshConnector};
use crate::config::{ForwardTarget, HostKeyPolicy, SshIdentity, TunnelConfig};
use crate::tunnel::DuplexStream;
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::ssh_key::{self, HashAlg};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{ChannelStream, Disconnect};
use std::sync::Arc;
use std::time::Duration;

/// Originator reported in `direct-tcpip` requests.
const ORIGINATOR_ADDRESS: &str = "127.0.0.1";
const ORIGINATOR_PORT: u32 = 0;

/// russh handler enforcing the configured host key policy.
pub(crate) struct TunnelHandler {
    policy: HostKeyPolicy,
    /// Fingerprint of a key we refused, so the caller can report it.
    rejected: Arc<Mutex<Option<String>>>,
}

impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();

        match &self.policy {
            HostKeyPolicy::TrustTunnel => {
                tracing::debug!(%fingerprint, "accepting bastion host key, trusted through tunnel");
                Ok(true)
            }
            HostKeyPolicy::Pinned(expected) => {
                if self.policy.accepts(&fingerprint) {
                    tracing::debug!(%fingerprint, "bastion host key matches pinned fingerprint");
                    Ok(true)
                } else {
                    tracing::warn!(
                        %fingerprint,
                        %expected,
                        "bastion host key does not match pinned fingerprint"
                    );
                    *self.rejected.lock() = Some(fingerprint);
                    Ok(false)
                }
            }
        }
    }
}

/// Performs SSH handshakes over streams handed to it by the tunnel dialer.
#[derive(Clone)]
pub struct RusshConnector {
    config: Arc<Config>,
    policy: HostKeyPolicy,
}

impl std::fmt::Debug for RusshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshConnector")
            .field("policy", &self.policy)
            .field("config", &"<russh::client::Config>")
            .finish()
    }
}

impl RusshConnector {
    /// Connector that verifies bastion host keys with `tunnel`'s policy.
    pub fn from_config(tunnel: &TunnelConfig) -> Self {
        // Idle database connections are normal, so rely on keepalives rather
        // than an inactivity timeout.
        let config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };
        Self::with_config(config, tunnel)
    }

    pub fn with_config(config: Config, tunnel: &TunnelConfig) -> Self {
        Self {
            config: Arc::new(config),
            policy: tunnel.host_key.clone(),
        }
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    type Client = RusshClient;

    async fn authenticate<S>(&self, stream: S, identity: &SshIdentity) -> Result<RusshClient>
    where
        S: DuplexStream,
    {
        let rejected = Arc::new(Mutex::new(None));
        let handler = TunnelHandler {
            policy: self.policy.clone(),
            rejected: Arc::clone(&rejected),
        };

        // On failure russh's session task ends and drops the stream.
        let mut handle = client::connect_stream(Arc::clone(&self.config), stream, handler)
            .await
            .map_err(|e| match rejected.lock().take() {
                Some(fingerprint) => Error::HostKeyRejected { fingerprint },
                None => Error::Handshake(e),
            })?;

        // From here on the handle owns the stream; every failure disconnects it.
        let user = identity.user().to_string();
        let hash_alg = match handle.best_supported_rsa_hash().await {
            Ok(alg) => alg.flatten(),
            Err(source) => {
                disconnect(&handle).await;
                return Err(Error::Authentication { user, source });
            }
        };

        let key = PrivateKeyWithHashAlg::new(Arc::clone(identity.key()), hash_alg);
        match handle.authenticate_publickey(user.as_str(), key).await {
            Ok(result) if result.success() => {
                tracing::debug!(%user, "SSH authentication succeeded");
                Ok(RusshClient {
                    handle,
                    closed: false,
                })
            }
            Ok(_) => {
                disconnect(&handle).await;
                Err(Error::AuthenticationFailed { user })
            }
            Err(source) => {
                disconnect(&handle).await;
                Err(Error::Authentication { user, source })
            }
        }
    }
}

/// One authenticated SSH session, owned by exactly one tunnel session.
pub struct RusshClient {
    handle: Handle<TunnelHandler>,
    closed: bool,
}

impl std::fmt::Debug for RusshClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshClient")
            .field("handle", &"<russh::Handle>")
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl SshClient for RusshClient {
    type Channel = ChannelStream<Msg>;

    async fn open_channel(&self, target: &ForwardTarget) -> Result<ChannelStream<Msg>> {
        let opened = match target {
            ForwardTarget::Tcp { host, port } => {
                self.handle
                    .channel_open_direct_tcpip(
                        host.as_str(),
                        u32::from(*port),
                        ORIGINATOR_ADDRESS,
                        ORIGINATOR_PORT,
                    )
                    .await
            }
            ForwardTarget::Unix { path } => {
                self.handle
                    .channel_open_direct_streamlocal(path.as_str())
                    .await
            }
        };

        match opened {
            Ok(channel) => Ok(channel.into_stream()),
            Err(russh::Error::ChannelOpenFailure(reason)) => Err(Error::ForwardRefused {
                target: target.to_string(),
                reason: format!("{reason:?}"),
            }),
            Err(source) => Err(Error::ForwardFailed {
                target: target.to_string(),
                source,
            }),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        disconnect(&self.handle).await;
    }
}

async fn disconnect(handle: &Handle<TunnelHandler>) {
    if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "en").await {
        // The session may already be gone after a transport failure.
        tracing::debug!("SSH disconnect: {}", e);
    }
}
