// ABOUTME: Capability traits for SSH over an already-connected stream.
// ABOUTME: Lets the session pipeline run against russh or test doubles.

use super::error::Result;
use crate::config::{ForwardTarget, SshIdentity};
use crate::tunnel::DuplexStream;
use async_trait::async_trait;

/// Upgrades an opaque duplex stream into an authenticated SSH client.
///
/// Implementations never dial anything themselves. On failure the stream
/// must already be released when the error is returned.
#[async_trait]
pub trait SshConnector: Send + Sync {
    type Client: SshClient;

    async fn authenticate<S>(&self, stream: S, identity: &SshIdentity) -> Result<Self::Client>
    where
        S: DuplexStream;
}

/// An authenticated SSH connection able to open forwarded channels.
#[async_trait]
pub trait SshClient: Send + Sync + 'static {
    type Channel: DuplexStream;

    /// Ask the server to connect to `target` and return the channel.
    ///
    /// A refusal leaves the client and its other channels untouched.
    async fn open_channel(&self, target: &ForwardTarget) -> Result<Self::Channel>;

    /// Disconnect and release the underlying stream. Idempotent.
    async fn close(&mut self);
}
