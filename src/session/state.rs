// ABOUTME: Session state marker types for the type state pattern.
// ABOUTME: Each state owns exactly the handles acquired so far.

use crate::ssh::SshClient;

/// Local connection accepted, nothing else acquired.
/// Available actions: `dial()`
#[derive(Debug)]
pub struct Accepted<L> {
    pub(crate) local: L,
}

/// Secure tunnel to the bastion is up.
/// Available actions: `authenticate()`
#[derive(Debug)]
pub struct TunnelDialed<L, T> {
    pub(crate) local: L,
    pub(crate) tunnel: T,
}

/// SSH session authenticated over the tunnel. The client owns the tunnel.
/// Available actions: `open_channel()`
#[derive(Debug)]
pub struct Authenticated<L, K> {
    pub(crate) local: L,
    pub(crate) client: K,
}

/// Forwarded channel to the target is open.
/// Available actions: `relay()`
pub struct ChannelOpen<L, K: SshClient> {
    pub(crate) local: L,
    pub(crate) client: K,
    pub(crate) channel: K::Channel,
}
