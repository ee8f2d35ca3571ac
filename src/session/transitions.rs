// ABOUTME: Session struct and its state transitions.
// ABOUTME: Each transition consumes self; on failure it tears down everything it owned.

use std::future::Future;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::config::{Bastion, ForwardTarget, SshIdentity};
use crate::ssh::{SshClient, SshConnector};
use crate::tunnel::{DuplexStream, TunnelDialer};
use crate::types::SessionId;

use super::error::{SessionError, Stage};
use super::relay::{self, RelayReport};
use super::state::{Accepted, Authenticated, ChannelOpen, TunnelDialed};

/// Upper bound on each graceful shutdown during teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One client connection, parameterized by how far setup has progressed.
///
/// The state type `S` owns the handles acquired so far, so a handle can only
/// be used in a state where it exists and is released exactly once: either by
/// the failing transition or by `relay()`.
#[derive(Debug)]
pub struct Session<S> {
    pub(crate) id: SessionId,
    pub(crate) setup_timeout: Option<Duration>,
    pub(crate) state: S,
}

impl<S> Session<S> {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Run one setup stage under the optional deadline.
async fn bounded<T, E, F>(
    limit: Option<Duration>,
    stage: Stage,
    fut: F,
    wrap: impl FnOnce(E) -> SessionError,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
{
    let outcome = match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| SessionError::Timeout { stage, after })?,
        None => fut.await,
    };
    outcome.map_err(wrap)
}

/// Shut a stream down (bounded) and drop it.
async fn release<T: DuplexStream>(mut stream: T) {
    match tokio::time::timeout(SHUTDOWN_GRACE, stream.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("shutdown: {}", e),
        Err(_) => tracing::debug!("shutdown did not complete within {:?}", SHUTDOWN_GRACE),
    }
}

// =============================================================================
// Accepted -> TunnelDialed
// =============================================================================

impl<L: DuplexStream> Session<Accepted<L>> {
    pub fn accept(id: SessionId, local: L, setup_timeout: Option<Duration>) -> Self {
        Session {
            id,
            setup_timeout,
            state: Accepted { local },
        }
    }

    /// Dial the secure tunnel to the bastion. Single attempt.
    ///
    /// # Errors
    ///
    /// `SessionError::Dial` or `SessionError::Timeout`; the local connection
    /// has been closed.
    pub async fn dial<D: TunnelDialer>(
        self,
        dialer: &D,
        bastion: &Bastion,
    ) -> Result<Session<TunnelDialed<L, D::Stream>>, SessionError> {
        let Session {
            id,
            setup_timeout,
            state: Accepted { local },
        } = self;

        let dialed = bounded(
            setup_timeout,
            Stage::Dial,
            dialer.dial(bastion),
            |source| SessionError::Dial { source },
        )
        .await;

        match dialed {
            Ok(tunnel) => Ok(Session {
                id,
                setup_timeout,
                state: TunnelDialed { local, tunnel },
            }),
            Err(e) => {
                release(local).await;
                Err(e)
            }
        }
    }
}

// =============================================================================
// TunnelDialed -> Authenticated
// =============================================================================

impl<L: DuplexStream, T: DuplexStream> Session<TunnelDialed<L, T>> {
    /// Run the SSH handshake over the tunnel stream.
    ///
    /// The connector takes ownership of the tunnel; when this fails it has
    /// already released it.
    ///
    /// # Errors
    ///
    /// `SessionError::Authenticate` or `SessionError::Timeout`; the local
    /// connection has been closed.
    pub async fn authenticate<C: SshConnector>(
        self,
        connector: &C,
        identity: &SshIdentity,
    ) -> Result<Session<Authenticated<L, C::Client>>, SessionError> {
        let Session {
            id,
            setup_timeout,
            state: TunnelDialed { local, tunnel },
        } = self;

        let authenticated = bounded(
            setup_timeout,
            Stage::Authenticate,
            connector.authenticate(tunnel, identity),
            |source| SessionError::Authenticate { source },
        )
        .await;

        match authenticated {
            Ok(client) => Ok(Session {
                id,
                setup_timeout,
                state: Authenticated { local, client },
            }),
            Err(e) => {
                release(local).await;
                Err(e)
            }
        }
    }
}

// =============================================================================
// Authenticated -> ChannelOpen
// =============================================================================

impl<L: DuplexStream, K: SshClient> Session<Authenticated<L, K>> {
    /// Ask the bastion to open a forwarded channel to `target`.
    ///
    /// # Errors
    ///
    /// `SessionError::OpenChannel` or `SessionError::Timeout`; the SSH client
    /// (and with it the tunnel) and the local connection have been closed.
    pub async fn open_channel(
        self,
        target: &ForwardTarget,
    ) -> Result<Session<ChannelOpen<L, K>>, SessionError> {
        let Session {
            id,
            setup_timeout,
            state: Authenticated { local, mut client },
        } = self;

        let opened = bounded(
            setup_timeout,
            Stage::OpenChannel,
            client.open_channel(target),
            |source| SessionError::OpenChannel {
                target: target.to_string(),
                source,
            },
        )
        .await;

        match opened {
            Ok(channel) => Ok(Session {
                id,
                setup_timeout,
                state: ChannelOpen {
                    local,
                    client,
                    channel,
                },
            }),
            Err(e) => {
                client.close().await;
                release(local).await;
                Err(e)
            }
        }
    }
}

// =============================================================================
// ChannelOpen -> Closed
// =============================================================================

impl<L: DuplexStream, K: SshClient> Session<ChannelOpen<L, K>> {
    /// Relay bytes in both directions until either side finishes, then close
    /// the channel, the SSH client and the local connection.
    pub async fn relay(self) -> RelayReport {
        let ChannelOpen {
            local,
            mut client,
            channel,
        } = self.state;

        let (report, local, channel) = relay::relay(local, channel).await;

        release(channel).await;
        client.close().await;
        release(local).await;
        report
    }
}
