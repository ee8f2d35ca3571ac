// ABOUTME: Per-connection orchestration: dial, authenticate, open channel, relay.
// ABOUTME: Logs the failing stage and never lets one session affect another.

use std::sync::Arc;

use crate::config::TunnelConfig;
use crate::ssh::SshConnector;
use crate::tunnel::{DuplexStream, TunnelDialer};
use crate::types::SessionId;

use super::error::SessionError;
use super::relay::{RelayEnd, RelayReport};
use super::state::Accepted;
use super::transitions::Session;

/// Shared, read-only machinery every session runs through.
pub struct Pipeline<D, C> {
    config: Arc<TunnelConfig>,
    dialer: D,
    connector: C,
}

impl<D, C> std::fmt::Debug for Pipeline<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("bastion", &self.config.bastion)
            .field("target", &self.config.target)
            .finish()
    }
}

impl<D: TunnelDialer, C: SshConnector> Pipeline<D, C> {
    pub fn new(config: Arc<TunnelConfig>, dialer: D, connector: C) -> Self {
        Self {
            config,
            dialer,
            connector,
        }
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Drive one client connection through the whole stack.
    ///
    /// Every stage must succeed before any byte is relayed. Whatever the
    /// outcome, all handles acquired for this session are closed on return.
    pub async fn run<L: DuplexStream>(
        &self,
        id: SessionId,
        local: L,
    ) -> Result<RelayReport, SessionError> {
        let config = &*self.config;
        let session: Session<Accepted<L>> = Session::accept(id, local, config.setup_timeout);

        let session = session
            .dial(&self.dialer, &config.bastion)
            .await
            .inspect_err(log_failure)?;
        tracing::debug!(bastion = %config.bastion, "tunnel dialed");

        let session = session
            .authenticate(&self.connector, &config.identity)
            .await
            .inspect_err(log_failure)?;
        tracing::debug!(user = config.identity.user(), "SSH session authenticated");

        let session = session
            .open_channel(&config.target)
            .await
            .inspect_err(log_failure)?;
        tracing::debug!(target = %config.target, "channel open, relaying");

        let report = session.relay().await;
        match &report.end {
            RelayEnd::Eof => tracing::info!(
                first_finished = %report.first_finished,
                client_to_remote = report.client_to_remote,
                remote_to_client = report.remote_to_client,
                "session closed"
            ),
            RelayEnd::Error { kind, message } => tracing::warn!(
                first_finished = %report.first_finished,
                client_to_remote = report.client_to_remote,
                remote_to_client = report.remote_to_client,
                ?kind,
                "session closed by relay error: {}",
                message
            ),
        }
        Ok(report)
    }
}

fn log_failure(err: &SessionError) {
    tracing::warn!(stage = %err.stage(), kind = ?err.kind(), "session failed: {}", err);
}
