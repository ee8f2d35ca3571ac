// ABOUTME: Direct TCP dialer for bastions reachable without IAP.
// ABOUTME: Ignores bastion coordinates and connects to a fixed address.

use super::{TunnelDialError, TunnelDialer};
use crate::config::Bastion;
use async_trait::async_trait;
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
}

impl TcpDialer {
    /// `addr` is anything `TcpStream::connect` resolves, e.g. `bastion.internal:22`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl TunnelDialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, bastion: &Bastion) -> Result<TcpStream, TunnelDialError> {
        tracing::debug!(addr = %self.addr, %bastion, "dialing bastion directly");
        let stream = TcpStream::connect(self.addr.as_str())
            .await
            .map_err(|source| TunnelDialError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
