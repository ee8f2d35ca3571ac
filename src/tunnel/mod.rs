// ABOUTME: Outer secure tunnel to the bastion, consumed as an opaque byte stream.
// ABOUTME: Provides the dialer trait plus IAP (gcloud helper) and direct TCP dialers.

mod iap;
mod tcp;

pub use iap::{IapDialer, ProcessStream};
pub use tcp::TcpDialer;

use crate::config::Bastion;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// A reliable, ordered, bidirectional byte stream with no framing.
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Network, authorization and quota failures all land here.
#[derive(Debug, Error)]
pub enum TunnelDialError {
    #[error("failed to start tunnel helper {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tunnel to {bastion} closed before the bastion responded ({status})")]
    ClosedEarly { bastion: String, status: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tunnel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens a connected stream to the bastion's control port.
#[async_trait]
pub trait TunnelDialer: Send + Sync {
    type Stream: DuplexStream;

    async fn dial(&self, bastion: &Bastion) -> Result<Self::Stream, TunnelDialError>;
}
