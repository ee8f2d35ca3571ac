// ABOUTME: Full-duplex byte relay between the client connection and the SSH channel.
// ABOUTME: Both directions run concurrently; the first to finish ends the relay.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::tunnel::DuplexStream;

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToRemote,
    RemoteToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToRemote => write!(f, "client->remote"),
            Direction::RemoteToClient => write!(f, "remote->client"),
        }
    }
}

/// How the first finished direction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// Reader reached end of stream.
    Eof,
    /// Read or write failed.
    Error { kind: io::ErrorKind, message: String },
}

/// Outcome of a relay, produced once the session reaches `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub first_finished: Direction,
    pub end: RelayEnd,
    pub client_to_remote: u64,
    pub remote_to_client: u64,
}

impl RelayReport {
    pub fn is_clean(&self) -> bool {
        self.end == RelayEnd::Eof
    }
}

/// Copy until `reader` hits EOF or either side fails.
async fn pump<R, W>(reader: &mut R, writer: &mut W, transferred: &AtomicU64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        transferred.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Relay until either direction finishes, then hand both streams back for
/// teardown. The unfinished direction is dropped mid-transfer.
pub(crate) async fn relay<L, C>(local: L, channel: C) -> (RelayReport, L, C)
where
    L: DuplexStream,
    C: DuplexStream,
{
    let (mut local_rx, mut local_tx) = tokio::io::split(local);
    let (mut channel_rx, mut channel_tx) = tokio::io::split(channel);
    let up = AtomicU64::new(0);
    let down = AtomicU64::new(0);

    let (first_finished, result) = tokio::select! {
        r = pump(&mut local_rx, &mut channel_tx, &up) => (Direction::ClientToRemote, r),
        r = pump(&mut channel_rx, &mut local_tx, &down) => (Direction::RemoteToClient, r),
    };

    let end = match result {
        Ok(()) => RelayEnd::Eof,
        Err(e) => RelayEnd::Error {
            kind: e.kind(),
            message: e.to_string(),
        },
    };

    let report = RelayReport {
        first_finished,
        end,
        client_to_remote: up.load(Ordering::Relaxed),
        remote_to_client: down.load(Ordering::Relaxed),
    };

    (
        report,
        local_rx.unsplit(local_tx),
        channel_rx.unsplit(channel_tx),
    )
}
