// ABOUTME: Local TCP acceptor that spawns one independent session per connection.
// ABOUTME: Transient accept errors are logged; shutdown closes the listener and returns a drain handle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::error::{Result, StartupError};
use crate::session::Pipeline;
use crate::ssh::SshConnector;
use crate::tunnel::TunnelDialer;
use crate::types::SessionIds;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Acceptor {
    listener: TcpListener,
    ids: SessionIds,
}

impl Acceptor {
    /// Bind the local listening socket.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Bind` if the address is unavailable.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        Ok(Self {
            listener,
            ids: SessionIds::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Each connection runs in its own task; this loop never waits on one.
    /// When `shutdown` fires the listener is closed and the returned `Drain`
    /// tracks the sessions still in flight.
    pub async fn serve<D, C, F>(self, pipeline: Arc<Pipeline<D, C>>, shutdown: F) -> Drain
    where
        D: TunnelDialer + 'static,
        C: SshConnector + 'static,
        F: Future<Output = ()>,
    {
        let (drain_tx, drain_rx) = mpsc::channel::<()>(1);
        let active = Arc::new(AtomicUsize::new(0));
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            let id = self.ids.next_id();
            let guard = InFlight::new(drain_tx.clone(), Arc::clone(&active));
            let pipeline = Arc::clone(&pipeline);
            let span = tracing::info_span!("session", %id, %peer);

            tokio::spawn(
                async move {
                    let _guard = guard;
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("set_nodelay: {}", e);
                    }
                    tracing::info!("accepted connection");
                    // Failures are logged inside the pipeline.
                    let _ = pipeline.run(id, stream).await;
                }
                .instrument(span),
            );
        }

        tracing::info!("listener closed, no new sessions will start");
        Drain {
            done: drain_rx,
            active,
        }
    }
}

/// Held by every running session task.
struct InFlight {
    _drain: mpsc::Sender<()>,
    active: Arc<AtomicUsize>,
}

impl InFlight {
    fn new(drain: mpsc::Sender<()>, active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            _drain: drain,
            active,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sessions still running after the listener closed.
pub struct Drain {
    done: mpsc::Receiver<()>,
    active: Arc<AtomicUsize>,
}

impl Drain {
    /// Number of sessions still in flight.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolves once every session spawned by the acceptor has finished.
    pub async fn wait(mut self) {
        // Every sender lives in a session task; recv yields None once all are gone.
        let _ = self.done.recv().await;
    }
}
