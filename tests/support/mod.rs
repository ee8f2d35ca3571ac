// ABOUTME: Test support utilities.
// ABOUTME: Fake dialer and SSH layer whose streams record call order and releases.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Once};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, duplex};
use tunneler::config::{Bastion, ForwardTarget, SshIdentity, TunnelConfig};
use tunneler::session::Pipeline;
use tunneler::ssh::{self, SshClient, SshConnector};
use tunneler::tunnel::{DuplexStream, TunnelDialError, TunnelDialer};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("tunneler=debug".parse().unwrap())
            .add_directive("russh=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn identity() -> SshIdentity {
    let key = ssh::load_private_key(fixture("client_ed25519")).unwrap();
    SshIdentity::new("tunnel", key).unwrap()
}

#[allow(dead_code)]
pub fn tunnel_config(setup_timeout: Option<Duration>) -> Arc<TunnelConfig> {
    let bastion = Bastion::new("demo-project", "us-central1-a", "bastion-1", 22).unwrap();
    let target = ForwardTarget::tcp("10.20.0.3", 3307).unwrap();
    Arc::new(TunnelConfig::new(bastion, target, identity()).setup_timeout(setup_timeout))
}

pub type FakePipeline = Pipeline<FakeDialer, FakeConnector>;

/// Pipeline whose dials follow `plans` in call order, then default to healthy.
#[allow(dead_code)]
pub fn fake_pipeline(
    plans: impl IntoIterator<Item = Plan>,
    setup_timeout: Option<Duration>,
) -> (Arc<FakePipeline>, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let pipeline = Pipeline::new(
        tunnel_config(setup_timeout),
        FakeDialer::new(plans, &log),
        FakeConnector::new(&log),
    );
    (Arc::new(pipeline), log)
}

// =============================================================================
// Event log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Local,
    Tunnel,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Dial,
    Authenticate,
    OpenChannel,
    /// First byte written into the resource.
    FirstWrite(Resource),
    /// One `SshClient::close` call.
    ClientClosed,
    Released(Resource),
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: Event) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }

    pub fn position(&self, event: Event) -> Option<usize> {
        self.events.lock().iter().position(|e| *e == event)
    }
}

// =============================================================================
// Plans
// =============================================================================

/// What a fake session does at each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Healthy,
    FailDial,
    StallDial,
    FailAuth,
    StallAuth,
    FailChannel,
    StallChannel,
    /// Channel opens, then the remote end hangs up without sending anything.
    Hangup,
}

const PLANS: [Plan; 8] = [
    Plan::Healthy,
    Plan::FailDial,
    Plan::StallDial,
    Plan::FailAuth,
    Plan::StallAuth,
    Plan::FailChannel,
    Plan::StallChannel,
    Plan::Hangup,
];

impl Plan {
    fn tag(self) -> u8 {
        self as u8
    }

    fn from_tag(tag: u8) -> Plan {
        PLANS.get(tag as usize).copied().unwrap_or(Plan::Healthy)
    }
}

// =============================================================================
// Tracked stream
// =============================================================================

/// In-memory stream that logs its first write and its drop.
pub struct Tracked {
    io: tokio::io::DuplexStream,
    resource: Resource,
    log: Arc<EventLog>,
    wrote: bool,
}

impl Tracked {
    pub fn new(io: tokio::io::DuplexStream, resource: Resource, log: &Arc<EventLog>) -> Self {
        Self {
            io,
            resource,
            log: Arc::clone(log),
            wrote: false,
        }
    }
}

/// A client connection: the test keeps the first half, the session gets the second.
#[allow(dead_code)]
pub fn local_pair(log: &Arc<EventLog>) -> (tokio::io::DuplexStream, Tracked) {
    let (client, local) = duplex(64 * 1024);
    (client, Tracked::new(local, Resource::Local, log))
}

impl AsyncRead for Tracked {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tracked {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.io).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &polled {
            if *n > 0 && !this.wrote {
                this.wrote = true;
                this.log.record(Event::FirstWrite(this.resource));
            }
        }
        polled
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.record(Event::Released(self.resource));
    }
}

// =============================================================================
// Fake dialer
// =============================================================================

pub struct FakeDialer {
    plans: Mutex<VecDeque<Plan>>,
    log: Arc<EventLog>,
}

impl FakeDialer {
    pub fn new(plans: impl IntoIterator<Item = Plan>, log: &Arc<EventLog>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().collect()),
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl TunnelDialer for FakeDialer {
    type Stream = Tracked;

    async fn dial(&self, _bastion: &Bastion) -> Result<Tracked, TunnelDialError> {
        self.log.record(Event::Dial);
        let plan = self.plans.lock().pop_front().unwrap_or(Plan::Healthy);

        match plan {
            Plan::FailDial => Err(TunnelDialError::Connect {
                addr: "bastion.fake:22".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            Plan::StallDial => std::future::pending().await,
            plan => {
                // The fake bastion "speaks first" with the plan tag.
                let (tunnel, mut bastion) = duplex(64);
                bastion.write_u8(plan.tag()).await?;
                Ok(Tracked::new(tunnel, Resource::Tunnel, &self.log))
            }
        }
    }
}

// =============================================================================
// Fake SSH layer
// =============================================================================

pub struct FakeConnector {
    log: Arc<EventLog>,
}

impl FakeConnector {
    pub fn new(log: &Arc<EventLog>) -> Self {
        Self {
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl SshConnector for FakeConnector {
    type Client = FakeClient;

    async fn authenticate<S>(&self, mut stream: S, identity: &SshIdentity) -> ssh::Result<FakeClient>
    where
        S: DuplexStream,
    {
        self.log.record(Event::Authenticate);
        let tag = stream
            .read_u8()
            .await
            .map_err(|e| ssh::Error::Handshake(russh::Error::from(e)))?;
        let plan = Plan::from_tag(tag);

        match plan {
            Plan::FailAuth => {
                drop(stream);
                return Err(ssh::Error::AuthenticationFailed {
                    user: identity.user().to_string(),
                });
            }
            Plan::StallAuth => std::future::pending().await,
            _ => {}
        }

        Ok(FakeClient {
            plan,
            tunnel: Mutex::new(Some(Box::new(stream))),
            log: Arc::clone(&self.log),
        })
    }
}

pub struct FakeClient {
    plan: Plan,
    tunnel: Mutex<Option<Box<dyn DuplexStream>>>,
    log: Arc<EventLog>,
}

#[async_trait]
impl SshClient for FakeClient {
    type Channel = Tracked;

    async fn open_channel(&self, target: &ForwardTarget) -> ssh::Result<Tracked> {
        self.log.record(Event::OpenChannel);

        match self.plan {
            Plan::FailChannel => Err(ssh::Error::ForwardRefused {
                target: target.to_string(),
                reason: "ConnectFailed".to_string(),
            }),
            Plan::StallChannel => std::future::pending().await,
            Plan::Hangup => {
                let (channel, remote) = duplex(1024);
                drop(remote);
                Ok(Tracked::new(channel, Resource::Channel, &self.log))
            }
            _ => {
                let (channel, remote) = duplex(64 * 1024);
                tokio::spawn(echo(remote));
                Ok(Tracked::new(channel, Resource::Channel, &self.log))
            }
        }
    }

    /// Every call is logged; only the first one releases the tunnel.
    async fn close(&mut self) {
        self.log.record(Event::ClientClosed);
        let tunnel = self.tunnel.lock().take();
        drop(tunnel);
    }
}

/// Remote database stand-in: echoes everything back.
async fn echo(remote: tokio::io::DuplexStream) {
    let (mut reader, mut writer) = tokio::io::split(remote);
    let _ = tokio::io::copy(&mut reader, &mut writer).await;
}
