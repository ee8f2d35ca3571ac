// ABOUTME: IAP tunnel dialer backed by `gcloud compute start-iap-tunnel --listen-on-stdin`.
// ABOUTME: The helper's stdin/stdout pair becomes the duplex stream to the bastion.

use super::{TunnelDialError, TunnelDialer};
use crate::config::Bastion;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, ReadBuf};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Dials the bastion through Identity-Aware Proxy using the gcloud CLI.
#[derive(Debug, Clone)]
pub struct IapDialer {
    program: PathBuf,
}

impl IapDialer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the helper for a given bastion.
    pub fn args(bastion: &Bastion) -> Vec<String> {
        vec![
            "compute".to_string(),
            "start-iap-tunnel".to_string(),
            bastion.instance.to_string(),
            bastion.port.to_string(),
            "--listen-on-stdin".to_string(),
            format!("--project={}", bastion.project),
            format!("--zone={}", bastion.zone),
            "--verbosity=warning".to_string(),
        ]
    }
}

impl Default for IapDialer {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

#[async_trait]
impl TunnelDialer for IapDialer {
    type Stream = ProcessStream;

    async fn dial(&self, bastion: &Bastion) -> Result<ProcessStream, TunnelDialError> {
        let mut child = Command::new(&self.program)
            .args(Self::args(bastion))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelDialError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("tunnel helper stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("tunnel helper stdout not captured"))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(stderr, bastion.to_string());
        }

        // The SSH server speaks first. Waiting for its first byte turns an
        // unauthorized or unreachable tunnel into a dial failure.
        let mut stdout = BufReader::new(stdout);
        let closed = stdout.fill_buf().await?.is_empty();
        if closed {
            let status = match child.wait().await {
                Ok(status) => status.to_string(),
                Err(e) => e.to_string(),
            };
            return Err(TunnelDialError::ClosedEarly {
                bastion: bastion.to_string(),
                status,
            });
        }

        tracing::debug!(%bastion, pid = ?child.id(), "IAP tunnel established");
        Ok(ProcessStream {
            child,
            stdin,
            stdout,
        })
    }
}

fn forward_stderr(stderr: ChildStderr, bastion: String) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(%bastion, "tunnel helper: {}", line);
        }
    });
}

/// A child process's stdout and stdin joined into one duplex stream.
///
/// The child is killed when the stream is dropped.
#[derive(Debug)]
pub struct ProcessStream {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProcessStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stdin).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_shutdown(cx)
    }
}
