// ABOUTME: Entry point for the tunneler CLI application.
// ABOUTME: Validates flags, resolves the target, then serves until Ctrl-C.

mod cli;

use clap::Parser;
use cli::Cli;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tunneler::config::{Bastion, ForwardTarget, HostKeyPolicy, SshIdentity, TunnelConfig};
use tunneler::error::Result;
use tunneler::gcloud::{AddressResolver, GcloudCli};
use tunneler::listener::Acceptor;
use tunneler::session::Pipeline;
use tunneler::ssh::{self, RusshConnector};
use tunneler::tunnel::{IapDialer, TcpDialer, TunnelDialer};
use tunneler::types::ResourceName;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("tunneler=debug,russh=info")
    } else {
        EnvFilter::new("tunneler=info,russh=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let bastion = Bastion::new(&cli.project, &cli.zone, &cli.instance, cli.bastion_port)?;
    let sql_instance = ResourceName::new("sql instance", &cli.sql_instance)?;

    let key = ssh::load_private_key(&cli.ssh_key_file)?;
    let identity = SshIdentity::new(&cli.ssh_user, key)?;
    tracing::debug!(?identity, "loaded SSH identity");

    let host_key = match cli.host_key_fingerprint.as_deref() {
        Some(fingerprint) => HostKeyPolicy::pinned(fingerprint)?,
        None => {
            tracing::warn!(
                "bastion host key is not verified; pass --host-key-fingerprint to pin it"
            );
            HostKeyPolicy::TrustTunnel
        }
    };

    let target = match cli.sql_socket.as_deref() {
        Some(path) => ForwardTarget::unix(path)?,
        None => {
            let sql_host = match cli.sql_host {
                Some(host) => host,
                None => {
                    let resolver = GcloudCli::new(&cli.gcloud);
                    resolver
                        .primary_address(&bastion.project, &sql_instance)
                        .await?
                }
            };
            ForwardTarget::tcp(&sql_host, cli.sql_port)?
        }
    };
    let setup_timeout = match cli.setup_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let config = Arc::new(
        TunnelConfig::new(bastion, target, identity)
            .host_key(host_key)
            .setup_timeout(setup_timeout),
    );
    let connector = RusshConnector::from_config(&config);
    let addr = SocketAddr::new(cli.bind_address, cli.local_port);

    match cli.direct_bastion {
        Some(direct) => serve(addr, config, TcpDialer::new(direct), connector).await,
        None => serve(addr, config, IapDialer::new(&cli.gcloud), connector).await,
    }
}

/// Bind, serve until Ctrl-C, then wait for in-flight sessions.
async fn serve<D: TunnelDialer + 'static>(
    addr: SocketAddr,
    config: Arc<TunnelConfig>,
    dialer: D,
    connector: RusshConnector,
) -> Result<()> {
    let acceptor = Acceptor::bind(addr).await?;
    let local = acceptor.local_addr().unwrap_or(addr);
    tracing::info!(
        listen = %local,
        bastion = %config.bastion,
        target = %config.target,
        network = %config.target.network(),
        "forwarding {} to {} via {}",
        local,
        config.target,
        config.bastion.instance
    );

    let pipeline = Arc::new(Pipeline::new(config, dialer, connector));
    let drain = acceptor
        .serve(pipeline, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    let active = drain.active();
    if active > 0 {
        tracing::info!(
            "waiting for {} session(s) to finish, press Ctrl-C again to exit",
            active
        );
        tokio::select! {
            _ = drain.wait() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("exiting with sessions still open");
            }
        }
    }

    tracing::info!("shut down");
    Ok(())
}
