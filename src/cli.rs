// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Every input is a flag; there is no configuration file.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tunneler")]
#[command(about = "Local TCP proxy to Cloud SQL through an IAP tunnel and an SSH bastion")]
#[command(version)]
pub struct Cli {
    /// Cloud project of the bastion and the SQL instance
    #[arg(long)]
    pub project: String,

    /// Zone of the bastion VM
    #[arg(long)]
    pub zone: String,

    /// Bastion VM instance name
    #[arg(long)]
    pub instance: String,

    /// Cloud SQL instance name
    #[arg(long)]
    pub sql_instance: String,

    /// User to authenticate as on the bastion
    #[arg(long)]
    pub ssh_user: String,

    /// Private key used for SSH public-key authentication
    #[arg(long)]
    pub ssh_key_file: PathBuf,

    /// Local port to accept client connections on
    #[arg(long, default_value_t = 1433)]
    pub local_port: u16,

    /// Port of the Cloud SQL instance
    #[arg(long, default_value_t = 3307)]
    pub sql_port: u16,

    /// Port of the bastion's SSH daemon
    #[arg(long, default_value_t = tunneler::config::DEFAULT_BASTION_PORT)]
    pub bastion_port: u16,

    /// Local address to bind the listener to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Use this host instead of looking up the instance's primary address
    #[arg(long)]
    pub sql_host: Option<String>,

    /// Forward to this Unix socket on the bastion instead of a TCP address
    #[arg(long, value_name = "PATH", conflicts_with_all = ["sql_host", "sql_port"])]
    pub sql_socket: Option<String>,

    /// Connect to the bastion directly at HOST:PORT instead of through IAP
    #[arg(long, value_name = "HOST:PORT")]
    pub direct_bastion: Option<String>,

    /// Only accept a bastion host key with this fingerprint
    #[arg(long, value_name = "SHA256:...")]
    pub host_key_fingerprint: Option<String>,

    /// Deadline in seconds for each session setup stage (0 disables)
    #[arg(long, default_value_t = 30)]
    pub setup_timeout_secs: u64,

    /// gcloud executable used for IAP tunnels and address lookup
    #[arg(long, default_value = "gcloud")]
    pub gcloud: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
