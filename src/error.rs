// ABOUTME: Fatal startup errors for tunneler.
// ABOUTME: Any of these ends the process before or instead of serving.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;
use crate::gcloud::ResolveError;
use crate::ssh;
use crate::types::ResourceNameError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] ssh::Error),

    #[error("failed to resolve Cloud SQL instance address: {0}")]
    Resolve(#[from] ResolveError),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl From<ResourceNameError> for StartupError {
    fn from(err: ResourceNameError) -> Self {
        StartupError::Config(ConfigError::Name(err))
    }
}

pub type Result<T> = std::result::Result<T, StartupError>;
