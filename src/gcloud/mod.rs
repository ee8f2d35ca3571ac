// ABOUTME: Control-plane lookup of a Cloud SQL instance's primary address.
// ABOUTME: Default implementation shells out to `gcloud sql instances describe`.

use crate::types::ResourceName;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("describing instance {instance} failed ({status}): {stderr}")]
    Failed {
        instance: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected instance description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("instance {0} has no PRIMARY address")]
    NoPrimaryAddress(String),
}

/// Resolves a managed database instance to a reachable address.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn primary_address(
        &self,
        project: &ResourceName,
        instance: &ResourceName,
    ) -> Result<String, ResolveError>;
}

/// Subset of the Cloud SQL Admin `DatabaseInstance` resource we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDescription {
    #[serde(default)]
    ip_addresses: Vec<IpMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpMapping {
    #[serde(rename = "type")]
    kind: String,
    ip_address: String,
}

/// Pick the `PRIMARY` address out of an instance description.
pub fn primary_address_from_json(instance: &str, json: &str) -> Result<String, ResolveError> {
    let description: InstanceDescription = serde_json::from_str(json)?;
    description
        .ip_addresses
        .into_iter()
        .find(|ip| ip.kind == "PRIMARY")
        .map(|ip| ip.ip_address)
        .ok_or_else(|| ResolveError::NoPrimaryAddress(instance.to_string()))
}

/// Uses the gcloud CLI and its ambient credentials.
#[derive(Debug, Clone)]
pub struct GcloudCli {
    program: PathBuf,
}

impl GcloudCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

#[async_trait]
impl AddressResolver for GcloudCli {
    async fn primary_address(
        &self,
        project: &ResourceName,
        instance: &ResourceName,
    ) -> Result<String, ResolveError> {
        tracing::debug!(%project, %instance, "describing Cloud SQL instance");
        let output = Command::new(&self.program)
            .args(["sql", "instances", "describe", instance.as_str()])
            .arg(format!("--project={project}"))
            .arg("--format=json")
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                instance: instance.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        primary_address_from_json(instance.as_str(), &String::from_utf8_lossy(&output.stdout))
    }
}
