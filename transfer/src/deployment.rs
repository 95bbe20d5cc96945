//! Deployment artifacts
//!
//! Contract addresses and deployment blocks per chain, read from the
//! `*.deployment.json` files written by the contract deployment tooling.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const ARTIFACT_SUFFIX: &str = ".deployment.json";

/// A single deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContractInfo {
    pub address: String,
    #[serde(default)]
    pub deployment_block: u64,
}

/// chain id -> contract name -> contract info
pub type DeploymentInfo = HashMap<u64, HashMap<String, ContractInfo>>;

#[derive(Debug, Deserialize)]
struct DeploymentArtifact {
    #[serde(default)]
    chain: Option<ChainDeployment>,
}

#[derive(Debug, Deserialize)]
struct ChainDeployment {
    chain_id: u64,
    #[serde(default)]
    contracts: HashMap<String, ContractInfo>,
}

/// Loads every `*.deployment.json` artifact in `artifacts_dir`.
///
/// Artifacts without a `chain` section (base-layer-only deployments) are skipped.
pub fn load_deployment_info(artifacts_dir: &Path) -> Result<DeploymentInfo> {
    let entries = std::fs::read_dir(artifacts_dir).with_context(|| {
        format!("Failed to read artifacts directory {}", artifacts_dir.display())
    })?;

    let mut deployment_info = DeploymentInfo::new();
    for entry in entries {
        let path = entry?.path();
        let is_artifact = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(ARTIFACT_SUFFIX))
            .unwrap_or(false);
        if !is_artifact {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: DeploymentArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        match artifact.chain {
            Some(chain) => {
                debug!(
                    "Loaded {} contracts for chain {} from {}",
                    chain.contracts.len(),
                    chain.chain_id,
                    path.display()
                );
                deployment_info.insert(chain.chain_id, chain.contracts);
            }
            None => debug!("Skipping {}: no chain deployment", path.display()),
        }
    }

    info!(
        "Loaded deployment info for {} chain(s) from {}",
        deployment_info.len(),
        artifacts_dir.display()
    );
    Ok(deployment_info)
}
