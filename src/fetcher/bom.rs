/// Bill-of-materials cluster list strategy
///
/// Clusters come from a pre-enumerated evidence document with direct
/// kubeconfig access; no cloud login is involved. A failed resource query
/// aborts the whole strategy rather than just the affected cluster.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::FetcherConfig;
use crate::evidence::{EvidenceLocker, BOM_CLUSTER_LIST};
use crate::utils::command::CommandBuilder;

use super::{resource_items, AccountClusters, ClusterListStrategy, ClusterResources};

/// Entry of the BOM cluster list evidence document
#[derive(Debug, Clone, Deserialize)]
pub struct BomCluster {
    pub account: String,
    pub name: String,
    pub kubeconfig: PathBuf,
}

/// Collects resources from BOM-listed clusters
pub struct BomStrategy {
    resource_types: Vec<String>,
    locker: EvidenceLocker,
}

impl BomStrategy {
    /// Create the strategy from configuration
    pub fn new(config: &FetcherConfig, locker: &EvidenceLocker) -> Self {
        Self {
            resource_types: config.resource_types("kubernetes"),
            locker: locker.clone(),
        }
    }

    async fn query_cluster(&self, cluster: &BomCluster) -> Result<Vec<serde_json::Value>> {
        let mut cluster_resources = Vec::new();
        for resource_type in &self.resource_types {
            let stdout = CommandBuilder::new("kubectl")
                .arg("--kubeconfig")
                .arg(&cluster.kubeconfig)
                .args(["get", resource_type, "-A", "-o", "json"])
                .run()
                .await
                .with_context(|| {
                    format!(
                        "Failed to get {} resources from cluster {}",
                        resource_type, cluster.name
                    )
                })?;
            cluster_resources.extend(resource_items(&stdout)?);
        }
        Ok(cluster_resources)
    }
}

#[async_trait]
impl ClusterListStrategy for BomStrategy {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn collect(&self) -> Result<AccountClusters> {
        let bom: Vec<BomCluster> = self.locker.read_json(BOM_CLUSTER_LIST).await?;

        let mut resources = AccountClusters::new();
        for cluster in &bom {
            info!(
                "Collecting resources from cluster {} (account {})",
                cluster.name, cluster.account
            );

            let cluster_resources = self.query_cluster(cluster).await?;

            // One cluster entry per account; a later BOM entry for the same
            // account replaces the earlier one.
            resources.insert(
                cluster.account.clone(),
                vec![ClusterResources {
                    name: cluster.name.clone(),
                    cluster_type: None,
                    resources: cluster_resources,
                }],
            );
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_cluster_deserialization() {
        let entry: BomCluster = serde_json::from_str(
            r#"{"account": "acct1", "name": "c1", "kubeconfig": "/tmp/kubeconfig-c1"}"#,
        )
        .unwrap();
        assert_eq!(entry.account, "acct1");
        assert_eq!(entry.name, "c1");
        assert_eq!(entry.kubeconfig, PathBuf::from("/tmp/kubeconfig-c1"));
    }

    #[tokio::test]
    async fn test_missing_cluster_list_fails_the_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());
        let config = FetcherConfig::example();

        let strategy = BomStrategy::new(&config, &locker);
        assert!(strategy.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_cluster_list_yields_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());
        locker
            .store_json(BOM_CLUSTER_LIST, &serde_json::json!([]))
            .await
            .unwrap();

        let config = FetcherConfig::example();
        let strategy = BomStrategy::new(&config, &locker);

        let resources = strategy.collect().await.unwrap();
        assert!(resources.is_empty());
    }
}
