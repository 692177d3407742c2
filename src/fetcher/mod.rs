/// Cluster resource collection
///
/// Each cluster list strategy enumerates clusters its own way, logs into
/// them, and runs the configured read-only resource queries. The fetcher
/// dispatches to strategies by name and aggregates whatever they return;
/// a failing strategy never aborts the others.
pub mod bom;
pub mod ibm_cloud;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::error;

use crate::config::FetcherConfig;
use crate::evidence::EvidenceLocker;

pub use bom::BomStrategy;
pub use ibm_cloud::IbmCloudStrategy;

/// Resources collected from a single cluster.
///
/// The `type` field is only present for clusters discovered through a cloud
/// provider; BOM-listed clusters do not carry one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResources {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,
    pub resources: Vec<Value>,
}

/// Clusters and their resources, keyed by account name.
pub type AccountClusters = BTreeMap<String, Vec<ClusterResources>>;

/// A cluster enumeration method.
///
/// `collect` queries every cluster the strategy knows about and reports
/// results per account. An error return means the strategy produced no data
/// at all; partial tolerance below the strategy level is each strategy's
/// own business.
#[async_trait]
pub trait ClusterListStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self) -> Result<AccountClusters>;
}

/// Extract the `items` array from `kubectl get -o json` output.
pub(crate) fn resource_items(stdout: &str) -> Result<Vec<Value>> {
    #[derive(Deserialize)]
    struct ResourceList {
        items: Vec<Value>,
    }

    let list: ResourceList =
        serde_json::from_str(stdout).context("kubectl returned malformed resource JSON")?;
    Ok(list.items)
}

/// Fetches cluster resources through the registered cluster list strategies
pub struct ClusterResourceFetcher {
    strategies: HashMap<&'static str, Box<dyn ClusterListStrategy>>,
}

impl ClusterResourceFetcher {
    /// Create a fetcher with the built-in strategies
    pub fn new(config: &FetcherConfig, locker: &EvidenceLocker) -> Self {
        Self::with_strategies(vec![
            Box::new(BomStrategy::new(config, locker)),
            Box::new(IbmCloudStrategy::new(config, locker)),
        ])
    }

    /// Create a fetcher with an explicit strategy set
    pub fn with_strategies(strategies: Vec<Box<dyn ClusterListStrategy>>) -> Self {
        Self {
            strategies: strategies.into_iter().map(|s| (s.name(), s)).collect(),
        }
    }

    /// Collect resources for every requested cluster list type.
    ///
    /// Unrecognized names and failing strategies are logged and skipped, so
    /// the returned mapping holds exactly the strategies that succeeded. A
    /// strategy that succeeded with an empty cluster list is still present,
    /// with an empty account map.
    pub async fn fetch(&self, cluster_list_types: &[String]) -> BTreeMap<String, AccountClusters> {
        let mut resources = BTreeMap::new();

        for cltype in cluster_list_types {
            let Some(strategy) = self.strategies.get(cltype.as_str()) else {
                error!("Cluster list type \"{}\" is not supported", cltype);
                continue;
            };

            match strategy.collect().await {
                Ok(collected) => {
                    resources.insert(strategy.name().to_string(), collected);
                }
                Err(e) => {
                    error!(
                        "Failed to fetch resources for cluster list \"{}\": {:#}",
                        cltype, e
                    );
                }
            }
        }

        resources
    }
}
