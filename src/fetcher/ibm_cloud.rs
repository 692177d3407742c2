/// IBM Cloud cluster list strategy
///
/// Clusters come from an account-keyed evidence document produced by cloud
/// discovery. Each account requires an `ibmcloud login` before its clusters
/// can be queried and an `ibmcloud logout` afterwards; the logout runs on
/// every path out of the per-cluster loop, success or failure.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::config::FetcherConfig;
use crate::evidence::{EvidenceLocker, CLOUD_CLUSTER_LIST};
use crate::utils::command::{CommandBuilder, CommandError};
use crate::utils::redact::mask_secrets;

use super::{resource_items, AccountClusters, ClusterListStrategy, ClusterResources};

/// Exit status of `ibmcloud cs` when the container-service plugin is absent.
const RC_NO_PLUGIN: i32 = 2;

/// Entry of the IBM Cloud cluster list evidence document
#[derive(Debug, Clone, Deserialize)]
pub struct CloudCluster {
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: String,
}

/// Collects resources from clusters discovered through IBM Cloud
pub struct IbmCloudStrategy {
    resource_types: Vec<String>,
    locker: EvidenceLocker,
    config: FetcherConfig,
}

fn cluster_config_command(cluster_name: &str) -> CommandBuilder {
    CommandBuilder::new("ibmcloud").args(["cs", "cluster", "config", "-s", "-c", cluster_name])
}

fn is_plugin_missing(err: &CommandError) -> bool {
    err.exit_code() == Some(RC_NO_PLUGIN)
}

impl IbmCloudStrategy {
    /// Create the strategy from configuration
    pub fn new(config: &FetcherConfig, locker: &EvidenceLocker) -> Self {
        Self {
            resource_types: config.resource_types("ibm_cloud"),
            locker: locker.clone(),
            config: config.clone(),
        }
    }

    async fn login(&self, api_key: &str) -> Result<(), CommandError> {
        CommandBuilder::new("ibmcloud")
            .args(["login", "--no-region", "--apikey"])
            .arg(api_key)
            .run_silent()
            .await
    }

    async fn logout(&self, account: &str) {
        if let Err(e) = CommandBuilder::new("ibmcloud")
            .arg("logout")
            .run_silent()
            .await
        {
            warn!("Failed to log out of account {}: {}", account, e);
        }
    }

    /// Fetch the kubeconfig context for one cluster, installing the
    /// container-service plugin once if it turns out to be missing.
    async fn configure_cluster_context(&self, cluster_name: &str) -> Result<(), CommandError> {
        match cluster_config_command(cluster_name).run_silent().await {
            Err(e) if is_plugin_missing(&e) => {
                warn!("Kubernetes service plugin missing. Attempting to install plugin...");
                CommandBuilder::new("ibmcloud")
                    .args(["plugin", "install", "kubernetes-service"])
                    .run_silent()
                    .await?;
                cluster_config_command(cluster_name).run_silent().await
            }
            other => other,
        }
    }

    async fn collect_account(
        &self,
        account: &str,
        api_key: &str,
        clusters: &[CloudCluster],
    ) -> Result<Vec<ClusterResources>> {
        let mut collected = Vec::new();
        for cluster in clusters {
            info!(
                "Collecting resources from cluster {} (account {})",
                cluster.name, account
            );

            self.configure_cluster_context(&cluster.name)
                .await
                .with_context(|| {
                    format!(
                        "Failed to fetch access configuration for cluster {}",
                        cluster.name
                    )
                })?;

            // OpenShift clusters need a separate oc session on top of the
            // cluster context.
            if cluster.cluster_type == "openshift" {
                let login = CommandBuilder::new("oc")
                    .args(["login", "-u", "apikey", "-p"])
                    .arg(api_key)
                    .run_silent()
                    .await;
                if let Err(e) = login {
                    error!(
                        "Failed to login to OpenShift cluster {} with account {}: {}",
                        cluster.name,
                        account,
                        mask_secrets(&e.to_string(), &[api_key])
                    );
                    continue;
                }
            }

            let mut resource_list = Vec::new();
            for resource_type in &self.resource_types {
                let queried = match CommandBuilder::new("kubectl")
                    .args(["get", resource_type, "-A", "-o", "json"])
                    .run()
                    .await
                {
                    Ok(stdout) => resource_items(&stdout),
                    Err(e) => Err(e.into()),
                };
                match queried {
                    Ok(items) => resource_list.extend(items),
                    Err(_) => warn!(
                        "Failed to get {} resource in cluster {}",
                        resource_type, cluster.name
                    ),
                }
            }

            collected.push(ClusterResources {
                name: cluster.name.clone(),
                cluster_type: Some(cluster.cluster_type.clone()),
                resources: resource_list,
            });
        }
        Ok(collected)
    }
}

#[async_trait]
impl ClusterListStrategy for IbmCloudStrategy {
    fn name(&self) -> &'static str {
        "ibm_cloud"
    }

    async fn collect(&self) -> Result<AccountClusters> {
        let cluster_list: BTreeMap<String, Vec<CloudCluster>> =
            self.locker.read_json(CLOUD_CLUSTER_LIST).await?;

        let mut resources = AccountClusters::new();
        for (account, clusters) in &cluster_list {
            let api_key = self.config.ibm_cloud_api_key(account)?;

            if let Err(e) = self.login(&api_key).await {
                error!(
                    "Failed to login with account {}: {}",
                    account,
                    mask_secrets(&e.to_string(), &[api_key.as_str()])
                );
                continue;
            }

            // The logout must run whether or not the cluster loop succeeded;
            // only then may an error abort the strategy.
            let outcome = self.collect_account(account, &api_key, clusters).await;
            self.logout(account).await;
            resources.insert(account.clone(), outcome?);
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_cluster_deserialization() {
        let entry: CloudCluster =
            serde_json::from_str(r#"{"name": "roks1", "type": "openshift"}"#).unwrap();
        assert_eq!(entry.name, "roks1");
        assert_eq!(entry.cluster_type, "openshift");
    }

    #[test]
    fn test_plugin_missing_matches_only_status_two() {
        let missing = CommandError::Failed {
            program: "ibmcloud".to_string(),
            code: Some(RC_NO_PLUGIN),
            stderr: "plugin not found".to_string(),
        };
        assert!(is_plugin_missing(&missing));

        let other = CommandError::Failed {
            program: "ibmcloud".to_string(),
            code: Some(1),
            stderr: "login required".to_string(),
        };
        assert!(!is_plugin_missing(&other));

        let timeout = CommandError::Timeout {
            program: "ibmcloud".to_string(),
            timeout: std::time::Duration::from_secs(30),
        };
        assert!(!is_plugin_missing(&timeout));
    }

    #[tokio::test]
    async fn test_missing_cluster_list_fails_the_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());
        let config = FetcherConfig::example();

        let strategy = IbmCloudStrategy::new(&config, &locker);
        assert!(strategy.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_the_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());
        locker
            .store_json(
                CLOUD_CLUSTER_LIST,
                &serde_json::json!({"keyless-acct": [{"name": "c1", "type": "kubernetes"}]}),
            )
            .await
            .unwrap();

        let config = FetcherConfig::example();
        let strategy = IbmCloudStrategy::new(&config, &locker);

        let err = strategy.collect().await.unwrap_err();
        assert!(err.to_string().contains("keyless-acct"));
    }

    #[tokio::test]
    async fn test_empty_cluster_list_yields_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());
        locker
            .store_json(CLOUD_CLUSTER_LIST, &serde_json::json!({}))
            .await
            .unwrap();

        let config = FetcherConfig::example();
        let strategy = IbmCloudStrategy::new(&config, &locker);

        let resources = strategy.collect().await.unwrap();
        assert!(resources.is_empty());
    }
}
