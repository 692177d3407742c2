/// Configuration management for Forage
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resource types queried in every cluster unless overridden per strategy.
pub const DEFAULT_RESOURCE_TYPES: &[&str] = &["node", "pod", "configmap"];

/// Main fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Root directory holding evidence documents
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,

    /// Cluster resource collection settings
    pub cluster_resource: ClusterResourceConfig,

    /// Credentials for cloud provider logins
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Cluster resource collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResourceConfig {
    /// Cluster list strategies to run (e.g. "kubernetes", "ibm_cloud")
    pub cluster_list_types: Vec<String>,

    /// Per-strategy override of the resource types queried in each cluster
    #[serde(default)]
    pub target_resource_types: BTreeMap<String, Vec<String>>,
}

/// Credentials for cloud provider logins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// IBM Cloud API keys, keyed `<account>_api_key`
    /// (can also be set via FORAGE_<ACCOUNT>_API_KEY env vars)
    #[serde(default)]
    pub ibm_cloud: BTreeMap<String, String>,
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("./evidence")
}

impl FetcherConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FetcherConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster_resource.cluster_list_types.is_empty() {
            anyhow::bail!("cluster_resource.cluster_list_types cannot be empty");
        }

        for (strategy, types) in &self.cluster_resource.target_resource_types {
            if types.is_empty() {
                anyhow::bail!(
                    "cluster_resource.target_resource_types for \"{}\" cannot be empty",
                    strategy
                );
            }
        }

        Ok(())
    }

    /// Resource types to query per cluster for the given strategy
    pub fn resource_types(&self, strategy: &str) -> Vec<String> {
        self.cluster_resource
            .target_resource_types
            .get(strategy)
            .cloned()
            .unwrap_or_else(|| {
                DEFAULT_RESOURCE_TYPES
                    .iter()
                    .map(|t| t.to_string())
                    .collect()
            })
    }

    /// IBM Cloud API key for an account, from config or environment
    pub fn ibm_cloud_api_key(&self, account: &str) -> anyhow::Result<String> {
        let key = format!("{}_api_key", account);
        let env_var = format!(
            "FORAGE_{}_API_KEY",
            account.to_uppercase().replace('-', "_")
        );
        self.credentials
            .ibm_cloud
            .get(&key)
            .cloned()
            .or_else(|| std::env::var(&env_var).ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "API key for account {} not found. Add credentials.ibm_cloud.{} to the \
                     configuration or set the {} environment variable",
                    account,
                    key,
                    env_var
                )
            })
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            evidence_dir: default_evidence_dir(),
            cluster_resource: ClusterResourceConfig {
                cluster_list_types: vec!["kubernetes".to_string(), "ibm_cloud".to_string()],
                target_resource_types: BTreeMap::from([(
                    "ibm_cloud".to_string(),
                    vec![
                        "node".to_string(),
                        "pod".to_string(),
                        "configmap".to_string(),
                    ],
                )]),
            },
            credentials: CredentialsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = FetcherConfig::example();
        assert!(config.validate().is_ok());

        config.cluster_resource.cluster_list_types.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_resource_type_override_rejected() {
        let mut config = FetcherConfig::example();
        config
            .cluster_resource
            .target_resource_types
            .insert("kubernetes".to_string(), vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resource_types_default_and_override() {
        let config = FetcherConfig::example();

        // "kubernetes" has no override in the example config
        assert_eq!(
            config.resource_types("kubernetes"),
            vec!["node", "pod", "configmap"]
        );
        assert_eq!(
            config.resource_types("ibm_cloud"),
            vec!["node", "pod", "configmap"]
        );
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = FetcherConfig::example();
        config
            .credentials
            .ibm_cloud
            .insert("acct1_api_key".to_string(), "k3y".to_string());

        assert_eq!(config.ibm_cloud_api_key("acct1").unwrap(), "k3y");
    }

    #[test]
    fn test_api_key_from_environment() {
        let config = FetcherConfig::example();
        std::env::set_var("FORAGE_ENV_ACCT_API_KEY", "env-k3y");

        assert_eq!(config.ibm_cloud_api_key("env-acct").unwrap(), "env-k3y");
    }

    #[test]
    fn test_missing_api_key_names_account() {
        let config = FetcherConfig::example();
        let err = config.ibm_cloud_api_key("nosuch").unwrap_err();
        assert!(err.to_string().contains("nosuch"));
    }

    #[test]
    fn test_example_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&FetcherConfig::example()).unwrap();
        let parsed: FetcherConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(
            parsed.cluster_resource.cluster_list_types,
            vec!["kubernetes", "ibm_cloud"]
        );
    }
}
