/// Evidence document storage
///
/// Evidence documents are JSON files laid out under a single root directory.
/// Cluster lists produced by upstream fetchers are read from `raw/`, and the
/// aggregated cluster resources are stored back under the same root.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

/// Pre-enumerated cluster list with direct kubeconfig access.
pub const BOM_CLUSTER_LIST: &str = "raw/kubernetes/cluster_list.json";

/// Clusters discoverable through IBM Cloud, keyed by account.
pub const CLOUD_CLUSTER_LIST: &str = "raw/ibm_cloud/cluster_list.json";

/// Aggregated cluster resources produced by this tool.
pub const CLUSTER_RESOURCE: &str = "kubernetes/cluster_resource.json";

/// Reads and writes evidence documents under a root directory
#[derive(Clone)]
pub struct EvidenceLocker {
    root: PathBuf,
}

impl EvidenceLocker {
    /// Create a locker rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Absolute location of an evidence document
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read and deserialize an evidence document
    pub async fn read_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T> {
        let path = self.path(relative);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read evidence document {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Evidence document {} is not valid JSON", path.display()))
    }

    /// Serialize and store an evidence document, creating parent directories
    pub async fn store_json<T: Serialize>(&self, relative: &str, document: &T) -> Result<()> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write evidence document {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_store_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());

        locker
            .store_json(CLUSTER_RESOURCE, &json!({"kubernetes": {}}))
            .await
            .unwrap();

        let document: Value = locker.read_json(CLUSTER_RESOURCE).await.unwrap();
        assert_eq!(document, json!({"kubernetes": {}}));
    }

    #[tokio::test]
    async fn test_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().join("nested").join("locker"));

        locker.store_json(CLUSTER_RESOURCE, &json!([])).await.unwrap();
        assert!(locker.path(CLUSTER_RESOURCE).exists());
    }

    #[tokio::test]
    async fn test_missing_document_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());

        let err = locker
            .read_json::<Value>(BOM_CLUSTER_LIST)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("cluster_list.json"));
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let locker = EvidenceLocker::new(dir.path().to_path_buf());

        tokio::fs::write(locker.path("broken.json"), "not json")
            .await
            .unwrap();

        let err = locker.read_json::<Value>("broken.json").await.unwrap_err();
        assert!(format!("{:#}", err).contains("not valid JSON"));
    }
}
