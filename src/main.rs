/// Forage - Cluster Resource Evidence Fetcher
///
/// Collects resource listings from Kubernetes clusters through external CLI
/// tools and stores them as raw evidence for compliance audit processing.
mod config;
mod evidence;
mod fetcher;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::FetcherConfig;
use crate::evidence::{EvidenceLocker, CLUSTER_RESOURCE};
use crate::fetcher::ClusterResourceFetcher;
use crate::utils::command::check_tool_installed;

#[derive(Parser)]
#[command(name = "forage")]
#[command(about = "Collect cluster resource evidence for compliance audits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "forage.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch cluster resources for the configured cluster lists
    Fetch {
        /// Override the configured cluster list types
        #[arg(long = "cluster-list-type")]
        cluster_list_types: Vec<String>,
    },

    /// Generate example configuration file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("forage={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Fetch {
            ref cluster_list_types,
        } => fetch_resources(&cli, cluster_list_types).await,
        Commands::Init => init_config(&cli).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Fetch cluster resources and store them as evidence
async fn fetch_resources(cli: &Cli, overrides: &[String]) -> Result<()> {
    let config = FetcherConfig::from_file(&cli.config).context("Failed to load configuration")?;

    let cluster_list_types = if overrides.is_empty() {
        config.cluster_resource.cluster_list_types.clone()
    } else {
        overrides.to_vec()
    };

    // Check prerequisites
    check_tool_installed(
        "kubectl",
        &["version", "--client"],
        "https://kubernetes.io/docs/tasks/tools/",
    )
    .await
    .context("kubectl is required")?;
    if cluster_list_types.iter().any(|t| t == "ibm_cloud") {
        check_tool_installed("ibmcloud", &["--version"], "https://cloud.ibm.com/docs/cli")
            .await
            .context("ibmcloud is required")?;
    }

    let locker = EvidenceLocker::new(config.evidence_dir.clone());
    let fetcher = ClusterResourceFetcher::new(&config, &locker);

    info!(
        "Fetching cluster resources for cluster lists: {}",
        cluster_list_types.join(", ")
    );

    let resources = fetcher.fetch(&cluster_list_types).await;

    locker
        .store_json(CLUSTER_RESOURCE, &resources)
        .await
        .context("Failed to store cluster resource evidence")?;

    info!(
        "✓ Cluster resource evidence stored at {}",
        locker.path(CLUSTER_RESOURCE).display()
    );

    Ok(())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = FetcherConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your requirements");
    info!("  2. Provide the cluster list evidence documents:");
    info!("     <evidence_dir>/raw/kubernetes/cluster_list.json");
    info!("     <evidence_dir>/raw/ibm_cloud/cluster_list.json");
    info!("  3. Set your IBM Cloud API keys:");
    info!("     export FORAGE_<ACCOUNT>_API_KEY=your-key-here");
    info!("  4. Fetch the resources:");
    info!("     forage fetch");

    Ok(())
}
