//! Postflight CLI - run post-installation checks against a cluster.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postflight::checks::Registry;
use postflight::cluster::{ClusterOps, KubeCluster};
use postflight::fixture::FixtureManager;
use postflight::report::Reporter;
use postflight::runner::{compile_run_filter, Runner};

/// Postflight - post-installation verification for network platforms
#[derive(Debug, Parser)]
#[command(name = "postflight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run post-installation checks against the current cluster
    Check {
        /// Namespace in which the platform is running
        #[arg(short = 'n', long, default_value = "kube-system")]
        namespace: String,

        /// Run only the checks that match the provided regex
        #[arg(long)]
        run: Option<String>,

        /// Name of the platform's per-node agent DaemonSet
        #[arg(long, default_value = "node-agent")]
        agent_daemonset: String,
    },

    /// List available checks
    List,
}

fn setup_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json);

    match cli.command {
        Commands::Check {
            namespace,
            run,
            agent_daemonset,
        } => run_checks(&namespace, run.as_deref(), &agent_daemonset).await,
        Commands::List => {
            list_checks();
            Ok(())
        }
    }
}

async fn run_checks(namespace: &str, run_filter: Option<&str>, agent_daemonset: &str) -> Result<()> {
    // A bad filter aborts before anything touches the cluster.
    let filter = compile_run_filter(run_filter)?;

    let (cluster, cluster_name) = KubeCluster::try_default()
        .await
        .context("unable to create Kubernetes client")?;
    let cluster: Arc<dyn ClusterOps> = Arc::new(cluster);

    let reporter = Reporter::new(&cluster_name);
    let registry = Registry::with_defaults();
    let manager = FixtureManager::new(cluster, namespace, agent_daemonset, reporter.clone());

    reporter.info("Starting post-installation checks...");
    let mut fixture = match manager.provision().await {
        Ok(fixture) => fixture,
        Err(err) => {
            // Provisioning may have failed partway through; teardown is
            // idempotent against partial or absent state.
            manager.teardown().await;
            return Err(err.into());
        }
    };

    let stats = Runner::new(reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;
    reporter.info(format!(
        "Checks finished: {} succeeded, {} failed, {} skipped",
        stats.success, stats.failure, stats.skipped
    ));
    manager.teardown().await;

    if stats.failure > 0 {
        anyhow::bail!("{}/{} checks failed", stats.failure, stats.total());
    }
    Ok(())
}

fn list_checks() {
    println!("Available checks:");
    println!();
    for (name, check) in Registry::with_defaults().all() {
        println!("  {name:40} - {}", check.description());
    }
    println!();
    println!("Run specific checks with:");
    println!("  postflight check --run '^pod-to-pod'");
}
