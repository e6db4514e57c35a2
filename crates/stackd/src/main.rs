//! stackd: the StackGrid daemon and operator CLI.
//!
//! Runs the REST API (`serve`) or executes a single lifecycle verb against
//! the cluster and exits.
//!
//! # Usage
//!
//! ```text
//! stackd init-config --namespace apps
//! stackd --config stackgrid.toml create-webhook acme 1 --image registry.example.com/hook:1
//! stackd --dry-run create-host acme 1 --cors https://a.example.com
//! stackd --data-dir /var/lib/stackgrid serve --port 8080
//! ```

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stackgrid_cluster::{ClusterApi, InMemoryCluster, KubeCluster};
use stackgrid_core::{Role, StackConfig};
use stackgrid_orchestrator::{HostInputs, StackOrchestrator};
use stackgrid_state::IntentStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,stackd=debug,stackgrid=debug";

#[derive(Parser)]
#[command(name = "stackd", about = "StackGrid tenant stack orchestrator")]
struct Cli {
    /// Path to the orchestrator configuration.
    #[arg(long, global = true, default_value = "stackgrid.toml")]
    config: PathBuf,

    /// Directory for the intent log. No journal is kept when omitted.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Run against an in-memory cluster and print the calls it received.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API until Ctrl-C.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Write a starter configuration to `--config`.
    InitConfig {
        /// Namespace all stacks are placed in.
        #[arg(long, default_value = "default")]
        namespace: String,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Create (or converge) a webhook stack.
    CreateWebhook {
        tenant_id: String,
        version: String,
        #[arg(long)]
        image: String,
    },

    DestroyWebhook { tenant_id: String, version: String },

    /// Create (or converge) a daipp stack.
    CreateDaipp {
        tenant_id: String,
        version: String,
        #[arg(long)]
        image: String,
    },

    DestroyDaipp { tenant_id: String, version: String },

    /// Create (or converge) a host stack: silo, then client.
    CreateHost {
        tenant_id: String,
        version: String,
        #[command(flatten)]
        inputs: HostArgs,
    },

    DestroyHost { tenant_id: String, version: String },

    /// Point one role's container at a new image and roll its pods.
    UpdateImage {
        tenant_id: String,
        version: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        image: String,
    },

    /// Re-render one role's settings config map.
    UpdateConfig {
        tenant_id: String,
        version: String,
        #[arg(long)]
        role: Role,
        #[command(flatten)]
        inputs: HostArgs,
    },

    /// Re-apply host settings, then restart silo and client.
    UpgradeHost {
        tenant_id: String,
        version: String,
        #[command(flatten)]
        inputs: HostArgs,
    },

    /// Roll one role's pods.
    Restart {
        tenant_id: String,
        version: String,
        #[arg(long)]
        role: Role,
    },

    /// List unfinished intents from the intent log.
    Intents {
        /// Remove completed and failed entries first.
        #[arg(long)]
        prune: bool,
    },
}

#[derive(clap::Args)]
struct HostArgs {
    /// Comma-separated allowed CORS origins.
    #[arg(long)]
    cors: Option<String>,

    #[arg(long)]
    project_id: Option<String>,
}

impl From<HostArgs> for HostInputs {
    fn from(args: HostArgs) -> Self {
        HostInputs {
            cors_origins: args.cors,
            project_id: args.project_id,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Command::InitConfig { namespace, force } = &cli.command {
        return commands::init_config(&cli.config, namespace, *force);
    }

    let config = StackConfig::from_file(&cli.config)?;
    info!(path = ?cli.config, namespace = %config.namespace, "configuration loaded");

    let intents = match &cli.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join("stackgrid.redb");
            let store = IntentStore::open(&path)?;
            info!(path = ?path, "intent log opened");
            Some(store)
        }
        None => None,
    };

    let memory = cli.dry_run.then(|| Arc::new(InMemoryCluster::new()));
    let cluster: Arc<dyn ClusterApi> = match &memory {
        Some(memory) => {
            info!("dry run: using in-memory cluster");
            memory.clone()
        }
        None => Arc::new(KubeCluster::try_default().await?),
    };

    let mut orchestrator = StackOrchestrator::new(cluster, config);
    if let Some(store) = intents {
        orchestrator = orchestrator.with_intent_store(store);
    }
    let orchestrator = Arc::new(orchestrator);

    let result = commands::run(cli.command, orchestrator).await;

    if let Some(memory) = memory {
        println!("dry run: {} cluster mutations", memory.mutations().len());
        for call in memory.mutations() {
            println!("  {call}");
        }
    }
    result
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "stackd",
            "restart",
            "acme",
            "1",
            "--role",
            "silo",
            "--dry-run",
            "--config",
            "other.toml",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        let Command::Restart { tenant_id, role, .. } = cli.command else {
            panic!("expected restart");
        };
        assert_eq!(tenant_id, "acme");
        assert_eq!(role, Role::HostSilo);
    }

    #[test]
    fn host_args_become_inputs() {
        let cli = Cli::try_parse_from([
            "stackd",
            "create-host",
            "acme",
            "1",
            "--cors",
            "https://a.example.com",
        ])
        .unwrap();
        let Command::CreateHost { inputs, .. } = cli.command else {
            panic!("expected create-host");
        };
        let inputs = HostInputs::from(inputs);
        assert_eq!(inputs.cors_origins.as_deref(), Some("https://a.example.com"));
        assert!(inputs.project_id.is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Cli::try_parse_from(["stackd", "restart", "acme", "1", "--role", "gateway"]).is_err());
    }
}
